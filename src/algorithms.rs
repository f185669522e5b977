//! Generic parallel algorithms dispatched through a [`KernelPolicy`].
//!
//! The range argument decides how a call becomes a kernel launch:
//! - a native descriptor ([`RangePolicy`], [`MdRangePolicy`]) is launched
//!   as is, rebound onto the policy executor's instance;
//! - a random-access [`Shape`] (counts, `Range<usize>`, vectors, views,
//!   [`ViewRange`](crate::view::ViewRange)) becomes a flat launch whose
//!   kernel fetches each position by offset.
//!
//! Anything else does not implement [`DispatchRange`] and fails to compile.
//! That includes team launches, which have no element-wise meaning:
//!
//! ```compile_fail
//! use ktb::{algorithms::for_each, parallel::TeamPolicy, policy::kernel_policy, space::Threads};
//!
//! let policy = kernel_policy().on(ktb::executor::Executor::<Threads>::global());
//! for_each(&policy, TeamPolicy::<Threads>::global(4, 2), |_member| {});
//! ```
//!
//! and sequential iterators, which cannot be dereferenced by offset:
//!
//! ```compile_fail
//! use ktb::{algorithms::reduce, policy::kernel_policy};
//!
//! let evens = (0..10_u64).filter(|v| v % 2 == 0);
//! let _ = reduce(&kernel_policy(), evens, 0, |a, b| a + b);
//! ```
//!
//! Index bounds must be integral, for loops:
//!
//! ```compile_fail
//! use ktb::{algorithms::for_loop, policy::kernel_policy};
//!
//! let _ = for_loop(&kernel_policy(), 0.0_f32, 1.0, |_: f32| {});
//! ```
//!
//! and for multidimensional ranges alike:
//!
//! ```compile_fail
//! use ktb::{parallel::MdRangePolicy, space::Threads};
//!
//! let _ = MdRangePolicy::<Threads, f64, 2>::global([0.0, 0.0], [1.0, 1.0]);
//! ```
//!
//! [`KernelPolicy`]: crate::policy::KernelPolicy

mod for_each;
mod for_loop;
mod reduce;

pub use for_each::for_each;
pub use for_loop::for_loop;
pub use reduce::reduce;

use crate::{
    parallel::{IndexSpace, Integral, MdRangePolicy, RangePolicy},
    policy::Parameters,
    shape::Shape,
    space::ExecutionSpace,
    view::{Element, View, ViewRange},
};
use core::ops::Range;
use std::sync::Arc;

/// A range an algorithm can launch over instances of `S`.
pub trait DispatchRange<S: ExecutionSpace>: Send + Sync + 'static {
    /// Element handed to the algorithm's function.
    type Item: Send;
    /// Launch descriptor.
    type Target: IndexSpace<Space = S>;

    /// Launch descriptor on `instance`.
    fn bind(&self, instance: S, parameters: &Parameters) -> Self::Target;

    /// Element at a launch index.
    fn item(&self, index: <Self::Target as IndexSpace>::Index) -> Self::Item;
}

impl<S: ExecutionSpace> DispatchRange<S> for RangePolicy<S> {
    type Item = usize;
    type Target = Self;

    fn bind(&self, instance: S, parameters: &Parameters) -> Self {
        let policy = self.clone().with_space(instance);
        match parameters.chunk_size {
            Some(chunk) => policy.with_chunk(chunk),
            None => policy,
        }
    }

    fn item(&self, index: usize) -> usize {
        index
    }
}

impl<S: ExecutionSpace, I: Integral, const N: usize> DispatchRange<S> for MdRangePolicy<S, I, N> {
    type Item = [I; N];
    type Target = Self;

    fn bind(&self, instance: S, _parameters: &Parameters) -> Self {
        self.clone().with_space(instance)
    }

    fn item(&self, index: [I; N]) -> [I; N] {
        index
    }
}

fn flat_launch<S: ExecutionSpace>(instance: S, len: usize, parameters: &Parameters) -> RangePolicy<S> {
    RangePolicy::new(instance, 0..len).with_chunk(parameters.chunk_size.unwrap_or(1))
}

macro_rules! impl_dispatch_for_shape {
    ($($shape:ty => [$($gen:tt)*]),* $(,)?) => {$(
        impl<S: ExecutionSpace, $($gen)*> DispatchRange<S> for $shape {
            type Item = <$shape as Shape>::Item;
            type Target = RangePolicy<S>;

            fn bind(&self, instance: S, parameters: &Parameters) -> RangePolicy<S> {
                flat_launch(instance, Shape::len(self), parameters)
            }

            fn item(&self, offset: usize) -> Self::Item {
                Shape::at(self, offset)
            }
        }
    )*};
}

impl_dispatch_for_shape!(
    usize => [],
    Range<usize> => [],
    Vec<T> => [T: Clone + Send + Sync + 'static],
    Arc<[T]> => [T: Clone + Send + Sync + 'static],
    View<T> => [T: Element],
    ViewRange<T> => [T: Element],
);
