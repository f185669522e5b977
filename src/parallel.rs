//! Future-returning wrappers around the three bulk kernel primitives.
//!
//! Each wrapper enqueues a single kernel launch on the instance its index
//! space is bound to and hands back the completion-signal adapter's handle
//! for that instance, instead of making the caller fence.

mod engine;
mod policy;
mod reducer;

pub(crate) use policy::{advance, span};
pub use policy::{
    IndexSpace, Integral, IntoIndexSpace, MdRangePolicy, RangePolicy, TeamMember, TeamPolicy,
};
pub(crate) use reducer::Fold;
pub use reducer::{Max, Min, Prod, ReduceTarget, Reducer, ResultCell, Sum};

use crate::{
    error::Result,
    future::{Completion, signal_for},
    space::ExecutionSpace,
    view::{Arithmetic, MemorySpace},
};
use tracing::{debug, warn};

type IndexOf<P> = <<P as IntoIndexSpace>::Target as IndexSpace>::Index;

/// Launch `f` for every index of `policy` and return its completion.
pub fn parallel_for_async<P, F>(label: &str, policy: P, f: F) -> Completion
where
    P: IntoIndexSpace,
    F: Fn(IndexOf<P>) + Send + Sync + 'static,
{
    for_on(label, policy.into_index_space(), f)
}

pub(crate) fn for_on<I, F>(label: &str, index_space: I, f: F) -> Completion
where
    I: IndexSpace,
    F: Fn(I::Index) + Send + Sync + 'static,
{
    let instance = index_space.space().clone();
    debug!(
        space = <I::Space as ExecutionSpace>::NAME,
        instance = %instance.instance_id(),
        label,
        len = index_space.len(),
        "parallel_for"
    );
    instance.enqueue(
        label,
        Box::new(move || {
            engine::for_each(
                <I::Space as ExecutionSpace>::CAPABILITY.parallelism,
                index_space.len(),
                index_space.min_chunk(),
                |offset| f(index_space.index(offset)),
            );
        }),
    );
    signal_for(&instance)
}

/// Launch a reduction over `policy` and return its completion; the value
/// lands in `target` before the handle becomes ready.
///
/// `f(index, &mut partial)` folds one index into a worker's partial
/// result; partials are combined with `reducer`. If `target` lives in a
/// memory space the backend cannot copy into asynchronously, the launch
/// fences before returning and a warning is logged.
///
/// # Errors
/// [`Error::ResultExtent`](crate::Error::ResultExtent) when a view target
/// does not hold exactly one element.
pub fn parallel_reduce_async<P, V, R, F, D>(
    label: &str,
    policy: P,
    reducer: R,
    f: F,
    target: D,
) -> Result<Completion>
where
    P: IntoIndexSpace,
    V: Send + 'static,
    R: Reducer<V>,
    F: Fn(IndexOf<P>, &mut V) + Send + Sync + 'static,
    D: ReduceTarget<V>,
{
    reduce_on(label, policy.into_index_space(), reducer, f, target)
}

pub(crate) fn reduce_on<I, V, R, F, D>(label: &str, index_space: I, reducer: R, f: F, target: D) -> Result<Completion>
where
    I: IndexSpace,
    V: Send + 'static,
    R: Reducer<V>,
    F: Fn(I::Index, &mut V) + Send + Sync + 'static,
    D: ReduceTarget<V>,
{
    target.validate()?;
    let instance = index_space.space().clone();
    let blocking = copy_back_blocks::<I::Space>(target.memory_space());
    debug!(
        space = <I::Space as ExecutionSpace>::NAME,
        instance = %instance.instance_id(),
        label,
        len = index_space.len(),
        "parallel_reduce"
    );
    instance.enqueue(
        label,
        Box::new(move || {
            let value = engine::reduce(
                <I::Space as ExecutionSpace>::CAPABILITY.parallelism,
                index_space.len(),
                index_space.min_chunk(),
                &reducer,
                |offset, partial| f(index_space.index(offset), partial),
            );
            target.store(value);
        }),
    );
    if blocking {
        let required = <I::Space as ExecutionSpace>::CAPABILITY.reduce_result_space;
        warn!(
            space = <I::Space as ExecutionSpace>::NAME,
            label,
            ?required,
            "reduction result space forces a synchronous copy back"
        );
        instance.fence();
    }
    Ok(signal_for(&instance))
}

/// Launch a prefix scan over `policy` and return its completion; the total
/// lands in `total` (pass `()` to drop it).
///
/// `f(index, &mut partial, is_final)` adds the index's contribution to
/// `partial`. On the final pass `partial` holds the exclusive prefix on
/// entry, so writing it before adding yields an exclusive scan and writing
/// it after yields an inclusive one.
///
/// On some device backends a scan does not start until unrelated transform
/// kernels on other instances have finished. That ordering belongs to the
/// backend scheduler; the wrapper neither causes nor hides it.
///
/// # Errors
/// [`Error::ResultExtent`](crate::Error::ResultExtent) when a view target
/// does not hold exactly one element.
pub fn parallel_scan_async<P, T, F, D>(label: &str, policy: P, f: F, total: D) -> Result<Completion>
where
    P: IntoIndexSpace,
    T: Arithmetic,
    F: Fn(IndexOf<P>, &mut T, bool) + Send + Sync + 'static,
    D: ReduceTarget<T>,
{
    scan_on(label, policy.into_index_space(), f, total)
}

fn scan_on<I, T, F, D>(label: &str, index_space: I, f: F, total: D) -> Result<Completion>
where
    I: IndexSpace,
    T: Arithmetic,
    F: Fn(I::Index, &mut T, bool) + Send + Sync + 'static,
    D: ReduceTarget<T>,
{
    total.validate()?;
    let instance = index_space.space().clone();
    let blocking = copy_back_blocks::<I::Space>(total.memory_space());
    debug!(
        space = <I::Space as ExecutionSpace>::NAME,
        instance = %instance.instance_id(),
        label,
        len = index_space.len(),
        "parallel_scan"
    );
    instance.enqueue(
        label,
        Box::new(move || {
            let sum = engine::scan(
                <I::Space as ExecutionSpace>::CAPABILITY.parallelism,
                index_space.len(),
                |offset, partial, is_final| f(index_space.index(offset), partial, is_final),
            );
            total.store(sum);
        }),
    );
    if blocking {
        warn!(
            space = <I::Space as ExecutionSpace>::NAME,
            label, "scan total space forces a synchronous copy back"
        );
        instance.fence();
    }
    Ok(signal_for(&instance))
}

fn copy_back_blocks<S: ExecutionSpace>(target: Option<MemorySpace>) -> bool {
    S::CAPABILITY.async_completion
        && target.is_some_and(|space| !space.accepts_async_copy(S::CAPABILITY.reduce_result_space))
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::{
        space::{Serial, Threads},
        view::View,
    };

    #[test]
    fn for_on_inline_backends_is_ready_on_return() {
        let out = View::<u32>::new("out", 64);
        let done = parallel_for_async("fill", RangePolicy::new(Threads, 0..64), {
            let out = out.clone();
            move |i: usize| out.set(i, u32::try_from(i).unwrap() * 2)
        });
        assert!(done.is_ready());
        assert_eq!(out.get(63), 126);
    }

    #[test]
    fn reduce_into_view() {
        let result = View::<i64>::new("sum", 1);
        parallel_reduce_async(
            "sum",
            RangePolicy::new(Serial, 0..10),
            Sum,
            |i: usize, acc: &mut i64| *acc += i64::try_from(i).unwrap(),
            result.clone(),
        )
        .unwrap()
        .get()
        .unwrap();
        assert_eq!(result.get(0), 45);
    }

    #[test]
    fn reduce_rejects_wide_result_views() {
        let err = parallel_reduce_async(
            "bad",
            RangePolicy::new(Serial, 0..4),
            Max,
            |i: usize, acc: &mut usize| *acc = (*acc).max(i),
            View::<usize>::new("wide", 2),
        )
        .unwrap_err();
        assert_eq!(err, crate::Error::ResultExtent(2));
    }

    #[test]
    fn scan_with_discarded_total() {
        let out = View::<u64>::new("prefix", 5);
        parallel_scan_async(
            "prefix",
            RangePolicy::new(Threads, 0..5),
            {
                let out = out.clone();
                move |i: usize, partial: &mut u64, is_final: bool| {
                    *partial += 1;
                    if is_final {
                        out.set(i, *partial);
                    }
                }
            },
            (),
        )
        .unwrap()
        .wait();
        assert_eq!(out.to_vec(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn copy_back_blocking_rules() {
        assert!(!copy_back_blocks::<Threads>(Some(MemorySpace::Device)));
        assert!(!copy_back_blocks::<Serial>(None));
    }
}
