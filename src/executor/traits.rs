//! Structural executor contracts of the task model.
//!
//! Conformance of every compiled-in backend is checked at compile time at
//! the bottom of this module.

use super::Executor;
#[cfg(feature = "stream")]
use crate::space::Stream;
#[cfg(feature = "tasks")]
use crate::space::Tasks;
use crate::{
    error::Result,
    future::Completion,
    shape::Shape,
    space::{ExecutionSpace, Serial, Threads},
};

/// Fire-and-forget submission.
pub trait OneWayExecutor {
    /// Submit `f` without a handle.
    fn post<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static;
}

/// Single submission with a result.
pub trait TwoWayExecutor {
    /// Submit `f` and return a handle to its result.
    fn async_execute<F, R>(&self, f: F) -> Completion<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Clone + Send + 'static;

    /// Submit `f` and wait for its result.
    ///
    /// # Errors
    /// Whatever the submission reported.
    fn sync_execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Clone + Send + 'static;
}

/// Bulk submission over a shape, with one handle per chunk.
pub trait BulkTwoWayExecutor {
    /// Launch `f` for every element of `shape`.
    fn bulk_async_execute<Sh, F>(&self, f: F, shape: Sh) -> Vec<Completion>
    where
        Sh: Shape,
        F: Fn(Sh::Item) + Send + Sync + 'static;

    /// Launch and wait.
    ///
    /// # Errors
    /// Whatever the launch reported.
    fn bulk_sync_execute<Sh, F>(&self, f: F, shape: Sh) -> Result<()>
    where
        Sh: Shape,
        F: Fn(Sh::Item) + Send + Sync + 'static;
}

/// An executor backed by a kernel-dispatch execution space.
pub trait KernelExecutor:
    OneWayExecutor + TwoWayExecutor + BulkTwoWayExecutor + Clone + Send + Sync + 'static
{
    /// Backend of the wrapped instance.
    type Space: ExecutionSpace;

    /// The wrapped instance.
    fn instance(&self) -> &Self::Space;

    /// Handle for everything submitted so far.
    fn get_future(&self) -> Completion;

    /// Chunk size hint for `count` work items on `cores` cores.
    fn get_chunk_size(&self, cores: usize, count: usize) -> usize;
}

impl<S: ExecutionSpace> OneWayExecutor for Executor<S> {
    fn post<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        Executor::post(self, f);
    }
}

impl<S: ExecutionSpace> TwoWayExecutor for Executor<S> {
    fn async_execute<F, R>(&self, f: F) -> Completion<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Clone + Send + 'static,
    {
        Executor::async_execute(self, f)
    }

    fn sync_execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Clone + Send + 'static,
    {
        Executor::sync_execute(self, f)
    }
}

impl<S: ExecutionSpace> BulkTwoWayExecutor for Executor<S> {
    fn bulk_async_execute<Sh, F>(&self, f: F, shape: Sh) -> Vec<Completion>
    where
        Sh: Shape,
        F: Fn(Sh::Item) + Send + Sync + 'static,
    {
        Executor::bulk_async_execute(self, f, shape)
    }

    fn bulk_sync_execute<Sh, F>(&self, f: F, shape: Sh) -> Result<()>
    where
        Sh: Shape,
        F: Fn(Sh::Item) + Send + Sync + 'static,
    {
        Executor::bulk_sync_execute(self, f, shape)
    }
}

impl<S: ExecutionSpace> KernelExecutor for Executor<S> {
    type Space = S;

    fn instance(&self) -> &S {
        Executor::instance(self)
    }

    fn get_future(&self) -> Completion {
        Executor::get_future(self)
    }

    fn get_chunk_size(&self, cores: usize, count: usize) -> usize {
        Executor::get_chunk_size(self, cores, count)
    }
}

const _: () = {
    const fn conforms<E: KernelExecutor>() {}

    conforms::<Executor<Serial>>();
    conforms::<Executor<Threads>>();
    #[cfg(feature = "stream")]
    conforms::<Executor<Stream>>();
    #[cfg(feature = "tasks")]
    conforms::<Executor<Tasks>>();
};
