mod traits;

pub use traits::{BulkTwoWayExecutor, KernelExecutor, OneWayExecutor, TwoWayExecutor};

#[cfg(feature = "stream")]
use crate::space::Stream;
#[cfg(feature = "tasks")]
use crate::space::Tasks;
use crate::{
    error::{Error, Result},
    future::{Completion, channel, signal_for, when_all},
    instance::{ExecutionSpaceMode, make_instance},
    parallel::{RangePolicy, parallel_for_async},
    shape::Shape,
    space::{DefaultExecutionSpace, DefaultHostExecutionSpace, ExecutionSpace, Serial, Threads},
};
use derive_more::Debug;
use tracing::trace;

/// Task-model executor over one execution-space instance.
///
/// An executor is a cheap value: clones submit to the same instance, and
/// everything submitted to one instance runs in submission order, no matter
/// how many executors wrap it. Executors over different instances (see
/// [`ExecutionSpaceMode::Independent`]) may run concurrently.
///
/// Every submission is exactly one kernel launch. In particular
/// [`bulk_async_execute`](Self::bulk_async_execute) launches the whole
/// shape at once and the executor reports the full work count as its chunk
/// size, leaving partitioning to the backend.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
#[debug("Executor({instance:?})")]
pub struct Executor<S: ExecutionSpace = DefaultExecutionSpace> {
    instance: S,
}

/// Executor on the single-threaded host backend.
pub type SerialExecutor = Executor<Serial>;
/// Executor on the host thread-pool backend.
pub type ThreadsExecutor = Executor<Threads>;
/// Executor on a device stream.
#[cfg(feature = "stream")]
pub type StreamExecutor = Executor<Stream>;
/// Executor on a task-model-native instance.
#[cfg(feature = "tasks")]
pub type TasksExecutor = Executor<Tasks>;
/// Executor on the default execution space.
pub type DefaultExecutor = Executor<DefaultExecutionSpace>;
/// Executor on the default host execution space.
pub type DefaultHostExecutor = Executor<DefaultHostExecutionSpace>;

impl<S: ExecutionSpace> Default for Executor<S> {
    fn default() -> Self {
        Self::global()
    }
}

impl<S: ExecutionSpace> Executor<S> {
    /// Executor over an instance created in `mode`.
    ///
    /// # Errors
    /// [`Error::ResourceCreation`] if an independent instance cannot be
    /// allocated.
    pub fn new(mode: ExecutionSpaceMode) -> Result<Self> {
        make_instance(mode).map(Self::from_instance)
    }

    /// Executor over the global instance.
    pub fn global() -> Self {
        Self::from_instance(S::global())
    }

    /// Executor over an existing instance.
    pub fn from_instance(instance: S) -> Self {
        Self { instance }
    }

    /// The wrapped instance.
    #[must_use]
    pub fn instance(&self) -> &S {
        &self.instance
    }

    /// Fire-and-forget submission of `f`.
    ///
    /// A panic inside `f` is handled the backend's way: inline backends
    /// unwind into the caller, queued ones record a fault on the instance.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        trace!(space = S::NAME, instance = %self.instance.instance_id(), "post");
        self.instance.enqueue("post", Box::new(f));
    }

    /// Submit `f` and return a handle to its result.
    ///
    /// A panic inside `f` resolves the handle with [`Error::Kernel`].
    pub fn async_execute<F, R>(&self, f: F) -> Completion<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Clone + Send + 'static,
    {
        const LABEL: &str = "async_execute";
        trace!(space = S::NAME, instance = %self.instance.instance_id(), "async_execute");
        let (promise, completion) = channel();
        self.instance.enqueue(
            LABEL,
            Box::new(move || promise.complete(Error::guard(LABEL, f))),
        );
        completion
    }

    /// Submit `f` and block until its result is available.
    ///
    /// # Errors
    /// [`Error::Kernel`] if `f` panicked.
    pub fn sync_execute<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Clone + Send + 'static,
    {
        self.async_execute(f).get()
    }

    /// Launch `f` once per element of `shape` as a single kernel.
    ///
    /// Returns one handle covering the whole launch.
    pub fn bulk_async_execute<Sh, F>(&self, f: F, shape: Sh) -> Vec<Completion>
    where
        Sh: Shape,
        F: Fn(Sh::Item) + Send + Sync + 'static,
    {
        let policy = RangePolicy::new(self.instance.clone(), 0..shape.len());
        vec![parallel_for_async("bulk_async_execute", policy, move |offset| {
            f(shape.at(offset));
        })]
    }

    /// [`bulk_async_execute`](Self::bulk_async_execute), then block.
    ///
    /// # Errors
    /// [`Error::Kernel`] if the launch faulted on a queued backend.
    pub fn bulk_sync_execute<Sh, F>(&self, f: F, shape: Sh) -> Result<()>
    where
        Sh: Shape,
        F: Fn(Sh::Item) + Send + Sync + 'static,
    {
        when_all(self.bulk_async_execute(f, shape)).get()
    }

    /// Handle for everything submitted to the instance so far.
    pub fn get_future(&self) -> Completion {
        signal_for(&self.instance)
    }

    /// Chunk size the task model should use: the whole `count`, so it never
    /// splits work the backend partitions itself.
    #[must_use]
    pub fn get_chunk_size(&self, _cores: usize, count: usize) -> usize {
        count
    }
}
