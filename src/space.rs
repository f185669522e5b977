mod serial;
#[cfg(feature = "stream")]
mod poller;
#[cfg(feature = "stream")]
mod stream;
#[cfg(feature = "tasks")]
mod tasks;
mod threads;

pub use serial::Serial;
#[cfg(feature = "stream")]
pub use stream::{Stream, StreamDevice, StreamEvent};
#[cfg(feature = "tasks")]
pub use tasks::Tasks;
pub use threads::Threads;

use crate::{
    error::Result,
    future::Completion,
    types::{InstanceId, Work},
    view::MemorySpace,
};
use core::fmt::Debug;

/// Execution space used when a caller does not pick one.
#[cfg(feature = "stream")]
pub type DefaultExecutionSpace = Stream;
/// Execution space used when a caller does not pick one.
#[cfg(not(feature = "stream"))]
pub type DefaultExecutionSpace = Threads;

/// Host execution space used for host-side staging.
pub type DefaultHostExecutionSpace = Threads;

/// How a backend runs the index loop of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parallelism {
    /// One index after another on the launching thread.
    Sequential,
    /// Split across the rayon thread pool.
    Rayon,
}

/// Compile-time description of what a backend can do.
///
/// Degradations are discoverable here rather than only observable as lost
/// performance: a backend with `async_completion == false` fences the
/// calling thread whenever a completion handle is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    /// Completion handles resolve without blocking the requester.
    pub async_completion: bool,
    /// `independent()` allocates a new resource instead of returning the
    /// global instance.
    pub independent_instances: bool,
    /// How kernel index loops run.
    pub parallelism: Parallelism,
    /// Memory space a reduction result must live in for the copy back to
    /// the host to stay asynchronous.
    pub reduce_result_space: MemorySpace,
}

/// Where the completion-signal adapter gets its handle from.
#[derive(Debug)]
pub enum SignalSource {
    /// No async notification: block on a full fence, then report ready.
    Fence,
    /// A device stream resolved through events or host callbacks.
    #[cfg(feature = "stream")]
    Stream(Stream),
    /// The backend already tracks its work as a completion chain.
    Native(Completion),
}

/// A kernel-dispatch backend instance.
///
/// Values are cheap handles: clones refer to the same backend resource and
/// compare equal. Work enqueued on one instance runs in submission order.
pub trait ExecutionSpace: Clone + Debug + PartialEq + Send + Sync + 'static {
    /// Backend name for logs and errors.
    const NAME: &'static str;
    /// What the backend supports.
    const CAPABILITY: Capability;

    /// The backend's shared default instance.
    fn global() -> Self;

    /// A fresh instance not shared with the global one, when the backend
    /// supports it; the global instance otherwise.
    ///
    /// # Errors
    /// [`Error::ResourceCreation`](crate::Error::ResourceCreation) when the
    /// backend cannot allocate the resource. Never retried.
    fn independent() -> Result<Self>;

    /// Identity of the underlying resource.
    fn instance_id(&self) -> InstanceId;

    /// Submit a kernel launch. Returns once the launch is queued, which for
    /// inline backends means once it has run.
    fn enqueue(&self, label: &str, work: Work);

    /// Block until all previously enqueued work has finished.
    fn fence(&self);

    /// How to obtain a completion handle for all previously enqueued work.
    fn signal_source(&self) -> SignalSource;

    /// Whether work runs strictly in submission order.
    fn is_in_order(&self) -> bool {
        true
    }
}
