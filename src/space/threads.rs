use super::{Capability, ExecutionSpace, Parallelism, SignalSource};
use crate::{
    error::Result,
    types::{InstanceId, Work},
    view::MemorySpace,
};
use tracing::trace;

/// Host thread-pool backend.
///
/// The launch itself happens on the submitting thread and its index loop is
/// spread over the rayon pool; the launch returns once every index ran.
/// There is a single instance, so independent requests get the global one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Threads;

impl ExecutionSpace for Threads {
    const NAME: &'static str = "Threads";
    const CAPABILITY: Capability = Capability {
        async_completion: false,
        independent_instances: false,
        parallelism: Parallelism::Rayon,
        reduce_result_space: MemorySpace::Host,
    };

    fn global() -> Self {
        Self
    }

    fn independent() -> Result<Self> {
        Ok(Self)
    }

    fn instance_id(&self) -> InstanceId {
        InstanceId::SINGLETON
    }

    fn enqueue(&self, label: &str, work: Work) {
        trace!(space = Self::NAME, label, threads = rayon::current_num_threads(), "running kernel");
        work();
    }

    fn fence(&self) {}

    fn signal_source(&self) -> SignalSource {
        SignalSource::Fence
    }
}
