use super::{Capability, ExecutionSpace, Parallelism, SignalSource};
use crate::{
    error::Result,
    types::{InstanceId, Work},
    view::MemorySpace,
};
use tracing::trace;

/// Single-threaded host backend.
///
/// Kernels run inline on the submitting thread, so a completion handle is
/// always obtained by (trivially) fencing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Serial;

impl ExecutionSpace for Serial {
    const NAME: &'static str = "Serial";
    const CAPABILITY: Capability = Capability {
        async_completion: false,
        independent_instances: false,
        parallelism: Parallelism::Sequential,
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
        trace!(space = Self::NAME, label, "running kernel inline");
        work();
    }

    fn fence(&self) {}

    fn signal_source(&self) -> SignalSource {
        SignalSource::Fence
    }
}
