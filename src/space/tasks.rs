use super::{Capability, ExecutionSpace, Parallelism, SignalSource};
use crate::{
    error::{Error, Result},
    future::{Completion, channel},
    types::{InstanceId, Work},
    view::MemorySpace,
};
use parking_lot::Mutex;
use std::{fmt, sync::Arc, sync::OnceLock};
use tracing::{error, trace};

struct TaskChain {
    id: InstanceId,
    /// Completion of the most recently enqueued launch.
    tail: Mutex<Completion>,
}

/// Task-model-native backend: each instance is a chain of futures.
///
/// Every launch is a continuation of the previous one on the same instance
/// and runs as a rayon task, so instances order their own work without a
/// worker thread and the chain tail is the completion handle.
#[derive(Clone)]
pub struct Tasks {
    chain: Arc<TaskChain>,
}

impl fmt::Debug for Tasks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tasks")
            .field("id", &self.chain.id)
            .field("idle", &self.chain.tail.lock().is_ready())
            .finish()
    }
}

impl PartialEq for Tasks {
    fn eq(&self, other: &Self) -> bool {
        self.chain.id == other.chain.id
    }
}

impl Eq for Tasks {}

impl Tasks {
    fn new() -> Self {
        Self {
            chain: Arc::new(TaskChain {
                id: InstanceId::next(),
                tail: Mutex::new(Completion::ready(())),
            }),
        }
    }

    fn tail(&self) -> Completion {
        self.chain.tail.lock().clone()
    }
}

impl ExecutionSpace for Tasks {
    const NAME: &'static str = "Tasks";
    const CAPABILITY: Capability = Capability {
        async_completion: true,
        independent_instances: true,
        parallelism: Parallelism::Rayon,
        reduce_result_space: MemorySpace::Host,
    };

    fn global() -> Self {
        static GLOBAL: OnceLock<Tasks> = OnceLock::new();
        GLOBAL.get_or_init(Self::new).clone()
    }

    fn independent() -> Result<Self> {
        Ok(Self::new())
    }

    fn instance_id(&self) -> InstanceId {
        self.chain.id
    }

    fn enqueue(&self, label: &str, work: Work) {
        let (promise, next) = channel();
        let prev = core::mem::replace(&mut *self.chain.tail.lock(), next);
        let id = self.chain.id;
        let label = label.to_owned();
        trace!(space = Self::NAME, instance = %id, label = %label, "kernel chained");
        prev.on_complete(move |prior| {
            let prior = prior.clone();
            rayon::spawn(move || {
                let outcome = Error::guard(&label, work);
                if let Err(err) = &outcome {
                    error!(space = Self::NAME, instance = %id, label = %label, %err, "kernel fault");
                }
                promise.complete(prior.and(outcome));
            });
        });
    }

    fn fence(&self) {
        trace!(space = Self::NAME, instance = %self.chain.id, "fence");
        self.tail().wait();
    }

    fn signal_source(&self) -> SignalSource {
        SignalSource::Native(self.tail())
    }
}
