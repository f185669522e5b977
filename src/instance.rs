//! Creation of execution-space instances.

use crate::{
    config::Config,
    error::Result,
    executor::Executor,
    space::ExecutionSpace,
};
use core::sync::atomic::{AtomicUsize, Ordering};
use derive_more::{Debug, Deref};
use tracing::debug;

/// Which instance a factory call produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ExecutionSpaceMode {
    /// The backend's shared default instance. Work from every global-mode
    /// user is serialized on it.
    #[default]
    Global,
    /// A new instance that can run concurrently with others, on backends
    /// with [`Capability::independent_instances`](crate::space::Capability).
    /// Other backends hand back their global instance.
    Independent,
}

/// Produce an instance of `S` in `mode`.
///
/// Independent instances are not pooled or recycled: each call allocates a
/// new backend resource that lives as long as its last handle.
///
/// # Errors
/// [`Error::ResourceCreation`](crate::Error::ResourceCreation) when an
/// independent instance cannot be allocated. The error is not retried.
pub fn make_instance<S: ExecutionSpace>(mode: ExecutionSpaceMode) -> Result<S> {
    match mode {
        ExecutionSpaceMode::Global => Ok(S::global()),
        ExecutionSpaceMode::Independent => {
            let instance = S::independent()?;
            debug!(
                space = S::NAME,
                instance = %instance.instance_id(),
                shared = !S::CAPABILITY.independent_instances,
                "independent instance"
            );
            Ok(instance)
        }
    }
}

/// Owned set of independent instances handed out round-robin.
///
/// The pool owns its instances: they are released when the pool and every
/// instance or executor taken from it are dropped.
#[derive(Debug, Deref)]
pub struct InstancePool<S: ExecutionSpace> {
    #[deref]
    instances: Vec<S>,
    #[debug(skip)]
    cursor: AtomicUsize,
}

impl<S: ExecutionSpace> InstancePool<S> {
    /// Pool of `count` independent instances (at least one).
    ///
    /// # Errors
    /// [`Error::ResourceCreation`](crate::Error::ResourceCreation) if any
    /// instance cannot be allocated; the ones already created are released.
    pub fn new(count: usize) -> Result<Self> {
        let instances = (0..count.max(1))
            .map(|_| make_instance(ExecutionSpaceMode::Independent))
            .collect::<Result<Vec<_>>>()?;
        debug!(space = S::NAME, count = instances.len(), "instance pool ready");
        Ok(Self {
            instances,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Pool sized by [`Config::pool_instances`].
    ///
    /// # Errors
    /// As [`InstancePool::new`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.pool_instances)
    }

    /// Next instance in round-robin order.
    #[must_use]
    pub fn instance(&self) -> S {
        let next = self.cursor.fetch_add(1, Ordering::Relaxed) % self.instances.len();
        self.instances[next].clone()
    }

    /// Executor over the next instance in round-robin order.
    pub fn executor(&self) -> Executor<S> {
        Executor::from_instance(self.instance())
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::space::Serial;

    #[test]
    fn global_mode_returns_the_global_instance() {
        assert_eq!(make_instance::<Serial>(ExecutionSpaceMode::Global).unwrap(), Serial);
        assert_eq!(ExecutionSpaceMode::default(), ExecutionSpaceMode::Global);
    }

    #[test]
    fn pool_has_at_least_one_instance_and_cycles() {
        let pool = InstancePool::<Serial>::new(0).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.instance(), Serial);
        assert_eq!(*pool.executor().instance(), Serial);
        let pool = InstancePool::<Serial>::from_config(&Config::default().with_pool_instances(3)).unwrap();
        assert_eq!(pool.len(), 3);
    }
}
