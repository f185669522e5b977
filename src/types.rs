use core::sync::atomic::{AtomicU64, Ordering};
use derive_more::Display;
use indexmap::IndexMap as _IndexMap;
use rustc_hash::FxBuildHasher;
use std::borrow::Cow;

/// Human-readable kernel label. Purely diagnostic: it shows up in trace
/// output and kernel fault reports and never changes semantics.
pub type Label = Cow<'static, str>;

/// Label used when a caller does not name a kernel.
pub const DEFAULT_LABEL: &str = "unnamed kernel";

/// A unit of work handed to a backend: the whole kernel launch, including
/// its index loop, boxed so backends can queue it.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Identity of a backend execution-space instance.
///
/// Instances that serialize with each other share an id. Singleton
/// backends report [`InstanceId::SINGLETON`] for every value.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[display("#{_0}")]
pub struct InstanceId(u64);

impl InstanceId {
    /// Id shared by every value of a backend that has only one instance.
    pub const SINGLETON: Self = Self(0);

    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// `IndexMap` type with fast hasher.
#[cfg_attr(not(feature = "stream"), allow(dead_code))]
pub(crate) type IndexMap<K, V> = _IndexMap<K, V, FxBuildHasher>;
