#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

/// Opt-in log output: `RUST_LOG=ktb=trace cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Per-index hit counters shared with kernels.
#[derive(Clone)]
pub struct Hits(Arc<Vec<AtomicUsize>>);

impl Hits {
    pub fn new(len: usize) -> Self {
        Self(Arc::new((0..len).map(|_| AtomicUsize::new(0)).collect()))
    }

    pub fn hit(&self, index: usize) {
        self.0[index].fetch_add(1, Ordering::Relaxed);
    }

    pub fn all_once(&self) -> bool {
        self.0.iter().all(|h| h.load(Ordering::Relaxed) == 1)
    }
}
