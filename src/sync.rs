#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    /// `parking_lot`-shaped facade over the loom mutex so call sites stay
    /// identical in both builds.
    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        pub(crate) fn lock(&self) -> loom::sync::MutexGuard<'_, T> {
            self.0.lock().unwrap()
        }
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use core::sync::atomic::{AtomicBool, Ordering};
    pub(crate) use parking_lot::Mutex;
    pub(crate) use std::sync::Arc;
}

pub(crate) use imp::*;
