use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors reported by the bridge.
///
/// The enum is `Clone` because the same outcome is handed to every holder
/// of a shared [`Completion`](crate::future::Completion).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A backend resource (stream, worker thread) could not be created.
    ///
    /// Never retried: the condition is treated as fatal resource exhaustion.
    #[error("failed to create {backend} instance: {reason}")]
    ResourceCreation {
        /// Name of the backend that failed.
        backend: &'static str,
        /// Backend-provided reason.
        reason: String,
    },
    /// Source and destination of a deep copy differ in extent.
    #[error("deep copy extent mismatch: destination has {dst} elements, source has {src}")]
    ExtentMismatch {
        /// Destination length.
        dst: usize,
        /// Source length.
        src: usize,
    },
    /// Source and destination of a deep copy share storage and intersect.
    #[error("deep copy source and destination overlap")]
    OverlappingCopy,
    /// A copy was requested on an instance whose queue is not in-order.
    #[error("{backend} instance does not execute in order")]
    OutOfOrderQueue {
        /// Name of the backend.
        backend: &'static str,
    },
    /// A reduction result view does not hold exactly one element.
    #[error("reduction result view must hold exactly one element, found {0}")]
    ResultExtent(usize),
    /// A work item panicked while running on a backend.
    #[error("kernel `{label}` failed: {message}")]
    Kernel {
        /// Label of the failing kernel.
        label: String,
        /// Panic message.
        message: String,
    },
    /// The producing side of a completion was dropped without a value.
    #[error("promise dropped before a value was set")]
    BrokenPromise,
}

impl Error {
    pub(crate) fn resource(backend: &'static str, reason: impl ToString) -> Self {
        Self::ResourceCreation {
            backend,
            reason: reason.to_string(),
        }
    }

    /// Run a work item, converting a panic into [`Error::Kernel`].
    pub(crate) fn guard<R>(label: &str, work: impl FnOnce() -> R) -> Result<R> {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(work))
            .map_err(|payload| Self::from_panic(label, payload.as_ref()))
    }

    /// Turn a panic payload caught from a work item into [`Error::Kernel`].
    pub(crate) fn from_panic(label: &str, payload: &(dyn core::any::Any + Send)) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_owned()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "non-string panic payload".to_owned()
        };
        Self::Kernel {
            label: label.to_owned(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_payloads_are_rendered() {
        let payload: Box<dyn core::any::Any + Send> = Box::new("boom");
        let err = Error::from_panic("axpy", payload.as_ref());
        assert_eq!(err.to_string(), "kernel `axpy` failed: boom");

        let payload: Box<dyn core::any::Any + Send> = Box::new(String::from("index 7"));
        let err = Error::from_panic("fill", payload.as_ref());
        assert_eq!(
            err,
            Error::Kernel {
                label: "fill".into(),
                message: "index 7".into()
            }
        );

        let payload: Box<dyn core::any::Any + Send> = Box::new(17_u8);
        let err = Error::from_panic("k", payload.as_ref());
        assert!(matches!(err, Error::Kernel { message, .. } if message == "non-string panic payload"));
    }

    #[test]
    fn guard_catches_panics() {
        assert_eq!(Error::guard("ok", || 5), Ok(5));
        let err = Error::guard("bad", || -> u8 { panic!("kaput") }).unwrap_err();
        assert_eq!(err.to_string(), "kernel `bad` failed: kaput");
    }
}
