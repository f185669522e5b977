use super::Completion;
#[cfg(feature = "stream")]
use super::channel;
#[cfg(feature = "stream")]
use crate::{config::StreamCompletion, space::Stream};
use crate::space::{ExecutionSpace, SignalSource};
use tracing::trace;

/// Completion handle for all work enqueued on `space` so far.
///
/// Never blocks on backends with async completion. Backends without it
/// (see [`Capability::async_completion`](crate::space::Capability)) are
/// fenced on the calling thread and get an already-ready handle. An
/// instance with no outstanding work always yields a ready handle.
pub fn signal_for<S: ExecutionSpace>(space: &S) -> Completion {
    match space.signal_source() {
        SignalSource::Fence => {
            trace!(space = S::NAME, "no async completion; fencing");
            space.fence();
            Completion::ready(())
        }
        #[cfg(feature = "stream")]
        SignalSource::Stream(stream) => stream_signal(&stream),
        SignalSource::Native(completion) => {
            trace!(space = S::NAME, instance = %space.instance_id(), "native completion");
            completion
        }
    }
}

/// [`signal_for`] on the backend's global instance.
pub fn signal_for_global<S: ExecutionSpace>() -> Completion {
    signal_for(&S::global())
}

#[cfg(feature = "stream")]
fn stream_signal(stream: &Stream) -> Completion {
    let event = stream.record_event();
    if event.is_complete() {
        return Completion::from_outcome(event.outcome());
    }
    let (promise, completion) = channel();
    match stream.strategy() {
        StreamCompletion::Event => {
            trace!(?event, "completion via polled event");
            stream.poller().register(event, promise);
        }
        StreamCompletion::Callback => {
            trace!(?event, "completion via host callback");
            stream.host_callback(move |outcome| promise.complete_detached(outcome));
        }
    }
    completion
}
