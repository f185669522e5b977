use super::stream::{StreamEvent, StreamQueue};
use crate::{
    error::{Error, Result},
    future::Promise,
    types::{IndexMap, InstanceId},
};
use core::time::Duration;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread::{self, JoinHandle},
};
use tracing::{debug, error, trace};

/// Promises waiting on events of one stream, keyed by event target.
struct Waiters {
    queue: Arc<StreamQueue>,
    promises: Vec<(u64, Promise)>,
}

struct PollerShared {
    /// Insertion-ordered so streams are polled in registration order.
    pending: Mutex<IndexMap<InstanceId, Waiters>>,
    wake: Condvar,
    shutdown: AtomicBool,
    interval: Duration,
}

/// Background thread resolving promises registered against stream events.
///
/// Lives as long as its device, so every registered promise is either
/// resolved or, on shutdown, broken.
pub(crate) struct Poller {
    shared: Arc<PollerShared>,
    thread: Option<JoinHandle<()>>,
}

impl Poller {
    pub(crate) fn spawn(interval: Duration) -> Result<Self> {
        let shared = Arc::new(PollerShared {
            pending: Mutex::new(IndexMap::default()),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
            interval,
        });
        let thread = thread::Builder::new()
            .name("ktb-poller".to_owned())
            .spawn({
                let shared = Arc::clone(&shared);
                move || shared.run()
            })
            .map_err(|err| Error::resource("Poller", err))?;
        debug!(?interval, "event poller started");
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Resolve `promise` with the event's outcome once it fires.
    pub(crate) fn register(&self, event: StreamEvent, promise: Promise) {
        let mut pending = self.shared.pending.lock();
        let stream = event.queue.id();
        pending
            .entry(stream)
            .or_insert_with(|| Waiters {
                queue: event.queue,
                promises: Vec::new(),
            })
            .promises
            .push((event.target, promise));
        trace!(%stream, target = event.target, "event registered");
        self.shared.wake.notify_one();
    }
}

impl PollerShared {
    fn run(&self) {
        let mut pending = self.pending.lock();
        while !self.shutdown.load(Ordering::Acquire) {
            if pending.is_empty() {
                self.wake.wait(&mut pending);
                continue;
            }
            let fired = Self::collect_fired(&mut pending);
            if fired.is_empty() {
                self.wake.wait_for(&mut pending, self.interval);
                continue;
            }
            // Continuations run on rayon and may block or register new events.
            MutexGuard::unlocked(&mut pending, || {
                for (promise, outcome) in fired {
                    promise.complete_detached(outcome);
                }
            });
        }
        let abandoned = core::mem::take(&mut *pending);
        drop(pending);
        if !abandoned.is_empty() {
            debug!(streams = abandoned.len(), "poller stopped with pending events");
        }
    }

    fn collect_fired(pending: &mut IndexMap<InstanceId, Waiters>) -> Vec<(Promise, Result<()>)> {
        let mut fired = Vec::new();
        pending.retain(|_, waiters| {
            let completed = waiters.queue.completed();
            let (done, waiting): (Vec<_>, Vec<_>) = core::mem::take(&mut waiters.promises)
                .into_iter()
                .partition(|(target, _)| *target <= completed);
            fired.extend(
                done.into_iter()
                    .map(|(target, promise)| (promise, waiters.queue.outcome_through(target))),
            );
            waiters.promises = waiting;
            !waiters.promises.is_empty()
        });
        fired
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        {
            let _pending = self.shared.pending.lock();
            self.shared.shutdown.store(true, Ordering::Release);
            self.shared.wake.notify_one();
        }
        if let Some(handle) = self.thread.take() {
            let on_poller = handle.thread().id() == thread::current().id();
            if !on_poller && handle.join().is_err() {
                error!("event poller terminated abnormally");
            }
        }
    }
}
