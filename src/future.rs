//! Shared completion handles.
//!
//! A [`Completion`] is the task-model side of the bridge: a clonable handle
//! that becomes ready exactly once, supports attaching continuations without
//! blocking, and implements [`Future`] so it composes with `futures`
//! combinators. A [`Promise`] is the producing side.

mod signal;

pub use signal::{signal_for, signal_for_global};

use crate::{
    error::{Error, Result},
    sync::{Arc, AtomicBool, Mutex, Ordering},
};
use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
    time::Duration,
};
use tracing::error;

/// Pause of a helping wait when the pool has nothing to run.
const HELP_BACKOFF: Duration = Duration::from_micros(20);

type Continuation<T> = Box<dyn FnOnce(&Result<T>) + Send>;

struct Shared<T> {
    /// Set after `slot.outcome` is populated; lets `is_ready` skip the lock.
    ready: AtomicBool,
    slot: Mutex<Slot<T>>,
}

struct Slot<T> {
    outcome: Option<Result<T>>,
    continuations: Vec<Continuation<T>>,
    wakers: Vec<Waker>,
}

impl<T: Clone + Send + 'static> Shared<T> {
    fn new(outcome: Option<Result<T>>) -> Self {
        Self {
            ready: AtomicBool::new(outcome.is_some()),
            slot: Mutex::new(Slot {
                outcome,
                continuations: Vec::new(),
                wakers: Vec::new(),
            }),
        }
    }

    fn resolve(&self, outcome: Result<T>) {
        let (continuations, wakers) = {
            let mut slot = self.slot.lock();
            assert!(slot.outcome.is_none(), "Shared::resolve: [1]");
            slot.outcome = Some(outcome.clone());
            self.ready.store(true, Ordering::Release);
            (
                core::mem::take(&mut slot.continuations),
                core::mem::take(&mut slot.wakers),
            )
        };
        // Continuations run outside the lock so they may touch this handle.
        for continuation in continuations {
            continuation(&outcome);
        }
        for waker in wakers {
            waker.wake();
        }
    }
}

/// Create a connected [`Promise`] / [`Completion`] pair.
#[must_use]
pub fn channel<T: Clone + Send + 'static>() -> (Promise<T>, Completion<T>) {
    let shared = Arc::new(Shared::new(None));
    (
        Promise {
            shared: Some(Arc::clone(&shared)),
        },
        Completion { shared },
    )
}

/// Shared handle to the eventual outcome of submitted work.
///
/// Cloning is cheap and every clone observes the same outcome.
#[must_use]
pub struct Completion<T = ()>
where
    T: Clone + Send + 'static,
{
    shared: Arc<Shared<T>>,
}

impl<T: Clone + Send + 'static> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + Send + 'static> Completion<T> {
    /// An already-completed handle.
    pub fn ready(value: T) -> Self {
        Self::from_outcome(Ok(value))
    }

    /// An already-failed handle.
    pub fn failed(error: Error) -> Self {
        Self::from_outcome(Err(error))
    }

    /// An already-resolved handle with the given outcome.
    pub fn from_outcome(outcome: Result<T>) -> Self {
        Self {
            shared: Arc::new(Shared::new(Some(outcome))),
        }
    }

    /// Whether the outcome is available.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.ready.load(Ordering::Acquire)
    }

    /// The outcome if it is already available.
    #[must_use]
    pub fn try_get(&self) -> Option<Result<T>> {
        self.shared.slot.lock().outcome.clone()
    }

    /// Block the calling thread until the outcome is available and return it.
    ///
    /// # Errors
    /// Whatever the producing work reported: a kernel fault, a broken
    /// promise, or an error propagated through continuations.
    ///
    /// On a rayon worker the wait runs other pool jobs instead of parking,
    /// so work this handle depends on still finds a worker.
    pub fn get(&self) -> Result<T> {
        if let Some(outcome) = self.try_get() {
            return outcome;
        }
        if rayon::current_thread_index().is_some() {
            return self.help_until_ready();
        }
        futures::executor::block_on(self.clone())
    }

    fn help_until_ready(&self) -> Result<T> {
        loop {
            if let Some(outcome) = self.try_get() {
                return outcome;
            }
            if !matches!(rayon::yield_now(), Some(rayon::Yield::Executed)) {
                std::thread::sleep(HELP_BACKOFF);
            }
        }
    }

    /// Block until ready, discarding the outcome.
    pub fn wait(&self) {
        // The outcome stays observable through `get` on any clone.
        let _ = self.get();
    }

    /// Attach a continuation that runs exactly once with the outcome.
    ///
    /// Never blocks: if the handle is pending the continuation is stored and
    /// runs on the thread that completes it; otherwise it runs immediately.
    pub fn on_complete<F>(&self, continuation: F)
    where
        F: FnOnce(&Result<T>) + Send + 'static,
    {
        let mut slot = self.shared.slot.lock();
        let outcome = slot.outcome.clone();
        match outcome {
            Some(outcome) => {
                drop(slot);
                continuation(&outcome);
            }
            None => slot.continuations.push(Box::new(continuation)),
        }
    }

    /// Chain a continuation producing a new handle.
    pub fn then<U, F>(&self, continuation: F) -> Completion<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(Result<T>) -> Result<U> + Send + 'static,
    {
        let (promise, next) = channel();
        self.on_complete(move |outcome| promise.complete(continuation(outcome.clone())));
        next
    }

    /// Transform a successful value; errors pass through untouched.
    pub fn map<U, F>(&self, f: F) -> Completion<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.then(move |outcome| outcome.map(f))
    }

    /// Forget the value, keeping only completion and errors.
    pub fn discard(&self) -> Completion<()> {
        self.map(|_| ())
    }
}

impl<T: Clone + Send + 'static> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.slot.lock();
        if let Some(outcome) = &slot.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !slot.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
            slot.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

/// Producing side of a [`Completion`].
///
/// Dropping an unfulfilled promise resolves its completion with
/// [`Error::BrokenPromise`], so waiters never hang on lost work.
pub struct Promise<T = ()>
where
    T: Clone + Send + 'static,
{
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Clone + Send + 'static> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("fulfilled", &self.shared.is_none())
            .finish()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Resolve with an outcome.
    pub fn complete(mut self, outcome: Result<T>) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(outcome);
        }
    }

    /// Resolve from a rayon job, so continuations never run on the
    /// calling thread.
    ///
    /// Used by threads that serve many handles (the event poller, stream
    /// workers) and must not be held up by a continuation that blocks.
    pub(crate) fn complete_detached(self, outcome: Result<T>) {
        rayon::spawn(move || {
            if let Err(err) = Error::guard("continuation", || self.complete(outcome)) {
                error!(%err, "continuation panicked");
            }
        });
    }

    /// Resolve with a value.
    pub fn set_value(self, value: T) {
        self.complete(Ok(value));
    }

    /// Resolve with an error.
    pub fn set_error(self, error: Error) {
        self.complete(Err(error));
    }
}

impl<T: Clone + Send + 'static> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.resolve(Err(Error::BrokenPromise));
        }
    }
}

struct WhenAll {
    remaining: usize,
    first_error: Option<Error>,
    promise: Option<Promise>,
}

/// A handle that completes once every input has completed.
///
/// Reports the first error observed, in completion order.
pub fn when_all<T, I>(handles: I) -> Completion<()>
where
    T: Clone + Send + 'static,
    I: IntoIterator<Item = Completion<T>>,
{
    let handles: Vec<_> = handles.into_iter().collect();
    if handles.is_empty() {
        return Completion::ready(());
    }
    let (promise, all) = channel();
    let state = Arc::new(Mutex::new(WhenAll {
        remaining: handles.len(),
        first_error: None,
        promise: Some(promise),
    }));
    for handle in &handles {
        let state = Arc::clone(&state);
        handle.on_complete(move |outcome| {
            let mut state = state.lock();
            if let Err(err) = outcome {
                state.first_error.get_or_insert_with(|| err.clone());
            }
            state.remaining -= 1;
            if state.remaining == 0 {
                let promise = state.promise.take().expect("when_all: [1]");
                let outcome = state.first_error.take().map_or(Ok(()), Err);
                drop(state);
                promise.complete(outcome);
            }
        });
    }
    all
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use std::{thread, time::Duration};

    #[test]
    fn promise_resolves_every_clone() {
        let (promise, completion) = channel::<u32>();
        let other = completion.clone();
        assert!(!completion.is_ready());
        assert_eq!(completion.try_get(), None);
        promise.set_value(7);
        assert!(other.is_ready());
        assert_eq!(completion.get(), Ok(7));
        assert_eq!(other.get(), Ok(7));
    }

    #[test]
    fn dropped_promise_breaks_completion() {
        let (promise, completion) = channel::<()>();
        drop(promise);
        assert_eq!(completion.get(), Err(Error::BrokenPromise));
    }

    #[test]
    fn get_blocks_until_another_thread_completes() {
        let (promise, completion) = channel::<&'static str>();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.set_value("done");
        });
        assert_eq!(completion.get(), Ok("done"));
        producer.join().unwrap();
    }

    #[test]
    fn detached_completion_runs_continuations_off_the_caller() {
        let (promise, completion) = channel::<u8>();
        let caller = thread::current().id();
        let observed = completion.map(|v| (v, thread::current().id()));
        promise.complete_detached(Ok(5));
        let (value, runner) = observed.get().unwrap();
        assert_eq!(value, 5);
        assert_ne!(runner, caller);
    }

    #[test]
    fn get_on_a_busy_single_worker_pool_makes_progress() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let value = pool.install(|| {
            let (promise, completion) = channel::<u32>();
            rayon::spawn(move || promise.set_value(11));
            completion.get()
        });
        assert_eq!(value, Ok(11));
    }

    #[test]
    fn continuations_attached_before_and_after_completion() {
        let (promise, completion) = channel::<i32>();
        let doubled = completion.map(|v| v * 2);
        assert!(!doubled.is_ready());
        promise.set_value(21);
        assert_eq!(doubled.get(), Ok(42));

        let late = completion.then(|outcome| outcome.map(|v| v + 1));
        assert!(late.is_ready());
        assert_eq!(late.get(), Ok(22));
    }

    #[test]
    fn continuation_may_inspect_its_own_handle() {
        let (promise, completion) = channel::<u8>();
        let inner = completion.clone();
        let seen = completion.then(move |_| inner.get());
        promise.set_value(3);
        assert_eq!(seen.get(), Ok(3));
    }

    #[test]
    fn errors_propagate_through_map() {
        let failed = Completion::<u8>::failed(Error::OverlappingCopy);
        assert_eq!(failed.map(|v| v + 1).get(), Err(Error::OverlappingCopy));
        assert_eq!(failed.discard().get(), Err(Error::OverlappingCopy));
    }

    #[test]
    fn completion_is_a_future() {
        let (promise, completion) = channel::<u64>();
        let waiter = thread::spawn(move || futures::executor::block_on(completion));
        promise.set_value(99);
        assert_eq!(waiter.join().unwrap(), Ok(99));
    }

    #[test]
    fn when_all_waits_for_every_input() {
        let (first, a) = channel::<()>();
        let (second, b) = channel::<()>();
        let all = when_all([a, b]);
        first.set_value(());
        assert!(!all.is_ready());
        second.set_value(());
        assert_eq!(all.get(), Ok(()));
    }

    #[test]
    fn when_all_reports_first_error() {
        let (first, a) = channel::<()>();
        let (second, b) = channel::<()>();
        let all = when_all(vec![a, b]);
        second.set_error(Error::OverlappingCopy);
        first.set_error(Error::BrokenPromise);
        assert_eq!(all.get(), Err(Error::OverlappingCopy));
    }

    #[test]
    fn when_all_of_nothing_is_ready() {
        assert!(when_all(Vec::<Completion>::new()).is_ready());
    }
}
