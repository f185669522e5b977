use super::{Capability, ExecutionSpace, Parallelism, SignalSource, poller::Poller};
use crate::{
    config::{Config, StreamCompletion},
    error::{Error, Result},
    types::{InstanceId, Work},
    view::MemorySpace,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, error, trace};

/// Longest a fencing rayon worker sleeps before looking for pool jobs again.
const FENCE_BACKOFF: Duration = Duration::from_micros(50);

/// An emulated accelerator: owns the default stream, the event poller and
/// the live-stream budget.
///
/// Cloning is cheap; clones share everything.
#[derive(Clone)]
pub struct StreamDevice {
    shared: Arc<DeviceShared>,
}

struct DeviceShared {
    config: Config,
    poller: Arc<Poller>,
    live_streams: Arc<AtomicUsize>,
    default_stream: Stream,
}

impl fmt::Debug for StreamDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamDevice")
            .field("config", &self.shared.config)
            .field("live_streams", &self.live_streams())
            .finish_non_exhaustive()
    }
}

impl StreamDevice {
    /// Bring up a device: start its poller and open its default stream.
    ///
    /// # Errors
    /// [`Error::ResourceCreation`] if a thread cannot be spawned or the
    /// stream limit does not even admit the default stream.
    pub fn new(config: Config) -> Result<Self> {
        let poller = Arc::new(Poller::spawn(config.poll_interval)?);
        let live_streams = Arc::new(AtomicUsize::new(0));
        let default_stream = open_stream(&config, &poller, &live_streams)?;
        debug!(?config, "stream device ready");
        Ok(Self {
            shared: Arc::new(DeviceShared {
                config,
                poller,
                live_streams,
                default_stream,
            }),
        })
    }

    /// The process-wide device, configured from the environment on first
    /// use.
    ///
    /// # Errors
    /// The error that prevented the device from starting; it is cached and
    /// returned on every call.
    pub fn try_global() -> Result<&'static Self> {
        static GLOBAL: OnceLock<Result<StreamDevice>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Self::new(Config::from_env()))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// The process-wide device.
    ///
    /// # Panics
    /// If the device cannot be started, which leaves no default execution
    /// space to run on.
    #[must_use]
    pub fn global() -> &'static Self {
        Self::try_global()
            .unwrap_or_else(|err| panic!("failed to start the global stream device: {err}"))
    }

    /// Configuration the device was started with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// The device's default stream.
    #[must_use]
    pub fn default_stream(&self) -> Stream {
        self.shared.default_stream.clone()
    }

    /// Open a new stream.
    ///
    /// # Errors
    /// [`Error::ResourceCreation`] when the live-stream limit is reached or
    /// the worker thread cannot be spawned.
    pub fn create_stream(&self) -> Result<Stream> {
        open_stream(
            &self.shared.config,
            &self.shared.poller,
            &self.shared.live_streams,
        )
    }

    /// Number of streams currently alive, the default one included.
    #[must_use]
    pub fn live_streams(&self) -> usize {
        self.shared.live_streams.load(Ordering::Acquire)
    }
}

fn open_stream(
    config: &Config,
    poller: &Arc<Poller>,
    live_streams: &Arc<AtomicUsize>,
) -> Result<Stream> {
    let reserved = live_streams.fetch_add(1, Ordering::AcqRel);
    if reserved >= config.max_streams {
        live_streams.fetch_sub(1, Ordering::AcqRel);
        return Err(Error::resource(
            Stream::NAME,
            format!("stream limit of {} reached", config.max_streams),
        ));
    }
    let queue = Arc::new(StreamQueue::new(InstanceId::next()));
    let worker = thread::Builder::new()
        .name(format!("ktb-stream-{}", queue.id.get()))
        .spawn({
            let queue = Arc::clone(&queue);
            move || queue.drain()
        })
        .map_err(|err| {
            live_streams.fetch_sub(1, Ordering::AcqRel);
            Error::resource(Stream::NAME, err)
        })?;
    debug!(stream = %queue.id, strategy = %config.stream_completion, "stream created");
    Ok(Stream {
        handle: Arc::new(StreamHandle {
            queue,
            worker: Some(worker),
            poller: Arc::clone(poller),
            strategy: config.stream_completion,
            live_streams: Arc::clone(live_streams),
        }),
    })
}

struct Command {
    label: String,
    work: Work,
}

struct QueueState {
    commands: VecDeque<Command>,
    submitted: u64,
    shutdown: bool,
    /// First fault and the sequence number of the command that raised it.
    fault: Option<(u64, Error)>,
}

/// In-order command queue shared between a stream handle, its worker and
/// the poller.
pub(crate) struct StreamQueue {
    id: InstanceId,
    state: Mutex<QueueState>,
    work_ready: Condvar,
    progress: Condvar,
    completed: AtomicU64,
}

impl StreamQueue {
    fn new(id: InstanceId) -> Self {
        Self {
            id,
            state: Mutex::new(QueueState {
                commands: VecDeque::new(),
                submitted: 0,
                shutdown: false,
                fault: None,
            }),
            work_ready: Condvar::new(),
            progress: Condvar::new(),
            completed: AtomicU64::new(0),
        }
    }

    pub(crate) fn id(&self) -> InstanceId {
        self.id
    }

    pub(crate) fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn submit(&self, label: &str, work: Work) -> u64 {
        let mut state = self.state.lock();
        state.submitted += 1;
        state.commands.push_back(Command {
            label: label.to_owned(),
            work,
        });
        self.work_ready.notify_one();
        state.submitted
    }

    fn submitted(&self) -> u64 {
        self.state.lock().submitted
    }

    /// Block until everything submitted so far has run.
    ///
    /// A rayon worker keeps running pool jobs while it waits, since the
    /// kernels it waits for spread their bodies over that pool.
    fn fence(&self) {
        let mut state = self.state.lock();
        let target = state.submitted;
        let on_pool = rayon::current_thread_index().is_some();
        while self.completed() < target {
            if !on_pool {
                self.progress.wait(&mut state);
                continue;
            }
            let helped = MutexGuard::unlocked(&mut state, || {
                matches!(rayon::yield_now(), Some(rayon::Yield::Executed))
            });
            if !helped {
                self.progress.wait_for(&mut state, FENCE_BACKOFF);
            }
        }
    }

    /// Outcome of every command up to and including `target`.
    pub(crate) fn outcome_through(&self, target: u64) -> Result<()> {
        match &self.state.lock().fault {
            Some((seq, err)) if *seq <= target => Err(err.clone()),
            _ => Ok(()),
        }
    }

    fn drain(&self) {
        loop {
            let command = {
                let mut state = self.state.lock();
                loop {
                    if let Some(command) = state.commands.pop_front() {
                        break command;
                    }
                    if state.shutdown {
                        return;
                    }
                    self.work_ready.wait(&mut state);
                }
            };
            trace!(stream = %self.id, label = %command.label, "kernel started");
            let outcome = Error::guard(&command.label, command.work);
            let mut state = self.state.lock();
            let seq = self.completed() + 1;
            if let Err(err) = outcome {
                error!(stream = %self.id, label = %command.label, %err, "kernel fault");
                state.fault.get_or_insert((seq, err));
            }
            self.completed.store(seq, Ordering::Release);
            self.progress.notify_all();
        }
    }
}

/// Point in a stream's command sequence.
///
/// Complete once every command submitted before it was recorded has run.
#[derive(Clone)]
pub struct StreamEvent {
    pub(crate) queue: Arc<StreamQueue>,
    pub(crate) target: u64,
}

impl fmt::Debug for StreamEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamEvent")
            .field("stream", &self.queue.id)
            .field("target", &self.target)
            .field("complete", &self.is_complete())
            .finish()
    }
}

impl StreamEvent {
    /// Whether the event has fired.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.queue.completed() >= self.target
    }

    /// Fault status of the work preceding the event.
    ///
    /// # Errors
    /// The sticky [`Error::Kernel`] if a command before the event panicked.
    pub fn outcome(&self) -> Result<()> {
        self.queue.outcome_through(self.target)
    }
}

struct StreamHandle {
    queue: Arc<StreamQueue>,
    worker: Option<JoinHandle<()>>,
    poller: Arc<Poller>,
    strategy: StreamCompletion,
    live_streams: Arc<AtomicUsize>,
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        {
            let mut state = self.queue.state.lock();
            state.shutdown = true;
            self.queue.work_ready.notify_one();
        }
        // Destroying a stream waits for its outstanding work.
        if let Some(worker) = self.worker.take() {
            let on_worker = worker.thread().id() == thread::current().id();
            if !on_worker && worker.join().is_err() {
                error!(stream = %self.queue.id, "stream worker terminated abnormally");
            }
        }
        self.live_streams.fetch_sub(1, Ordering::AcqRel);
        debug!(stream = %self.queue.id, "stream destroyed");
    }
}

/// Device stream backend: an in-order queue drained by a dedicated worker
/// thread, with kernel index loops spread over the rayon pool.
///
/// Clones share the stream; the last clone to go waits for outstanding
/// work and releases the stream slot on its device.
#[derive(Clone)]
pub struct Stream {
    handle: Arc<StreamHandle>,
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.handle.queue.id)
            .field("strategy", &self.handle.strategy)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.handle.queue.id == other.handle.queue.id
    }
}

impl Eq for Stream {}

impl Stream {
    /// Completion strategy this stream uses.
    #[must_use]
    pub fn strategy(&self) -> StreamCompletion {
        self.handle.strategy
    }

    /// Whether every submitted command has run.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.record_event().is_complete()
    }

    /// Record an event after all currently submitted work.
    #[must_use]
    pub fn record_event(&self) -> StreamEvent {
        StreamEvent {
            queue: Arc::clone(&self.handle.queue),
            target: self.handle.queue.submitted(),
        }
    }

    /// Enqueue a host function that receives the fault status of all work
    /// submitted before it.
    pub fn host_callback<F>(&self, callback: F)
    where
        F: FnOnce(Result<()>) + Send + 'static,
    {
        let queue = Arc::clone(&self.handle.queue);
        let target = self.handle.queue.submit(
            "host callback",
            Box::new(move || callback(queue.outcome_through(queue.completed()))),
        );
        trace!(stream = %self.handle.queue.id, target, "host callback enqueued");
    }

    pub(crate) fn poller(&self) -> &Poller {
        &self.handle.poller
    }
}

impl ExecutionSpace for Stream {
    const NAME: &'static str = "Stream";
    const CAPABILITY: Capability = Capability {
        async_completion: true,
        independent_instances: true,
        parallelism: Parallelism::Rayon,
        reduce_result_space: MemorySpace::HostPinned,
    };

    fn global() -> Self {
        StreamDevice::global().default_stream()
    }

    fn independent() -> Result<Self> {
        StreamDevice::try_global()?.create_stream()
    }

    fn instance_id(&self) -> InstanceId {
        self.handle.queue.id
    }

    fn enqueue(&self, label: &str, work: Work) {
        let seq = self.handle.queue.submit(label, work);
        trace!(stream = %self.handle.queue.id, label, seq, "kernel enqueued");
    }

    fn fence(&self) {
        trace!(stream = %self.handle.queue.id, "fence");
        self.handle.queue.fence();
    }

    fn signal_source(&self) -> SignalSource {
        SignalSource::Stream(self.clone())
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use std::{sync::mpsc, time::Duration};

    fn device(max_streams: usize) -> StreamDevice {
        StreamDevice::new(Config::default().with_max_streams(max_streams)).unwrap()
    }

    #[test]
    fn commands_run_in_submission_order() {
        let stream = device(2).default_stream();
        let log = Arc::new(Mutex::new(Vec::new()));
        for i in 0..16 {
            let log = Arc::clone(&log);
            stream.enqueue("push", Box::new(move || log.lock().push(i)));
        }
        stream.fence();
        assert_eq!(*log.lock(), (0..16).collect::<Vec<_>>());
        assert!(stream.is_idle());
    }

    #[test]
    fn events_fire_after_preceding_work() {
        let stream = device(2).default_stream();
        assert!(stream.record_event().is_complete());
        let (release, gate) = mpsc::channel::<()>();
        stream.enqueue(
            "blocked",
            Box::new(move || {
                let _ = gate.recv_timeout(Duration::from_secs(5));
            }),
        );
        let event = stream.record_event();
        assert!(!event.is_complete());
        release.send(()).unwrap();
        stream.fence();
        assert!(event.is_complete());
        assert_eq!(event.outcome(), Ok(()));
    }

    #[test]
    fn faults_are_sticky_from_the_failing_command_on() {
        let stream = device(2).default_stream();
        stream.enqueue("fine", Box::new(|| {}));
        let before = stream.record_event();
        stream.enqueue("broken", Box::new(|| panic!("device fault")));
        stream.fence();
        let after = stream.record_event();
        assert_eq!(before.outcome(), Ok(()));
        assert!(matches!(after.outcome(), Err(Error::Kernel { label, .. }) if label == "broken"));
        stream.enqueue("later", Box::new(|| {}));
        stream.fence();
        assert!(stream.record_event().outcome().is_err());
    }

    #[test]
    fn host_callbacks_see_prior_faults() {
        let stream = device(2).default_stream();
        let (tx, rx) = mpsc::channel();
        stream.host_callback({
            let tx = tx.clone();
            move |outcome| tx.send(outcome).unwrap()
        });
        stream.enqueue("broken", Box::new(|| panic!("boom")));
        stream.host_callback(move |outcome| tx.send(outcome).unwrap());
        assert_eq!(rx.recv().unwrap(), Ok(()));
        assert!(rx.recv().unwrap().is_err());
    }

    #[test]
    fn stream_limit_is_enforced_and_released() {
        let device = device(2);
        assert_eq!(device.live_streams(), 1);
        let extra = device.create_stream().unwrap();
        assert_ne!(extra, device.default_stream());
        assert!(matches!(
            device.create_stream(),
            Err(Error::ResourceCreation { backend: "Stream", .. })
        ));
        drop(extra);
        assert_eq!(device.live_streams(), 1);
        assert!(device.create_stream().is_ok());
    }

    #[test]
    fn dropping_a_stream_finishes_its_work() {
        let device = device(4);
        let stream = device.create_stream().unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..8 {
            let done = Arc::clone(&done);
            stream.enqueue(
                "count",
                Box::new(move || {
                    done.fetch_add(1, Ordering::Relaxed);
                }),
            );
        }
        drop(stream);
        assert_eq!(done.load(Ordering::Relaxed), 8);
    }
}
