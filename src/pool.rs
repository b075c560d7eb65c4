use super::{
    errors::{PoolError, Result, SendError},
    load::LoadTracker,
    model::{PoolMetrics, RecvStatus, StopPolicy, StopSummary},
    queue::QueueSet,
    selector::{RoundRobin, Selector},
    worker::{Callback, Worker, WorkerGauge},
};
use parking_lot::RwLock;
use std::{
    fmt,
    sync::{
        atomic::{AtomicU8, AtomicUsize, Ordering},
        Arc,
    },
};
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{self, error::TrySendError},
        Semaphore,
    },
};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_QUEUE_LEN: usize = 1 << 9;
pub const DEFAULT_QUEUE_COUNT: usize = 1 << 1;
pub const DEFAULT_STEP: usize = 1 << 1;
pub const DEFAULT_LOAD_FACTOR: u8 = 3;

/// Pool configuration. Fixed once the pool is built.
pub struct Config<T> {
    /// Items each queue buffers.
    pub queue_len: usize,
    /// Queues created up front. The pool never shrinks below this.
    pub queue_count: usize,
    /// Queues added per growth and removed per shrink.
    pub step: usize,
    /// Grow once slack `capacity - load` is below `capacity >> load_factor`.
    pub load_factor: u8,
    pub selector: Arc<dyn Selector<T>>,
}

impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Self {
            queue_len: self.queue_len,
            queue_count: self.queue_count,
            step: self.step,
            load_factor: self.load_factor,
            selector: self.selector.clone(),
        }
    }
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("queue_len", &self.queue_len)
            .field("queue_count", &self.queue_count)
            .field("step", &self.step)
            .field("load_factor", &self.load_factor)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Default for Config<T> {
    fn default() -> Self {
        Self {
            queue_len: DEFAULT_QUEUE_LEN,
            queue_count: DEFAULT_QUEUE_COUNT,
            step: DEFAULT_STEP,
            load_factor: DEFAULT_LOAD_FACTOR,
            selector: Arc::new(RoundRobin::new()),
        }
    }
}

impl<T: 'static> Config<T> {
    /// One base queue per core, growing a core's worth at a time.
    pub fn per_core() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            queue_count: num_cpus,
            step: num_cpus,
            ..Default::default()
        }
    }

    pub fn with_selector<S>(mut self, selector: S) -> Self
    where
        S: Selector<T> + 'static,
    {
        self.selector = Arc::new(selector);
        self
    }
}

impl<T> Config<T> {
    pub fn validate(&self) -> Result<()> {
        if self.queue_len == 0 {
            return Err(PoolError::InvalidConfig("queue_len must be positive"));
        }
        if self.queue_len > Semaphore::MAX_PERMITS {
            return Err(PoolError::InvalidConfig("queue_len too large"));
        }
        if self.queue_count == 0 {
            return Err(PoolError::InvalidConfig("queue_count must be positive"));
        }
        if self.step == 0 {
            return Err(PoolError::InvalidConfig("step must be positive"));
        }
        if self.load_factor >= 63 {
            return Err(PoolError::InvalidConfig("load_factor must be below 63"));
        }
        Ok(())
    }
}

pub type DispatchPool<T> = Arc<DispatchPoolInner<T>>;

/// Elastic fan-out pool: routes values to bounded queues, one worker per queue.
///
/// Queue count grows by `step` when slack runs low and shrinks back, one step
/// per callback completion, once load returns under the pre-growth watermark.
pub struct DispatchPoolInner<T> {
    config: Config<T>,
    queues: RwLock<QueueSet<T>>,
    pub(crate) tracker: LoadTracker,
    callback: Callback<T>,
    status: AtomicU8,
    cancel: CancellationToken,
    workers: Arc<WorkerGauge>,
    next_worker_id: AtomicUsize,
    processed: AtomicUsize,
    panicked: AtomicUsize,
    rejected: AtomicUsize,
    abandoned: AtomicUsize,
    grown: AtomicUsize,
    shrunk: AtomicUsize,
}

impl<T: Send + 'static> DispatchPoolInner<T> {
    pub fn new<F>(callback: F) -> DispatchPool<T>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(Config::default(), Arc::new(callback))
    }

    pub fn with_config<F>(config: Config<T>, callback: F) -> Result<DispatchPool<T>>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        config.validate()?;
        Ok(Self::build(config, Arc::new(callback)))
    }

    pub fn builder() -> Builder<T> {
        Builder::new()
    }

    fn build(config: Config<T>, callback: Callback<T>) -> DispatchPool<T> {
        let queues = QueueSet::new(config.queue_count, config.queue_len);
        let tracker = LoadTracker::new(queues.capacity(), config.load_factor);
        Arc::new(Self {
            config,
            queues: RwLock::new(queues),
            tracker,
            callback,
            status: AtomicU8::new(RecvStatus::Stopped as u8),
            cancel: CancellationToken::new(),
            workers: Arc::new(WorkerGauge::default()),
            next_worker_id: AtomicUsize::new(0),
            processed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(0),
            grown: AtomicUsize::new(0),
            shrunk: AtomicUsize::new(0),
        })
    }

    /// Submits a value.
    ///
    /// With `block` the caller waits for room in the selected queue. Without
    /// it a full queue yields [`SendError::Block`] carrying the value back.
    pub async fn send(self: &Arc<Self>, value: T, block: bool) -> std::result::Result<(), SendError<T>> {
        if !block {
            return self.try_send(value);
        }
        if self.status() == RecvStatus::Terminated {
            return Err(SendError::Terminated(value));
        }

        // the read guard only spans the sender lookup, never the await below
        let tx = {
            let queues = self.queues.read();
            if queues.is_empty() {
                None
            } else {
                let index = self.config.selector.select(&value, queues.len());
                Some(queues.sender(index).clone())
            }
        };
        let Some(tx) = tx else {
            return Err(SendError::Terminated(value));
        };

        // only a reserved slot is counted, so a dropped future leaves load untouched
        let Ok(permit) = tx.reserve().await else {
            return Err(SendError::Terminated(value));
        };
        self.tracker.acquire();
        permit.send(value);
        drop(tx);

        self.grow();
        Ok(())
    }

    /// Non-blocking submit. A rejection still counts as a load signal.
    pub fn try_send(self: &Arc<Self>, value: T) -> std::result::Result<(), SendError<T>> {
        if self.status() == RecvStatus::Terminated {
            return Err(SendError::Terminated(value));
        }

        let attempt = {
            let queues = self.queues.read();
            if queues.is_empty() {
                Err(TrySendError::Closed(value))
            } else {
                let index = self.config.selector.select(&value, queues.len());
                match queues.sender(index).try_reserve() {
                    Ok(permit) => {
                        self.tracker.acquire();
                        permit.send(value);
                        Ok(())
                    }
                    Err(TrySendError::Full(())) => Err(TrySendError::Full(value)),
                    Err(TrySendError::Closed(())) => Err(TrySendError::Closed(value)),
                }
            }
        };

        match attempt {
            Ok(()) => {
                self.grow();
                Ok(())
            }
            Err(TrySendError::Full(value)) => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                self.grow();
                Err(SendError::Block(value))
            }
            Err(TrySendError::Closed(value)) => Err(SendError::Terminated(value)),
        }
    }

    /// Spawns one worker per existing queue on the current tokio runtime.
    pub fn start_recv(self: &Arc<Self>) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;
        self.transition(RecvStatus::Stopped, RecvStatus::Started)?;

        let mut queues = self.queues.write();
        queues.runtime = Some(runtime.clone());
        let pending = queues.take_pending();
        let spawned = pending.len();
        for rx in pending {
            self.spawn_worker(&runtime, rx);
        }
        tracing::info!(workers = spawned, capacity = queues.capacity(), "receive started");
        Ok(())
    }

    /// Closes every queue and waits for all workers to exit.
    ///
    /// The pool cannot be restarted afterwards; sends fail with
    /// [`SendError::Terminated`].
    pub async fn stop_recv(&self, policy: StopPolicy) -> Result<StopSummary> {
        self.transition(RecvStatus::Started, RecvStatus::Terminated)?;

        let workers = self.workers.live();
        let abandoned_before = self.abandoned.load(Ordering::Acquire);
        let closed = {
            let mut queues = self.queues.write();
            self.tracker.reset();
            queues.close_all()
        };
        if policy == StopPolicy::Abandon {
            self.cancel.cancel();
        }
        drop(closed);

        self.workers.wait_idle().await;

        let abandoned = self.abandoned.load(Ordering::Acquire) - abandoned_before;
        tracing::info!(?policy, workers, abandoned, "receive stopped");
        Ok(StopSummary { workers, abandoned })
    }

    fn spawn_worker(self: &Arc<Self>, runtime: &Handle, rx: mpsc::Receiver<T>) {
        let worker = Worker {
            id: self.next_worker_id.fetch_add(1, Ordering::Relaxed),
            rx,
            pool: Arc::downgrade(self),
            callback: self.callback.clone(),
            cancel: self.cancel.clone(),
            guard: self.workers.enter(),
        };
        runtime.spawn(worker.run());
    }

    fn grow(self: &Arc<Self>) -> bool {
        if !self.tracker.grow_due() {
            return false;
        }

        let mut queues = self.queues.write();
        if !self.tracker.grow_due() || queues.is_empty() {
            return false;
        }

        queues.append(self.config.step);
        self.tracker.record_growth(queues.capacity());
        self.grown.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            queues = queues.len(),
            capacity = self.tracker.capacity(),
            pre_capacity = self.tracker.pre_capacity(),
            load = self.tracker.load(),
            "pool grown"
        );

        if let Some(runtime) = queues.runtime.clone() {
            for rx in queues.take_pending() {
                self.spawn_worker(&runtime, rx);
            }
        }
        true
    }

    pub(crate) fn shrink(&self) -> bool {
        if !self.tracker.shrink_due() {
            return false;
        }

        let closed = {
            let mut queues = self.queues.write();
            if !self.tracker.shrink_due() {
                return false;
            }
            let closed = queues.truncate(self.config.step);
            if closed.is_empty() {
                return false;
            }
            let next = queues.next_pre_capacity(self.config.step);
            self.tracker.record_shrink(queues.capacity(), next);
            tracing::debug!(
                queues = queues.len(),
                capacity = self.tracker.capacity(),
                pre_capacity = next,
                load = self.tracker.load(),
                "pool shrunk"
            );
            closed
        };

        // workers of the removed queues drain what is buffered, then exit
        drop(closed);
        self.shrunk.fetch_add(1, Ordering::Relaxed);
        true
    }
}

impl<T> DispatchPoolInner<T> {
    fn transition(&self, from: RecvStatus, to: RecvStatus) -> Result<()> {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|current| match RecvStatus::from_u8(current) {
                RecvStatus::Started => PoolError::RecvStarted,
                RecvStatus::Stopped => PoolError::RecvNotStarted,
                RecvStatus::Terminated => PoolError::Terminated,
            })
    }

    #[inline]
    pub fn status(&self) -> RecvStatus {
        RecvStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn config(&self) -> &Config<T> {
        &self.config
    }

    pub(crate) fn record_processed(&self, ok: bool, worker: usize) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.panicked.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(worker, "callback panicked");
        }
    }

    pub(crate) fn record_abandoned(&self, count: usize) {
        self.abandoned.fetch_add(count, Ordering::AcqRel);
        for _ in 0..count {
            self.tracker.release();
        }
    }

    #[inline]
    pub fn metrics(&self) -> PoolMetrics {
        PoolMetrics {
            queues: self.queues.read().len(),
            capacity: self.tracker.capacity(),
            pre_capacity: self.tracker.pre_capacity(),
            load: self.tracker.load(),
            live_workers: self.workers.live(),
            processed: self.processed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            grown: self.grown.load(Ordering::Relaxed),
            shrunk: self.shrunk.load(Ordering::Relaxed),
        }
    }
}

/// Step-by-step construction. `build` fails if no callback was given.
pub struct Builder<T> {
    config: Config<T>,
    callback: Option<Callback<T>>,
}

impl<T: Send + 'static> Default for Builder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> Builder<T> {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            callback: None,
        }
    }

    pub fn config(mut self, config: Config<T>) -> Self {
        self.config = config;
        self
    }

    pub fn queue_len(mut self, queue_len: usize) -> Self {
        self.config.queue_len = queue_len;
        self
    }

    pub fn queue_count(mut self, queue_count: usize) -> Self {
        self.config.queue_count = queue_count;
        self
    }

    pub fn step(mut self, step: usize) -> Self {
        self.config.step = step;
        self
    }

    pub fn load_factor(mut self, load_factor: u8) -> Self {
        self.config.load_factor = load_factor;
        self
    }

    pub fn selector<S>(mut self, selector: S) -> Self
    where
        S: Selector<T> + 'static,
    {
        self.config.selector = Arc::new(selector);
        self
    }

    pub fn callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> Result<DispatchPool<T>> {
        let callback = self.callback.ok_or(PoolError::CallbackMissing)?;
        self.config.validate()?;
        Ok(DispatchPoolInner::build(self.config, callback))
    }
}
