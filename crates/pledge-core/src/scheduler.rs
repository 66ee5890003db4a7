//! The Scheduler Interface: named worker pools plus a delayed-dispatch
//! primitive. pledge has no event loop of its own; it is a thin layer over
//! whatever [`Scheduler`] a consumer injects.

use std::cell::RefCell;
use std::collections::BinaryHeap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::logging::targets;

/// Identifies a named worker pool.
///
/// `Main` and `Background` are conventional defaults; `Named` pools are
/// created lazily the first time they are addressed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueueId {
    /// Conventional "foreground" pool.
    Main,
    /// Conventional default background pool.
    Background,
    /// A named quality-of-service pool.
    Named(Arc<str>),
}

impl QueueId {
    /// Create a named queue identifier.
    pub fn named(name: impl Into<Arc<str>>) -> Self {
        Self::Named(name.into())
    }
}

/// A unit of work submitted to a [`Scheduler`].
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// A handle returned by [`Scheduler::submit_after`] that can cancel the
/// delayed dispatch before it fires. Cancelling after the work has already
/// been handed to its pool has no effect.
#[derive(Clone)]
pub struct DelayHandle {
    cancelled: Arc<AtomicBool>,
}

impl DelayHandle {
    fn new() -> (Self, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        (
            Self {
                cancelled: cancelled.clone(),
            },
            cancelled,
        )
    }

    /// Cancel the pending dispatch, if it has not already fired.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// `true` if [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The abstraction the rest of pledge depends on: submit work to a named
/// pool, submit delayed work, and identify which pool the current thread
/// belongs to.
///
/// Implementations must guarantee exactly-once execution per submission
/// (unless cancelled before firing) and must not run `work` synchronously
/// inside `submit` itself, except via the "stay on current pool"
/// optimization in [`Scheduler::submit_or_inline`].
pub trait Scheduler: Send + Sync + 'static {
    /// Enqueue `work` for execution on `queue`.
    fn submit(&self, queue: QueueId, work: Work);

    /// Schedule `work` for execution after `delay`, returning a handle that
    /// can cancel it prior to firing.
    fn submit_after(&self, queue: QueueId, delay: Duration, work: Work) -> DelayHandle;

    /// The pool of the calling thread, if the calling thread belongs to one
    /// of this scheduler's pools.
    fn current_queue_id(&self) -> Option<QueueId>;

    /// Submit `work` to `queue`, but if the calling thread is already a
    /// worker of `queue`, run it synchronously instead of re-enqueuing.
    fn submit_or_inline(&self, queue: QueueId, work: Work) {
        if self.current_queue_id().as_ref() == Some(&queue) {
            tracing::trace!(target: targets::SCHEDULER, ?queue, "staying on current pool");
            work();
        } else {
            self.submit(queue, work);
        }
    }
}

/// Configuration for a [`ThreadPoolScheduler`]: how many threads each
/// conventional pool gets.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Threads for the `Main` pool.
    pub main_threads: usize,
    /// Threads for the `Background` pool.
    pub background_threads: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            main_threads: 1,
            background_threads: available,
        }
    }
}

/// Builder for [`ThreadPoolScheduler`].
pub struct ThreadPoolSchedulerBuilder {
    config: SchedulerConfig,
    named_threads: HashMap<QueueId, usize>,
}

impl ThreadPoolSchedulerBuilder {
    /// Start from [`SchedulerConfig::default`].
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            named_threads: HashMap::new(),
        }
    }

    /// Override the base configuration.
    pub fn with_config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Pre-size a named queue's pool. Queues not pre-sized default to the
    /// background thread count the first time they are addressed.
    pub fn queue(mut self, id: QueueId, threads: usize) -> Self {
        self.named_threads.insert(id, threads);
        self
    }

    /// Build the scheduler, wrapped in the `Arc` every `pledge` constructor
    /// expects a [`Scheduler`] to come in.
    pub fn build(self) -> Arc<ThreadPoolScheduler> {
        ThreadPoolScheduler::from_parts(self.config, self.named_threads)
    }
}

impl Default for ThreadPoolSchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT_QUEUE: RefCell<Option<QueueId>> = const { RefCell::new(None) };
}

/// Lazily-created `rayon` thread pools keyed by [`QueueId`]. Split out from
/// [`ThreadPoolScheduler`] so the delay-dispatch thread can hold its own
/// `Arc` to this state instead of reaching back through a raw pointer.
struct PoolRegistry {
    config: SchedulerConfig,
    named_threads: HashMap<QueueId, usize>,
    pools: Mutex<HashMap<QueueId, Arc<rayon::ThreadPool>>>,
}

impl PoolRegistry {
    fn threads_for(&self, queue: &QueueId) -> usize {
        match queue {
            QueueId::Main => self.config.main_threads,
            QueueId::Background => self.config.background_threads,
            QueueId::Named(_) => self
                .named_threads
                .get(queue)
                .copied()
                .unwrap_or(self.config.background_threads),
        }
    }

    fn pool_for(&self, queue: &QueueId) -> Arc<rayon::ThreadPool> {
        if let Some(pool) = self.pools.lock().get(queue) {
            return pool.clone();
        }
        let threads = self.threads_for(queue);
        let queue_for_handler = queue.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name({
                let queue = queue.clone();
                move |i| format!("pledge-{queue:?}-{i}")
            })
            .start_handler(move |_| {
                CURRENT_QUEUE.with(|c| *c.borrow_mut() = Some(queue_for_handler.clone()));
            })
            .build()
            .expect("failed to build rayon thread pool");
        let pool = Arc::new(pool);
        self.pools.lock().insert(queue.clone(), pool.clone());
        pool
    }

    #[tracing::instrument(target = "pledge::scheduler", skip(self, work))]
    fn submit(&self, queue: QueueId, work: Work) {
        self.pool_for(&queue).spawn(work);
    }
}

/// Default [`Scheduler`] implementation: one [`rayon::ThreadPool`] per
/// distinct [`QueueId`], created lazily, plus one dedicated delay-dispatch
/// thread shared across all queues.
pub struct ThreadPoolScheduler {
    registry: Arc<PoolRegistry>,
    delay: Arc<DelayDispatcher>,
}

impl ThreadPoolScheduler {
    /// Build a scheduler with default configuration.
    pub fn new() -> Arc<Self> {
        ThreadPoolSchedulerBuilder::new().build()
    }

    /// Start building a scheduler with custom configuration.
    pub fn builder() -> ThreadPoolSchedulerBuilder {
        ThreadPoolSchedulerBuilder::new()
    }

    fn from_parts(config: SchedulerConfig, named_threads: HashMap<QueueId, usize>) -> Arc<Self> {
        let registry = Arc::new(PoolRegistry {
            config,
            named_threads,
            pools: Mutex::new(HashMap::new()),
        });
        let delay = DelayDispatcher::spawn(registry.clone());
        Arc::new(Self { registry, delay })
    }
}

impl Default for ThreadPoolScheduler {
    fn default() -> Self {
        let registry = Arc::new(PoolRegistry {
            config: SchedulerConfig::default(),
            named_threads: HashMap::new(),
            pools: Mutex::new(HashMap::new()),
        });
        let delay = DelayDispatcher::spawn(registry.clone());
        Self { registry, delay }
    }
}

impl Scheduler for ThreadPoolScheduler {
    fn submit(&self, queue: QueueId, work: Work) {
        self.registry.submit(queue, work);
    }

    fn submit_after(&self, queue: QueueId, delay: Duration, work: Work) -> DelayHandle {
        self.delay.schedule(queue, delay, work)
    }

    fn current_queue_id(&self) -> Option<QueueId> {
        CURRENT_QUEUE.with(|c| c.borrow().clone())
    }
}

struct DelayEntry {
    fire_at: Instant,
    seq: u64,
    queue: QueueId,
    work: Mutex<Option<Work>>,
    cancelled: Arc<AtomicBool>,
}

impl PartialEq for DelayEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}
impl Eq for DelayEntry {}
impl PartialOrd for DelayEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DelayEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Reversed so `BinaryHeap` (a max-heap) pops the earliest deadline.
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct DelayState {
    heap: BinaryHeap<DelayEntry>,
}

/// A single background thread that fires delayed work at its deadline and
/// hands it off to the target pool's registry, modeled on a
/// min-heap-by-deadline scheduler with condvar wakeups.
struct DelayDispatcher {
    state: Mutex<DelayState>,
    wakeup: Condvar,
    next_seq: AtomicU64,
}

impl DelayDispatcher {
    fn spawn(registry: Arc<PoolRegistry>) -> Arc<Self> {
        let dispatcher = Arc::new(Self {
            state: Mutex::new(DelayState {
                heap: BinaryHeap::new(),
            }),
            wakeup: Condvar::new(),
            next_seq: AtomicU64::new(0),
        });
        let worker = dispatcher.clone();
        std::thread::Builder::new()
            .name("pledge-delay-dispatch".into())
            .spawn(move || worker.run(registry))
            .expect("failed to spawn delay-dispatch thread");
        dispatcher
    }

    fn schedule(&self, queue: QueueId, delay: Duration, work: Work) -> DelayHandle {
        let (handle, cancelled) = DelayHandle::new();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let entry = DelayEntry {
            fire_at: Instant::now() + delay,
            seq,
            queue,
            work: Mutex::new(Some(work)),
            cancelled,
        };
        {
            let mut state = self.state.lock();
            state.heap.push(entry);
        }
        self.wakeup.notify_all();
        handle
    }

    fn run(&self, registry: Arc<PoolRegistry>) {
        loop {
            let mut state = self.state.lock();
            loop {
                match state.heap.peek() {
                    Some(entry) => {
                        let now = Instant::now();
                        if entry.fire_at <= now {
                            break;
                        }
                        self.wakeup.wait_for(&mut state, entry.fire_at - now);
                    }
                    None => {
                        self.wakeup.wait(&mut state);
                    }
                }
            }
            let entry = state.heap.pop().expect("peeked entry must be present");
            drop(state);
            if entry.cancelled.load(Ordering::SeqCst) {
                continue;
            }
            if let Some(work) = entry.work.lock().take() {
                registry.submit(entry.queue, work);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn submit_runs_work() {
        let scheduler = ThreadPoolScheduler::new();
        let (tx, rx) = mpsc::channel();
        scheduler.submit(
            QueueId::Background,
            Box::new(move || {
                tx.send(42).unwrap();
            }),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), 42);
    }

    #[test]
    fn submit_after_fires_in_order() {
        let scheduler = ThreadPoolScheduler::new();
        let (tx, rx) = mpsc::channel();
        let tx2 = tx.clone();
        scheduler.submit_after(
            QueueId::Background,
            Duration::from_millis(60),
            Box::new(move || tx2.send("second").unwrap()),
        );
        scheduler.submit_after(
            QueueId::Background,
            Duration::from_millis(10),
            Box::new(move || tx.send("first").unwrap()),
        );
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "first");
        assert_eq!(rx.recv_timeout(Duration::from_secs(1)).unwrap(), "second");
    }

    #[test]
    fn submit_after_cancel_suppresses_fire() {
        let scheduler = ThreadPoolScheduler::new();
        let (tx, rx) = mpsc::channel::<()>();
        let handle = scheduler.submit_after(
            QueueId::Background,
            Duration::from_millis(20),
            Box::new(move || tx.send(()).unwrap()),
        );
        handle.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn current_queue_id_observed_from_worker() {
        let scheduler = ThreadPoolScheduler::new();
        let (tx, rx) = mpsc::channel();
        let scheduler_clone = scheduler.clone();
        scheduler.submit(
            QueueId::Main,
            Box::new(move || {
                tx.send(scheduler_clone.current_queue_id()).unwrap();
            }),
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(1)).unwrap(),
            Some(QueueId::Main)
        );
    }
}
