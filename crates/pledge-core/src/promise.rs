//! The promise value itself: a lightweight, cheaply-cloneable handle over
//! a driver closure, an autorun handle, and a shared [`Monitor`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cancelable::Cancelable;
use crate::error::{Error, Result};
use crate::monitor::Monitor;
use crate::pending_guard::PendingGuard;
use crate::retry::run_with_retry;
use crate::scheduler::{QueueId, Scheduler};

/// How long an unchained promise waits before its autorun fires.
///
/// 10 ms is a pragmatic default permitting chain attachment before the
/// autorun runs; nothing in pledge depends on this exact value.
pub const AUTORUN_DELAY: Duration = Duration::from_millis(10);

pub(crate) type Completion<T> = Box<dyn FnOnce(Result<T>) + Send>;
pub(crate) type DriverFn<T> = dyn Fn(Completion<T>) + Send + Sync;

/// Settles a stage with a value. Callable from any thread, any number of
/// times — only the first call (racing against `Reject` and cancellation)
/// has any effect.
pub type Resolve<T> = Arc<dyn Fn(T) + Send + Sync>;
/// Settles a stage with an error. See [`Resolve`].
pub type Reject = Arc<dyn Fn(Error) + Send + Sync>;

/// A handle a cancelable-producer body uses to install its wrapped
/// [`Cancelable`] task into the stage's monitor.
#[derive(Clone)]
pub struct TaskSlot {
    monitor: Arc<Monitor>,
}

impl TaskSlot {
    pub(crate) fn new(monitor: Arc<Monitor>) -> Self {
        Self { monitor }
    }

    /// Install `task` as this stage's wrapped cancelable work. The monitor
    /// takes ownership and forwards `suspend`/`resume`/`cancel` to it.
    pub fn set(&self, task: Arc<dyn Cancelable>) {
        self.monitor.install_task(task);
    }
}

pub(crate) type AttemptFn<T> = dyn Fn(Resolve<T>, Reject, TaskSlot) + Send + Sync;

#[derive(Debug)]
struct BodyNeverSettled;

impl fmt::Display for BodyNeverSettled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage body dropped resolve/reject without settling")
    }
}
impl std::error::Error for BodyNeverSettled {}

pub(crate) fn never_settled_error() -> Error {
    Error::user(BodyNeverSettled)
}

/// Arm a timeout against `guard`: if the stage does not settle before
/// `timeout` elapses, the guard latches with [`Error::TimedOut`]. A no-op
/// if `timeout` is `None`. Shared by constructors and chain operators so
/// both apply the timeout policy from spec §4.6 identically.
pub(crate) fn arm_timeout<T: Send + 'static>(
    scheduler: &Arc<dyn Scheduler>,
    queue: &QueueId,
    timeout: Option<Duration>,
    guard: &PendingGuard<T>,
) {
    if let Some(timeout) = timeout {
        let timeout_guard = guard.clone();
        scheduler.submit_after(
            queue.clone(),
            timeout,
            Box::new(move || {
                timeout_guard.complete(Err(Error::TimedOut));
            }),
        );
    }
}

struct PromiseInner<T> {
    driver: Arc<DriverFn<T>>,
    monitor: Arc<Monitor>,
    scheduler: Arc<dyn Scheduler>,
    autorun: Mutex<Option<crate::scheduler::DelayHandle>>,
}

/// A chainable, cancelable, thread-pool-scheduled asynchronous value.
///
/// Cloning a `Promise` is cheap (an `Arc` bump) and every clone shares the
/// same chain identity: the same [`Monitor`], the same pending autorun.
pub struct Promise<T> {
    inner: Arc<PromiseInner<T>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> Promise<T> {
    /// An already-fulfilled promise.
    pub fn resolved(scheduler: Arc<dyn Scheduler>, value: T) -> Self {
        let slot = Mutex::new(Some(value));
        let driver: Arc<DriverFn<T>> = Arc::new(move |completion| {
            if let Some(value) = slot.lock().take() {
                completion(Ok(value));
            }
        });
        Self::from_driver(scheduler, Monitor::new(), driver)
    }

    /// An already-rejected promise.
    pub fn rejected(scheduler: Arc<dyn Scheduler>, error: Error) -> Self {
        let slot = Mutex::new(Some(error));
        let driver: Arc<DriverFn<T>> = Arc::new(move |completion| {
            if let Some(error) = slot.lock().take() {
                completion(Err(error));
            }
        });
        Self::from_driver(scheduler, Monitor::new(), driver)
    }

    /// A stage whose body runs synchronously on `queue` and returns a
    /// value or an error directly.
    pub fn new_throwing<F>(
        scheduler: Arc<dyn Scheduler>,
        queue: QueueId,
        timeout: Option<Duration>,
        retry: u32,
        body: F,
    ) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let attempt: Arc<AttemptFn<T>> = Arc::new(move |resolve, reject, _slot| match body() {
            Ok(value) => resolve(value),
            Err(error) => reject(error),
        });
        Self::new_with_attempt(scheduler, queue, timeout, retry, attempt)
    }

    /// A stage whose body settles via whichever of `resolve`/`reject` is
    /// called first.
    pub fn new_callback<F>(
        scheduler: Arc<dyn Scheduler>,
        queue: QueueId,
        timeout: Option<Duration>,
        retry: u32,
        body: F,
    ) -> Self
    where
        F: Fn(Resolve<T>, Reject) + Send + Sync + 'static,
    {
        let attempt: Arc<AttemptFn<T>> = Arc::new(move |resolve, reject, _slot| {
            body(resolve, reject);
        });
        Self::new_with_attempt(scheduler, queue, timeout, retry, attempt)
    }

    /// A stage whose body may install a [`Cancelable`] wrapped task via
    /// the given [`TaskSlot`], in addition to settling via
    /// `resolve`/`reject`.
    pub fn new_cancelable<F>(
        scheduler: Arc<dyn Scheduler>,
        queue: QueueId,
        timeout: Option<Duration>,
        retry: u32,
        body: F,
    ) -> Self
    where
        F: Fn(Resolve<T>, Reject, TaskSlot) + Send + Sync + 'static,
    {
        let attempt: Arc<AttemptFn<T>> = Arc::new(body);
        Self::new_with_attempt(scheduler, queue, timeout, retry, attempt)
    }

    fn new_with_attempt(
        scheduler: Arc<dyn Scheduler>,
        queue: QueueId,
        timeout: Option<Duration>,
        retry: u32,
        attempt: Arc<AttemptFn<T>>,
    ) -> Self {
        let monitor = Monitor::new();
        let monitor_for_driver = monitor.clone();
        let scheduler_for_driver = scheduler.clone();
        let driver: Arc<DriverFn<T>> = Arc::new(move |completion| {
            let guard = PendingGuard::new(&monitor_for_driver, completion);
            arm_timeout(&scheduler_for_driver, &queue, timeout, &guard);

            let monitor = monitor_for_driver.clone();
            let attempt = attempt.clone();
            let stage_guard = guard.clone();
            scheduler_for_driver.submit_or_inline(
                queue.clone(),
                Box::new(move || {
                    if !monitor.wait() {
                        stage_guard.complete(Err(Error::Cancelled));
                        return;
                    }
                    run_with_retry(monitor, retry, stage_guard, attempt);
                }),
            );
        });
        Self::from_driver(scheduler, monitor, driver)
    }

    fn from_driver(scheduler: Arc<dyn Scheduler>, monitor: Arc<Monitor>, driver: Arc<DriverFn<T>>) -> Self {
        let autorun = Self::arm_autorun(&scheduler, &driver);
        Self {
            inner: Arc::new(PromiseInner {
                driver,
                monitor,
                scheduler,
                autorun: Mutex::new(Some(autorun)),
            }),
        }
    }

    fn arm_autorun(
        scheduler: &Arc<dyn Scheduler>,
        driver: &Arc<DriverFn<T>>,
    ) -> crate::scheduler::DelayHandle {
        let driver = driver.clone();
        scheduler.submit_after(
            QueueId::Background,
            AUTORUN_DELAY,
            Box::new(move || {
                driver(Box::new(|_| {}));
            }),
        )
    }

    /// Cancel the pending autorun dispatch. Called by every chain operator
    /// the moment it attaches, so a chained promise runs its body exactly
    /// once (via the chain) rather than twice.
    pub(crate) fn cancel_autorun(&self) {
        if let Some(handle) = self.inner.autorun.lock().take() {
            handle.cancel();
        }
    }

    pub(crate) fn monitor(&self) -> &Arc<Monitor> {
        &self.inner.monitor
    }

    pub(crate) fn driver(&self) -> &Arc<DriverFn<T>> {
        &self.inner.driver
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.inner.scheduler
    }

    pub(crate) fn from_parts(
        scheduler: Arc<dyn Scheduler>,
        monitor: Arc<Monitor>,
        driver: Arc<DriverFn<T>>,
    ) -> Self {
        Self::from_driver(scheduler, monitor, driver)
    }

    /// Block the calling thread until this promise settles, returning its
    /// value or error.
    ///
    /// Must not be called from inside a stage body running on the same
    /// queue this promise's stages run on — doing so deadlocks the pool.
    /// This is documented, not enforced.
    pub fn await_result(&self) -> Result<T> {
        self.cancel_autorun();
        let (tx, rx) = crossbeam_channel::bounded::<Result<T>>(1);
        (self.inner.driver)(Box::new(move |result| {
            let _ = tx.send(result);
        }));
        rx.recv().unwrap_or(Err(Error::Cancelled))
    }

    /// Pause downstream progress of this chain. Idempotent.
    pub fn suspend(&self) {
        self.inner.monitor.suspend();
    }

    /// Resume a suspended chain. A no-op if not suspended.
    pub fn resume(&self) {
        self.inner.monitor.resume();
    }

    /// Cancel this chain: stop forward progress and cancel any wrapped
    /// task the current stage owns. Idempotent.
    pub fn cancel(&self) {
        self.inner.monitor.cancel();
    }
}
