//! The Stage Combinator Library: `then` / `catch` / `finally`. Each operator
//! cancels the predecessor's autorun, then builds a successor [`Promise`]
//! sharing the predecessor's [`Monitor`] (chain identity), whose driver
//! composes the predecessor's driver with user code, a pending-guard, an
//! optional timeout, and the shared retry loop.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::pending_guard::PendingGuard;
use crate::promise::{
    AttemptFn, Completion, DriverFn, Promise, Reject, Resolve, TaskSlot, arm_timeout,
};
use crate::retry::run_with_retry;
use crate::scheduler::{QueueId, Scheduler};

impl<T: Send + 'static> Promise<T> {
    /// `value -> Result<value>`: the plain transform. Skipped (forwarding
    /// the error unchanged) if the predecessor failed.
    pub fn then<F, B>(&self, queue: QueueId, timeout: Option<Duration>, retry: u32, body: F) -> Promise<B>
    where
        F: Fn(T) -> Result<B> + Send + Sync + 'static,
        T: Clone,
        B: Send + 'static,
    {
        let body = Arc::new(body);
        self.then_async(queue, timeout, retry, move |value, resolve, reject, _slot| {
            match body(value) {
                Ok(out) => resolve(out),
                Err(err) => reject(err),
            }
        })
    }

    /// `value -> Promise<value>`: inner-promise adoption. The nested
    /// promise's autorun is cancelled and its eventual settlement is
    /// forwarded to this stage; its monitor is **not** merged with the
    /// chain's — cancelling the chain stops forward progression only, it
    /// does not reach into the nested promise's already-running work.
    pub fn then_compose<F, B>(&self, queue: QueueId, timeout: Option<Duration>, retry: u32, body: F) -> Promise<B>
    where
        F: Fn(T) -> Promise<B> + Send + Sync + 'static,
        T: Clone,
        B: Send + 'static,
    {
        let body = Arc::new(body);
        self.then_async(queue, timeout, retry, move |value, resolve, reject, _slot| {
            let nested = body(value);
            nested.cancel_autorun();
            (nested.driver().clone())(Box::new(move |result: Result<B>| match result {
                Ok(v) => resolve(v),
                Err(e) => reject(e),
            }));
        })
    }

    /// `(value, resolve, reject, task_slot) -> ()`: the producer-style body
    /// shape, shared by the plain callback form and the cancelable form (a
    /// body that never calls `task_slot.set` is simply the callback form).
    pub fn then_async<F, B>(&self, queue: QueueId, timeout: Option<Duration>, retry: u32, body: F) -> Promise<B>
    where
        F: Fn(T, Resolve<B>, Reject, TaskSlot) + Send + Sync + 'static,
        T: Clone,
        B: Send + 'static,
    {
        self.cancel_autorun();
        let monitor = self.monitor().clone();
        let pred_driver = self.driver().clone();
        let scheduler = self.scheduler().clone();
        let body = Arc::new(body);

        let monitor_for_driver = monitor.clone();
        let scheduler_for_driver = scheduler.clone();
        let driver: Arc<DriverFn<B>> = Arc::new(move |completion: Completion<B>| {
            let guard = PendingGuard::new(&monitor_for_driver, completion);
            arm_timeout(&scheduler_for_driver, &queue, timeout, &guard);

            let monitor = monitor_for_driver.clone();
            let scheduler = scheduler_for_driver.clone();
            let queue = queue.clone();
            let body = body.clone();
            let guard_for_pred = guard.clone();

            pred_driver(Box::new(move |result: Result<T>| match result {
                Ok(value) => {
                    let monitor = monitor.clone();
                    let guard = guard_for_pred.clone();
                    let body = body.clone();
                    scheduler.submit_or_inline(
                        queue.clone(),
                        Box::new(move || {
                            if !monitor.wait() {
                                guard.complete(Err(Error::Cancelled));
                                return;
                            }
                            let attempt: Arc<AttemptFn<B>> = Arc::new({
                                let body = body.clone();
                                let value = value.clone();
                                move |resolve, reject, slot| {
                                    body(value.clone(), resolve, reject, slot);
                                }
                            });
                            run_with_retry(monitor, retry, guard, attempt);
                        }),
                    );
                }
                Err(err) => guard_for_pred.complete(Err(err)),
            }));
        });
        Promise::from_parts(scheduler, monitor, driver)
    }

    /// Handle an upstream failure; an upstream success passes straight
    /// through untouched. The handler may recover (returning `Ok`) or
    /// rethrow a new error.
    pub fn catch<F>(&self, queue: QueueId, timeout: Option<Duration>, retry: u32, handler: F) -> Promise<T>
    where
        F: Fn(Error) -> Result<T> + Send + Sync + 'static,
    {
        self.cancel_autorun();
        let monitor = self.monitor().clone();
        let pred_driver = self.driver().clone();
        let scheduler = self.scheduler().clone();
        let handler = Arc::new(handler);

        let monitor_for_driver = monitor.clone();
        let scheduler_for_driver = scheduler.clone();
        let driver: Arc<DriverFn<T>> = Arc::new(move |completion: Completion<T>| {
            let guard = PendingGuard::new(&monitor_for_driver, completion);
            arm_timeout(&scheduler_for_driver, &queue, timeout, &guard);

            let monitor = monitor_for_driver.clone();
            let scheduler = scheduler_for_driver.clone();
            let queue = queue.clone();
            let handler = handler.clone();
            let guard_for_pred = guard.clone();

            pred_driver(Box::new(move |result: Result<T>| match result {
                Ok(value) => guard_for_pred.complete(Ok(value)),
                Err(err) => {
                    let monitor = monitor.clone();
                    let guard = guard_for_pred.clone();
                    let handler = handler.clone();
                    scheduler.submit_or_inline(
                        queue.clone(),
                        Box::new(move || {
                            if !monitor.wait() {
                                guard.complete(Err(Error::Cancelled));
                                return;
                            }
                            let attempt: Arc<AttemptFn<T>> = Arc::new({
                                let handler = handler.clone();
                                let err = err.clone();
                                move |resolve, reject, _slot| match handler(err.clone()) {
                                    Ok(v) => resolve(v),
                                    Err(e) => reject(e),
                                }
                            });
                            run_with_retry(monitor, retry, guard, attempt);
                        }),
                    );
                }
            }));
        });
        Promise::from_parts(scheduler, monitor, driver)
    }

    /// Run `handler` after settlement regardless of outcome, then forward
    /// the original result (value AND error) through unchanged. Unlike
    /// `then`/`catch`, `finally` has no timeout or retry of its own.
    ///
    /// The handler always runs, even if the chain is cancelled before this
    /// stage is reached — cancellation is itself a settlement the handler
    /// should be able to observe side effects for. The original result
    /// (success, failure, or `Cancelled`) is forwarded unchanged afterward.
    pub fn finally<F>(&self, queue: QueueId, handler: F) -> Promise<T>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.cancel_autorun();
        let monitor = self.monitor().clone();
        let pred_driver = self.driver().clone();
        let scheduler = self.scheduler().clone();
        let handler = Arc::new(handler);

        let monitor_for_driver = monitor.clone();
        let scheduler_for_driver = scheduler.clone();
        let driver: Arc<DriverFn<T>> = Arc::new(move |completion: Completion<T>| {
            let guard = PendingGuard::new(&monitor_for_driver, completion);

            let scheduler = scheduler_for_driver.clone();
            let queue = queue.clone();
            let handler = handler.clone();
            let guard_for_pred = guard.clone();

            pred_driver(Box::new(move |result: Result<T>| {
                let guard = guard_for_pred.clone();
                let handler = handler.clone();
                scheduler.submit_or_inline(
                    queue.clone(),
                    Box::new(move || {
                        handler();
                        guard.complete(result);
                    }),
                );
            }));
        });
        Promise::from_parts(scheduler, monitor, driver)
    }
}
