//! Multi-Promise Aggregators: `all`, `all_settled`, `race`, `any`. Each
//! builds a parent [`Promise`] whose wrapped [`Cancelable`] task is an
//! [`AggregateTask`] fanning `suspend`/`resume`/`cancel` out to every
//! member's monitor — the parent does not merge monitors with its members,
//! it drives them side by side.
//!
//! Rust adaptation note: spec's `all(settled, members)` describes a single
//! operation whose `settled = true` mode coerces member errors into the
//! value type when "assignable" (a dynamically-typed `Any` escape hatch that
//! has no idiomatic Rust equivalent under a single `T`). This is split into
//! two statically-typed operations instead: [`all`] (rejects on first
//! member failure, like the `settled = false` mode) and [`all_settled`]
//! (never rejects; resolves with one [`Outcome`] per member, like
//! JavaScript's `Promise.allSettled`).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::cancelable::Cancelable;
use crate::error::{Error, Result};
use crate::monitor::Monitor;
use crate::pending_guard::PendingGuard;
use crate::promise::{Completion, DriverFn, Promise};
use crate::scheduler::Scheduler;

/// The per-member outcome returned by [`all_settled`].
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// The member fulfilled with this value.
    Fulfilled(T),
    /// The member rejected with this error.
    Rejected(Error),
}

impl<T> Outcome<T> {
    /// `true` if this member fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, Self::Fulfilled(_))
    }

    /// The fulfilled value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fulfilled(v) => Some(v),
            Self::Rejected(_) => None,
        }
    }
}

/// A fan-out [`Cancelable`] installed as the parent aggregate promise's
/// wrapped task: forwards `suspend`/`resume`/`cancel` to every member's
/// monitor so lifecycle control of the parent controls the whole group.
struct AggregateTask {
    members: Vec<Arc<Monitor>>,
}

impl Cancelable for AggregateTask {
    fn suspend(&self) {
        for m in &self.members {
            m.suspend();
        }
    }
    fn resume(&self) {
        for m in &self.members {
            m.resume();
        }
    }
    fn cancel(&self) {
        for m in &self.members {
            m.cancel();
        }
    }
}

/// Cancel every member's autorun (the aggregator drives them now) and
/// return their monitors and drivers for the aggregate task / fan-out.
fn harvest<T: Send + 'static>(members: &[Promise<T>]) -> (Vec<Arc<Monitor>>, Vec<Arc<DriverFn<T>>>) {
    let monitors = members.iter().map(|m| m.monitor().clone()).collect();
    let drivers = members.iter().map(|m| m.driver().clone()).collect();
    for m in members {
        m.cancel_autorun();
    }
    (monitors, drivers)
}

/// `all([P1..Pn])`: resolves with every member's value, ordered by
/// construction order, once all have fulfilled. Rejects as soon as any
/// member rejects (the rest continue running but their results are
/// discarded). An empty member list resolves immediately with `[]`.
pub fn all<T: Send + 'static>(scheduler: Arc<dyn Scheduler>, members: Vec<Promise<T>>) -> Promise<Vec<T>> {
    if members.is_empty() {
        return Promise::resolved(scheduler, Vec::new());
    }
    let count = members.len();
    let (member_monitors, member_drivers) = harvest(&members);
    let monitor = Monitor::new();
    let monitor_for_driver = monitor.clone();

    let driver: Arc<DriverFn<Vec<T>>> = Arc::new(move |completion: Completion<Vec<T>>| {
        let guard = PendingGuard::new(&monitor_for_driver, completion);
        monitor_for_driver.install_task(Arc::new(AggregateTask {
            members: member_monitors.clone(),
        }));

        let results: Arc<Mutex<Vec<Option<T>>>> = Arc::new(Mutex::new((0..count).map(|_| None).collect()));
        let remaining = Arc::new(AtomicUsize::new(count));

        for (idx, driver) in member_drivers.iter().enumerate() {
            let guard = guard.clone();
            let results = results.clone();
            let remaining = remaining.clone();
            driver(Box::new(move |result: Result<T>| match result {
                Ok(value) => {
                    results.lock()[idx] = Some(value);
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let values = results.lock().iter_mut().map(|v| v.take().unwrap()).collect();
                        guard.complete(Ok(values));
                    }
                }
                Err(err) => guard.complete(Err(err)),
            }));
        }
    });
    Promise::from_parts(scheduler, monitor, driver)
}

/// Resolves with one [`Outcome`] per member, ordered by construction order,
/// once every member has settled. Never rejects on its own (an empty
/// member list resolves immediately with `[]`).
pub fn all_settled<T: Send + 'static>(
    scheduler: Arc<dyn Scheduler>,
    members: Vec<Promise<T>>,
) -> Promise<Vec<Outcome<T>>> {
    if members.is_empty() {
        return Promise::resolved(scheduler, Vec::new());
    }
    let count = members.len();
    let (member_monitors, member_drivers) = harvest(&members);
    let monitor = Monitor::new();
    let monitor_for_driver = monitor.clone();

    let driver: Arc<DriverFn<Vec<Outcome<T>>>> = Arc::new(move |completion: Completion<Vec<Outcome<T>>>| {
        let guard = PendingGuard::new(&monitor_for_driver, completion);
        monitor_for_driver.install_task(Arc::new(AggregateTask {
            members: member_monitors.clone(),
        }));

        let results: Arc<Mutex<Vec<Option<Outcome<T>>>>> =
            Arc::new(Mutex::new((0..count).map(|_| None).collect()));
        let remaining = Arc::new(AtomicUsize::new(count));

        for (idx, driver) in member_drivers.iter().enumerate() {
            let guard = guard.clone();
            let results = results.clone();
            let remaining = remaining.clone();
            driver(Box::new(move |result: Result<T>| {
                let outcome = match result {
                    Ok(value) => Outcome::Fulfilled(value),
                    Err(err) => Outcome::Rejected(err),
                };
                results.lock()[idx] = Some(outcome);
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let outcomes = results.lock().iter_mut().map(|v| v.take().unwrap()).collect();
                    guard.complete(Ok(outcomes));
                }
            }));
        }
    });
    Promise::from_parts(scheduler, monitor, driver)
}

/// `race([P1..Pn])`: settles with whichever member settles first — value or
/// error. The rest keep running but their eventual results are irrelevant.
/// An empty member list rejects immediately with [`Error::Empty`].
pub fn race<T: Send + 'static>(scheduler: Arc<dyn Scheduler>, members: Vec<Promise<T>>) -> Promise<T> {
    if members.is_empty() {
        return Promise::rejected(scheduler, Error::Empty);
    }
    let (member_monitors, member_drivers) = harvest(&members);
    let monitor = Monitor::new();
    let monitor_for_driver = monitor.clone();

    let driver: Arc<DriverFn<T>> = Arc::new(move |completion: Completion<T>| {
        let guard = PendingGuard::new(&monitor_for_driver, completion);
        monitor_for_driver.install_task(Arc::new(AggregateTask {
            members: member_monitors.clone(),
        }));

        for driver in &member_drivers {
            let guard = guard.clone();
            // The pending-guard's first-wins semantics are exactly the
            // "first member to settle wins" race, no index-tracking needed.
            driver(Box::new(move |result: Result<T>| {
                guard.complete(result);
            }));
        }
    });
    Promise::from_parts(scheduler, monitor, driver)
}

/// `any([P1..Pn])`: settles with the first member to *fulfill*. If every
/// member rejects, rejects with [`Error::Aggregate`] preserving member
/// index order. An empty member list rejects immediately with
/// [`Error::Empty`].
pub fn any<T: Send + 'static>(scheduler: Arc<dyn Scheduler>, members: Vec<Promise<T>>) -> Promise<T> {
    if members.is_empty() {
        return Promise::rejected(scheduler, Error::Empty);
    }
    let count = members.len();
    let (member_monitors, member_drivers) = harvest(&members);
    let monitor = Monitor::new();
    let monitor_for_driver = monitor.clone();

    let driver: Arc<DriverFn<T>> = Arc::new(move |completion: Completion<T>| {
        let guard = PendingGuard::new(&monitor_for_driver, completion);
        monitor_for_driver.install_task(Arc::new(AggregateTask {
            members: member_monitors.clone(),
        }));

        let errors: Arc<Mutex<Vec<Option<Error>>>> = Arc::new(Mutex::new((0..count).map(|_| None).collect()));
        let remaining = Arc::new(AtomicUsize::new(count));

        for (idx, driver) in member_drivers.iter().enumerate() {
            let guard = guard.clone();
            let errors = errors.clone();
            let remaining = remaining.clone();
            driver(Box::new(move |result: Result<T>| match result {
                Ok(value) => guard.complete(Ok(value)),
                Err(err) => {
                    errors.lock()[idx] = Some(err);
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        let errs = errors.lock().iter_mut().map(|v| v.take().unwrap()).collect();
                        guard.complete(Err(Error::Aggregate(errs)));
                    }
                }
            }));
        }
    });
    Promise::from_parts(scheduler, monitor, driver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::promise::Resolve;
    use crate::scheduler::{QueueId, ThreadPoolScheduler};
    use std::time::Duration;

    fn resolve_after<T: Clone + Send + 'static>(
        scheduler: Arc<dyn Scheduler>,
        delay: Duration,
        value: T,
    ) -> Promise<T> {
        Promise::new_callback(scheduler, QueueId::Background, None, 0, move |resolve, _reject| {
            std::thread::sleep(delay);
            resolve(value.clone());
        })
    }

    #[test]
    fn all_empty_resolves_empty() {
        let scheduler = ThreadPoolScheduler::new();
        let p: Promise<Vec<i32>> = all(scheduler, Vec::new());
        assert_eq!(p.await_result().unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn race_empty_rejects_with_empty() {
        let scheduler = ThreadPoolScheduler::new();
        let p: Promise<i32> = race(scheduler, Vec::new());
        assert!(matches!(p.await_result(), Err(Error::Empty)));
    }

    #[test]
    fn any_empty_rejects_with_empty() {
        let scheduler = ThreadPoolScheduler::new();
        let p: Promise<i32> = any(scheduler, Vec::new());
        assert!(matches!(p.await_result(), Err(Error::Empty)));
    }

    #[test]
    fn all_orders_by_construction_order_regardless_of_completion_order() {
        let scheduler: Arc<dyn Scheduler> = ThreadPoolScheduler::new();
        let hello = resolve_after(scheduler.clone(), Duration::from_millis(80), "Hello".to_string());
        let world = resolve_after(scheduler.clone(), Duration::from_millis(20), "World".to_string());
        let p = all(scheduler, vec![hello, world]);
        assert_eq!(p.await_result().unwrap(), vec!["Hello".to_string(), "World".to_string()]);
    }

    #[test]
    fn any_all_fail_aggregates_in_member_order() {
        let scheduler: Arc<dyn Scheduler> = ThreadPoolScheduler::new();
        let timed_out = Promise::<i32>::new_throwing(
            scheduler.clone(),
            QueueId::Background,
            Some(Duration::from_millis(20)),
            0,
            || {
                std::thread::sleep(Duration::from_millis(200));
                Ok(1)
            },
        );
        let cancelled = Promise::<i32>::new_callback(
            scheduler.clone(),
            QueueId::Background,
            None,
            0,
            |_resolve: Resolve<i32>, _reject| {},
        );
        cancelled.cancel();
        let p = any(scheduler, vec![timed_out, cancelled]);
        match p.await_result() {
            Err(Error::Aggregate(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].is_timed_out());
                assert!(errors[1].is_cancelled());
            }
            other => panic!("expected Aggregate, got {other:?}"),
        }
    }

    #[test]
    fn race_cancel_observes_cancelled() {
        let scheduler: Arc<dyn Scheduler> = ThreadPoolScheduler::new();
        let slow_one = resolve_after(scheduler.clone(), Duration::from_millis(500), 1);
        let slow_two = resolve_after(scheduler.clone(), Duration::from_millis(500), 2);
        let parent = race(scheduler, vec![slow_one, slow_two]);
        let parent_clone = parent.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            parent_clone.cancel();
        });
        assert!(matches!(parent.await_result(), Err(Error::Cancelled)));
    }
}
