//! End-to-end `all`/`all_settled`/`race`/`any` scenarios not already
//! covered by `aggregate.rs`'s inline unit tests (empty input, ordering,
//! cancellation-fan-out edge cases live there).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pledge::{Error, Promise, QueueId, ThreadPoolScheduler, all, all_settled, any, race};

#[derive(Debug)]
struct Msg(String);
impl std::fmt::Display for Msg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for Msg {}
fn user_error(msg: &str) -> Error {
    Error::user(Msg(msg.to_string()))
}

fn settle_after<T: Clone + Send + 'static>(
    scheduler: Arc<dyn pledge::Scheduler>,
    delay: Duration,
    result: Result<T, Error>,
) -> Promise<T> {
    Promise::new_callback(scheduler, QueueId::Background, None, 0, move |resolve, reject| {
        let result = result.clone();
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            match result {
                Ok(v) => resolve(v),
                Err(e) => reject(e),
            }
        });
    })
}

/// `all` rejects as soon as any member fails, regardless of the other
/// members' eventual outcomes.
#[test]
fn all_rejects_on_first_member_failure() {
    let scheduler = ThreadPoolScheduler::new();
    let members = vec![
        settle_after(scheduler.clone(), Duration::from_millis(150), Ok(1)),
        settle_after(scheduler.clone(), Duration::from_millis(20), Err(user_error("boom"))),
        settle_after(scheduler.clone(), Duration::from_millis(150), Ok(3)),
    ];
    let result = all(scheduler, members).await_result();
    match result {
        Err(e) => assert_eq!(e.to_string(), "boom"),
        Ok(_) => panic!("expected rejection"),
    }
}

/// `all_settled` never rejects — every member's outcome, success or
/// failure, is reported in construction order.
#[test]
fn all_settled_reports_every_outcome_in_order() {
    let scheduler = ThreadPoolScheduler::new();
    let members = vec![
        settle_after(scheduler.clone(), Duration::from_millis(80), Ok(10)),
        settle_after(scheduler.clone(), Duration::from_millis(20), Err(user_error("nope"))),
        settle_after(scheduler.clone(), Duration::from_millis(50), Ok(30)),
    ];
    let outcomes = all_settled(scheduler, members).await_result().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].value(), Some(&10));
    assert!(!outcomes[1].is_fulfilled());
    assert_eq!(outcomes[2].value(), Some(&30));
}

/// `race` resolves with whichever member settles first, on the success
/// path (the cancellation-during-race path is covered inline).
#[test]
fn race_resolves_with_fastest_member() {
    let scheduler = ThreadPoolScheduler::new();
    let members = vec![
        settle_after(scheduler.clone(), Duration::from_millis(200), Ok("slow".to_string())),
        settle_after(scheduler.clone(), Duration::from_millis(20), Ok("fast".to_string())),
    ];
    let winner = race(scheduler, members).await_result().unwrap();
    assert_eq!(winner, "fast");
}

/// `any` resolves with the first success even while other members are
/// still pending or have already failed.
#[test]
fn any_resolves_with_first_success_among_failures() {
    let scheduler = ThreadPoolScheduler::new();
    let members = vec![
        settle_after(scheduler.clone(), Duration::from_millis(20), Err(user_error("early failure"))),
        settle_after(scheduler.clone(), Duration::from_millis(60), Ok(99)),
        settle_after(scheduler.clone(), Duration::from_millis(200), Err(user_error("late failure"))),
    ];
    let winner = any(scheduler, members).await_result().unwrap();
    assert_eq!(winner, 99);
}

/// A wrapped task that just counts `cancel()` calls, installed into each
/// member's `TaskSlot` so the fan-out from the parent aggregate is
/// observable without a dedicated observer API on `Promise` itself.
struct CountingCancel(Arc<AtomicUsize>);
impl pledge::Cancelable for CountingCancel {
    fn suspend(&self) {}
    fn resume(&self) {}
    fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Cancelling the parent aggregate fans out to every member, including
/// ones that haven't settled yet.
#[test]
fn cancelling_all_fans_cancellation_to_every_member() {
    let scheduler = ThreadPoolScheduler::new();
    let cancelled_count = Arc::new(AtomicUsize::new(0));

    let members: Vec<_> = (0..3)
        .map(|_| {
            let scheduler = scheduler.clone();
            let cancelled_count = cancelled_count.clone();
            Promise::new_cancelable(
                scheduler,
                QueueId::Background,
                None,
                0,
                move |_resolve, _reject, slot| {
                    slot.set(Arc::new(CountingCancel(cancelled_count.clone())));
                    std::thread::sleep(Duration::from_millis(300));
                },
            )
        })
        .collect();

    let parent = all(scheduler, members);
    std::thread::sleep(Duration::from_millis(50));
    parent.cancel();

    assert!(parent.await_result().is_err());
    assert_eq!(cancelled_count.load(Ordering::SeqCst), 3);
}
