//! The retry loop shared by every stage body: constructors (`new_throwing`,
//! `new_callback`, `new_cancelable`) and chain operators (`then`, `catch`).
//!
//! A stage with `retry = N` attempts its body up to `N + 1` times. Between
//! attempts it calls [`Monitor::wait`], aborting the loop if cancellation is
//! observed. Synchronous bodies are retried by re-invoking them; asynchronous
//! producer bodies are retried by calling them again with a fresh
//! `(resolve, reject, task_slot)` triple — both shapes are the same
//! `AttemptFn`, so one loop serves both.

use std::sync::Arc;

use crate::error::Error;
use crate::monitor::Monitor;
use crate::pending_guard::PendingGuard;
use crate::promise::{AttemptFn, Reject, Resolve, TaskSlot, never_settled_error};

/// Run `attempt` against `guard`, retrying up to `retries_left` additional
/// times on failure. The final failure (or the first success) is forwarded
/// to `guard`; a cancellation observed between attempts short-circuits the
/// loop with [`Error::Cancelled`] (redundant with the guard's own on-cancel
/// hook, but explicit for clarity at the call site).
pub(crate) fn run_with_retry<T: Send + 'static>(
    monitor: Arc<Monitor>,
    retries_left: u32,
    guard: PendingGuard<T>,
    attempt: Arc<AttemptFn<T>>,
) {
    run_attempt(monitor, retries_left, guard, attempt);
}

fn run_attempt<T: Send + 'static>(
    monitor: Arc<Monitor>,
    retries_left: u32,
    guard: PendingGuard<T>,
    attempt: Arc<AttemptFn<T>>,
) {
    let resolve_guard = guard.clone();
    let resolve: Resolve<T> = Arc::new(move |value: T| {
        resolve_guard.complete(Ok(value));
    });

    let reject_monitor = monitor.clone();
    let reject_guard = guard.clone();
    let reject_attempt = attempt.clone();
    let reject: Reject = Arc::new(move |error: Error| {
        if retries_left == 0 {
            reject_guard.complete(Err(error));
            return;
        }
        if !reject_monitor.wait() {
            reject_guard.complete(Err(Error::Cancelled));
            return;
        }
        tracing::debug!(
            target: crate::logging::targets::CHAIN,
            retries_left,
            error = %error,
            "retrying stage after failure"
        );
        run_attempt(
            reject_monitor.clone(),
            retries_left - 1,
            reject_guard.clone(),
            reject_attempt.clone(),
        );
    });

    let slot = TaskSlot::new(monitor);
    let resolve_watch = resolve.clone();
    let reject_watch = reject.clone();
    attempt(resolve, reject, slot);

    // If the body returned without calling either handle or retaining one
    // for later asynchronous settlement (the only other live reference would
    // be a clone held by, say, a spawned thread), it will never settle on
    // its own — fail the stage so `await_result`/`all_settled` don't hang.
    if !guard.is_latched() && Arc::strong_count(&resolve_watch) == 1 && Arc::strong_count(&reject_watch) == 1 {
        guard.complete(Err(never_settled_error()));
    }
}
