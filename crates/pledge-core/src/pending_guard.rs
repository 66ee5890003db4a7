//! The single-shot completion wrapper shared by every constructor and
//! chain operator.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::Result;
use crate::monitor::Monitor;

type Completion<T> = Box<dyn FnOnce(Result<T>) + Send>;

struct Inner<T> {
    latched: AtomicBool,
    callback: Mutex<Option<Completion<T>>>,
}

/// Wraps a completion callback so that only the first of possibly several
/// competing attempts to settle a stage actually forwards its result;
/// later attempts are silently dropped.
///
/// Construction also arms the monitor's `on_cancel` hook with a completion
/// of `Err(Cancelled)`, so cancellation is always a competitor in the race
/// to settle, exactly like a body's own `resolve`/`reject`.
pub struct PendingGuard<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for PendingGuard<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> PendingGuard<T> {
    /// Build a new guard around `callback`, arming `monitor`'s cancel hook.
    pub fn new(monitor: &Arc<Monitor>, callback: impl FnOnce(Result<T>) + Send + 'static) -> Self {
        let guard = Self {
            inner: Arc::new(Inner {
                latched: AtomicBool::new(false),
                callback: Mutex::new(Some(Box::new(callback))),
            }),
        };
        let on_cancel = guard.clone();
        monitor.install_on_cancel(Box::new(move || {
            on_cancel.complete(Err(crate::error::Error::Cancelled));
        }));
        guard
    }

    /// Settle with `result`. The first caller across all clones of this
    /// guard wins; every later call is a silent no-op.
    pub fn complete(&self, result: Result<T>) {
        if self.inner.latched.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(callback) = self.inner.callback.lock().take() {
            callback(result);
        }
    }

    /// `true` if this guard has already latched.
    pub fn is_latched(&self) -> bool {
        self.inner.latched.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::mpsc;

    #[test]
    fn only_first_completion_is_forwarded() {
        let monitor = Monitor::new();
        let (tx, rx) = mpsc::channel();
        let guard = PendingGuard::new(&monitor, move |result: Result<i32>| {
            tx.send(result.ok()).unwrap();
        });
        guard.complete(Ok(1));
        guard.complete(Ok(2));
        assert_eq!(rx.recv().unwrap(), Some(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancel_before_completion_wins() {
        let monitor = Monitor::new();
        let (tx, rx) = mpsc::channel();
        let guard = PendingGuard::new(&monitor, move |result: Result<i32>| {
            tx.send(result).unwrap();
        });
        monitor.cancel();
        guard.complete(Ok(5));
        let observed = rx.recv().unwrap();
        assert!(matches!(observed, Err(Error::Cancelled)));
    }
}
