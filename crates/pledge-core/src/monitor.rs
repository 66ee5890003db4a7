//! The per-chain lifecycle controller: cancellation flag, pause gate,
//! cancel-reject hook, and the wrapped [`Cancelable`] task slot.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::cancelable::Cancelable;
use crate::logging::targets;

type CancelHook = Box<dyn FnOnce() + Send>;

struct MonitorState {
    cancelled: bool,
    paused: bool,
    on_cancel: Option<CancelHook>,
    task: Option<Arc<dyn Cancelable>>,
    on_deinit: Option<CancelHook>,
}

/// Lifecycle controller shared by every stage of one promise chain.
///
/// All state lives under a single mutex, matching the teacher's
/// lost-wakeup-safe `Mutex` + `Condvar` pattern: a waiter blocked in
/// [`Monitor::wait`] rechecks its condition in a loop around
/// `Condvar::wait`, so a `resume`/`cancel` that lands between a waiter's
/// check and its wait can never be missed.
pub struct Monitor {
    state: Mutex<MonitorState>,
    gate: Condvar,
}

impl Monitor {
    /// Create a fresh, unpaused, uncancelled monitor.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MonitorState {
                cancelled: false,
                paused: false,
                on_cancel: None,
                task: None,
                on_deinit: None,
            }),
            gate: Condvar::new(),
        })
    }

    /// Idempotent: install the pause gate if it is not already present, and
    /// forward to the wrapped task's `suspend` if one is installed.
    pub fn suspend(&self) {
        let task = {
            let mut state = self.state.lock();
            if state.cancelled {
                return;
            }
            state.paused = true;
            state.task.clone()
        };
        if let Some(task) = task {
            task.suspend();
        }
    }

    /// Release the pause gate, waking one waiter, and forward to the
    /// wrapped task's `resume`. A `resume` not paired with a prior
    /// `suspend` is a no-op.
    pub fn resume(&self) {
        let task = {
            let mut state = self.state.lock();
            if !state.paused {
                return;
            }
            state.paused = false;
            state.task.clone()
        };
        self.gate.notify_one();
        if let Some(task) = task {
            task.resume();
        }
    }

    /// Idempotent: set `cancelled`, fire `on_cancel` if installed, and
    /// forward to the wrapped task's `cancel`.
    pub fn cancel(&self) {
        let (hook, task) = {
            let mut state = self.state.lock();
            if state.cancelled {
                return;
            }
            state.cancelled = true;
            tracing::debug!(target: targets::MONITOR, "monitor cancelled");
            (state.on_cancel.take(), state.task.clone())
        };
        // Cancellation must be globally visible before the next `wait`
        // returns, so wake every waiter before running the hooks.
        self.gate.notify_all();
        if let Some(hook) = hook {
            hook();
        }
        if let Some(task) = task {
            task.cancel();
        }
    }

    /// Block while the pause gate is present. Returns `false` if
    /// cancellation was observed on entry or on wake, `true` otherwise.
    /// This is the only blocking point between stages in a chain.
    pub fn wait(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            if state.cancelled {
                return false;
            }
            if !state.paused {
                return true;
            }
            self.gate.wait(&mut state);
        }
    }

    /// Atomically replace the cancel hook. If already cancelled, `hook`
    /// fires immediately (cancellation is the final competitor in the
    /// pending-guard race).
    pub fn install_on_cancel(&self, hook: CancelHook) {
        let mut state = self.state.lock();
        if state.cancelled {
            drop(state);
            hook();
        } else {
            state.on_cancel = Some(hook);
        }
    }

    /// Atomically replace the wrapped task. If currently paused or
    /// cancelled, the new task immediately receives those signals.
    pub fn install_task(&self, task: Arc<dyn Cancelable>) {
        let (paused, cancelled) = {
            let mut state = self.state.lock();
            state.task = Some(task.clone());
            (state.paused, state.cancelled)
        };
        if cancelled {
            task.cancel();
        } else if paused {
            task.suspend();
        }
    }

    /// Install a hook that fires when this monitor is dropped. Used by
    /// leak-detection test harnesses.
    pub fn install_on_deinit(&self, hook: CancelHook) {
        self.state.lock().on_deinit = Some(hook);
    }

    /// `true` once [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().cancelled
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(hook) = self.state.get_mut().on_deinit.take() {
            hook();
        }
    }
}
