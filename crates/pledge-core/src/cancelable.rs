//! The capability set a wrapped asynchronous task implements so a
//! [`crate::Monitor`] can forward lifecycle operations to it.

/// A small, explicit contract for wrapped asynchronous work: suspend,
/// resume, and cancel. A stage's [`crate::Monitor`] holds at most one
/// `Cancelable` task at a time (replaced per stage) and forwards `suspend`,
/// `resume`, and `cancel` calls to it as they happen.
///
/// Implementors should make each method idempotent and non-blocking; the
/// monitor calls them while holding no lock of its own, but the caller of
/// `Monitor::suspend`/`resume`/`cancel` may be on any thread.
pub trait Cancelable: Send + Sync {
    /// Pause the wrapped task's forward progress.
    fn suspend(&self);
    /// Resume a previously suspended wrapped task.
    fn resume(&self);
    /// Stop the wrapped task; it should settle with
    /// [`crate::Error::Cancelled`] if it has not already settled.
    fn cancel(&self);
}

impl Cancelable for () {
    fn suspend(&self) {}
    fn resume(&self) {}
    fn cancel(&self) {}
}
