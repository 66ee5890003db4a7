//! Cooperative cancellation for streaming transfers, shared by `download`
//! and `upload`: a `Read` adapter that checks a shared flag between every
//! chunk, the same discipline `pledge::Cancelable` implies for in-flight
//! work elsewhere in the workspace.

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use pledge::Cancelable;

/// Installed into a promise's `TaskSlot` so `suspend`/`resume`/`cancel` on
/// the chain reach the in-flight transfer.
pub(crate) struct TransferHandle {
    cancelled: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl TransferHandle {
    pub(crate) fn new() -> (Self, Arc<AtomicBool>, Arc<AtomicBool>) {
        let cancelled = Arc::new(AtomicBool::new(false));
        let paused = Arc::new(AtomicBool::new(false));
        (Self { cancelled: cancelled.clone(), paused: paused.clone() }, cancelled, paused)
    }
}

impl Cancelable for TransferHandle {
    fn suspend(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

/// Wraps a reader so every `read()` call first blocks while paused and
/// fails once cancelled, checked between chunks rather than mid-chunk.
pub(crate) struct CancelableReader<R> {
    inner: R,
    cancelled: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl<R> CancelableReader<R> {
    pub(crate) fn new(inner: R, cancelled: Arc<AtomicBool>, paused: Arc<AtomicBool>) -> Self {
        Self { inner, cancelled, paused }
    }
}

fn cancelled_err() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "transfer cancelled")
}

impl<R: Read> Read for CancelableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.paused.load(Ordering::SeqCst) {
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(cancelled_err());
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(cancelled_err());
        }
        self.inner.read(buf)
    }
}

pub(crate) fn is_cancellation(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::Interrupted
}
