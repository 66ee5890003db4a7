//! pledge: chainable, cancelable, thread-pool-scheduled promises.
//!
//! pledge provides a `Promise<T>` type whose stages (`then`/`catch`/
//! `finally`) run on named worker pools, can be suspended, resumed, and
//! cancelled as a group, retried on failure, raced against a timeout, and
//! combined via `all`/`all_settled`/`race`/`any`. It has no event loop of
//! its own — it is a thin layer over a [`Scheduler`] you inject, with
//! [`ThreadPoolScheduler`] as the default `rayon`-backed implementation.
//!
//! # Example
//!
//! ```
//! use pledge::{Promise, QueueId, ThreadPoolScheduler};
//!
//! let scheduler = ThreadPoolScheduler::new();
//! let result = Promise::resolved(scheduler.clone(), 200)
//!     .then(QueueId::Main, None, 0, |v| Ok(v / 10))
//!     .then(QueueId::Main, None, 0, |v| Ok(v * 10))
//!     .await_result();
//! assert_eq!(result.unwrap(), 200);
//! ```
//!
//! # Cancellation
//!
//! ```
//! use std::time::Duration;
//! use pledge::{Promise, QueueId, ThreadPoolScheduler};
//!
//! let scheduler = ThreadPoolScheduler::new();
//! let chain = Promise::new_throwing(scheduler, QueueId::Background, None, 0, || {
//!     std::thread::sleep(Duration::from_millis(200));
//!     Ok(1)
//! });
//! chain.cancel();
//! assert!(chain.await_result().is_err());
//! ```

mod aggregate;
mod cancelable;
mod chain;
mod error;
pub mod logging;
mod monitor;
mod pending_guard;
mod promise;
mod retry;
mod scheduler;

pub use aggregate::{Outcome, all, all_settled, any, race};
pub use cancelable::Cancelable;
pub use error::{Error, Result};
pub use monitor::Monitor;
pub use promise::{AUTORUN_DELAY, Promise, Reject, Resolve, TaskSlot};
pub use scheduler::{
    DelayHandle, QueueId, Scheduler, SchedulerConfig, ThreadPoolScheduler, ThreadPoolSchedulerBuilder,
    Work,
};
