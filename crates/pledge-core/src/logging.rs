//! Tracing integration for pledge.
//!
//! pledge instruments stage transitions, retries, timeouts, and cancellation
//! with the `tracing` crate. To see logs, install a subscriber in your
//! application:
//!
//! ```ignore
//! fn main() {
//!     tracing_subscriber::fmt::init();
//!     // ...
//! }
//! ```

/// Span names used throughout pledge for tracing.
pub mod span_names {
    /// A task submitted to the scheduler.
    pub const SCHEDULE: &str = "pledge::schedule";
    /// A single chain stage (`then`/`catch`/`finally`) executing.
    pub const STAGE: &str = "pledge::stage";
    /// A monitor's pause/cancel lifecycle.
    pub const MONITOR: &str = "pledge::monitor";
    /// A multi-promise aggregator (`all`/`race`/...) running.
    pub const AGGREGATE: &str = "pledge::aggregate";
}

/// Target names for log filtering.
pub mod targets {
    /// The crate as a whole.
    pub const CORE: &str = "pledge";
    /// The scheduler interface and thread pools.
    pub const SCHEDULER: &str = "pledge::scheduler";
    /// Monitor lifecycle (pause/resume/cancel).
    pub const MONITOR: &str = "pledge::monitor";
    /// Chain operators and retry.
    pub const CHAIN: &str = "pledge::chain";
    /// Multi-promise aggregators.
    pub const AGGREGATE: &str = "pledge::aggregate";
}

#[macro_export]
macro_rules! pledge_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "pledge", $($arg)*)
    };
}

#[macro_export]
macro_rules! pledge_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "pledge", $($arg)*)
    };
}

#[macro_export]
macro_rules! pledge_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "pledge", $($arg)*)
    };
}
