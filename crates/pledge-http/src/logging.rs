//! Tracing target for pledge-http, mirroring `pledge::logging`.

/// Target name for log filtering.
pub const TARGET: &str = "pledge_http::http";
