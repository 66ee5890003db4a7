//! pledge-http: an optional HTTP helper for `pledge`.
//!
//! `fetch` (via [`HttpClient`]'s request builder), [`download`], and
//! [`upload`] each return a `Promise<HttpResponse>`, scheduled and retried
//! like any other `pledge` stage. Requests run on a blocking
//! `reqwest::blocking::Client` inside `Scheduler`-submitted closures —
//! there is no async runtime underneath.
//!
//! # Example
//!
//! ```no_run
//! use pledge::{QueueId, ThreadPoolScheduler};
//! use pledge_http::HttpClient;
//!
//! let scheduler = ThreadPoolScheduler::new();
//! let client = HttpClient::new(scheduler);
//! let response = client
//!     .get("https://example.com")
//!     .queue(QueueId::Background)
//!     .send()
//!     .await_result()
//!     .unwrap();
//! assert!(response.ok());
//! ```

mod error;
mod http;
pub mod logging;

pub use error::HttpError;
pub use http::{
    Authentication, HttpClient, HttpClientBuilder, HttpClientConfig, HttpMethod, HttpRequestBuilder,
    HttpResponse, RequestBody, download, upload,
};
