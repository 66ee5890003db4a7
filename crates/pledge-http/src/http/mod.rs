//! Blocking HTTP built on `reqwest::blocking`, scheduled through `pledge`.
//!
//! ```no_run
//! use pledge::{QueueId, ThreadPoolScheduler};
//! use pledge_http::HttpClient;
//!
//! let client = HttpClient::new(ThreadPoolScheduler::new());
//! let response = client.get("https://example.com").queue(QueueId::Background).send();
//! let response = response.await_result().unwrap();
//! println!("status: {}", response.status());
//! ```

mod client;
mod download;
mod request;
mod response;
mod transfer;
mod upload;

pub use client::{Authentication, HttpClient, HttpClientBuilder, HttpClientConfig};
pub use download::download;
pub use request::{HttpMethod, HttpRequestBuilder, RequestBody};
pub use response::HttpResponse;
pub use upload::upload;
