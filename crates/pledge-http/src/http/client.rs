//! A blocking HTTP client. Requests run inside `Scheduler`-submitted
//! closures, never inside an async runtime — `pledge-http` has no
//! dependency on `tokio`.

use std::sync::Arc;
use std::time::Duration;

use pledge::Scheduler;

use super::request::{HttpMethod, HttpRequestBuilder};
use crate::error::HttpError;

/// Configuration for the HTTP client.
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    pub user_agent: Option<String>,
    pub proxy: Option<String>,
    pub danger_accept_invalid_certs: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            user_agent: Some(format!("pledge-http/{}", env!("CARGO_PKG_VERSION"))),
            proxy: None,
            danger_accept_invalid_certs: false,
        }
    }
}

/// Builder for an [`HttpClient`].
pub struct HttpClientBuilder {
    scheduler: Arc<dyn Scheduler>,
    config: HttpClientConfig,
    default_headers: http::HeaderMap,
}

impl HttpClientBuilder {
    pub(crate) fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            scheduler,
            config: HttpClientConfig::default(),
            default_headers: http::HeaderMap::new(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    pub fn proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.config.proxy = Some(proxy_url.into());
        self
    }

    /// Accept invalid TLS certificates. Insecure; testing only.
    pub fn danger_accept_invalid_certs(mut self) -> Self {
        self.config.danger_accept_invalid_certs = true;
        self
    }

    pub fn default_header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Result<Self, HttpError> {
        let name = name
            .try_into()
            .map_err(|_| HttpError::InvalidHeader("invalid header name".to_string()))?;
        let value = value
            .try_into()
            .map_err(|_| HttpError::InvalidHeader("invalid header value".to_string()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    pub fn build(self) -> Result<HttpClient, HttpError> {
        let mut builder = reqwest::blocking::Client::builder();

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = self.config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        builder = if self.config.follow_redirects {
            builder.redirect(reqwest::redirect::Policy::limited(self.config.max_redirects))
        } else {
            builder.redirect(reqwest::redirect::Policy::none())
        };
        if let Some(ref ua) = self.config.user_agent {
            builder = builder.user_agent(ua);
        }
        if let Some(ref proxy_url) = self.config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)?;
            builder = builder.proxy(proxy);
        }
        if self.config.danger_accept_invalid_certs {
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder = builder.default_headers(self.default_headers);

        let client = builder.build()?;
        Ok(HttpClient {
            scheduler: self.scheduler,
            inner: Arc::new(HttpClientInner { client, config: self.config }),
        })
    }
}

struct HttpClientInner {
    client: reqwest::blocking::Client,
    config: HttpClientConfig,
}

/// A cheaply cloneable, thread-safe blocking HTTP client bound to a
/// [`Scheduler`]. Every request it builds settles as a `Promise<HttpResponse>`
/// submitted onto the queue the caller names.
#[derive(Clone)]
pub struct HttpClient {
    scheduler: Arc<dyn Scheduler>,
    inner: Arc<HttpClientInner>,
}

impl HttpClient {
    /// Create a client with default configuration on `scheduler`.
    pub fn new(scheduler: Arc<dyn Scheduler>) -> Self {
        HttpClientBuilder::new(scheduler)
            .build()
            .expect("default HTTP client configuration should always build")
    }

    pub fn builder(scheduler: Arc<dyn Scheduler>) -> HttpClientBuilder {
        HttpClientBuilder::new(scheduler)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.inner.config
    }

    pub fn get(&self, url: impl AsRef<str>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(self.clone(), HttpMethod::Get, url.as_ref().to_string())
    }

    pub fn post(&self, url: impl AsRef<str>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(self.clone(), HttpMethod::Post, url.as_ref().to_string())
    }

    pub fn put(&self, url: impl AsRef<str>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(self.clone(), HttpMethod::Put, url.as_ref().to_string())
    }

    pub fn delete(&self, url: impl AsRef<str>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(self.clone(), HttpMethod::Delete, url.as_ref().to_string())
    }

    pub fn patch(&self, url: impl AsRef<str>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(self.clone(), HttpMethod::Patch, url.as_ref().to_string())
    }

    pub fn head(&self, url: impl AsRef<str>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(self.clone(), HttpMethod::Head, url.as_ref().to_string())
    }

    pub fn request(&self, method: HttpMethod, url: impl AsRef<str>) -> HttpRequestBuilder {
        HttpRequestBuilder::new(self.clone(), method, url.as_ref().to_string())
    }

    pub(crate) fn reqwest_client(&self) -> &reqwest::blocking::Client {
        &self.inner.client
    }

    pub(crate) fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.scheduler
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient").field("config", &self.inner.config).finish()
    }
}

/// Request authentication.
#[derive(Clone, Debug)]
pub enum Authentication {
    Basic { username: String, password: Option<String> },
    Bearer(String),
}
