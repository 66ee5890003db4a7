//! Request types and the fluent builder that turns into a `fetch`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use pledge::{Promise, QueueId};
use serde::Serialize;

use super::client::{Authentication, HttpClient};
use super::response::HttpResponse;
use crate::error::{HttpError, into_pledge};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl HttpMethod {
    pub(crate) fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

/// The body of a request, set by at most one of `text`/`json`/`form`/`bytes`.
#[derive(Clone, Debug, Default)]
pub enum RequestBody {
    #[default]
    None,
    Text(String),
    Json(serde_json::Value),
    Form(HashMap<String, String>),
    Bytes(Bytes),
}

/// A fluent builder for one HTTP request. `.send()` consumes it and returns
/// a `Promise<HttpResponse>` scheduled on `queue`.
#[derive(Clone)]
pub struct HttpRequestBuilder {
    client: HttpClient,
    method: HttpMethod,
    url: String,
    headers: http::HeaderMap,
    query: Vec<(String, String)>,
    body: RequestBody,
    auth: Option<Authentication>,
    queue: QueueId,
    timeout: Option<Duration>,
    retry: u32,
}

impl HttpRequestBuilder {
    pub(crate) fn new(client: HttpClient, method: HttpMethod, url: String) -> Self {
        Self {
            client,
            method,
            url,
            headers: http::HeaderMap::new(),
            query: Vec::new(),
            body: RequestBody::None,
            auth: None,
            queue: QueueId::Background,
            timeout: None,
            retry: 0,
        }
    }

    pub fn header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Self {
        if let (Ok(name), Ok(value)) = (name.try_into(), value.try_into()) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = RequestBody::Text(body.into());
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpError> {
        self.body = RequestBody::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn form(mut self, data: HashMap<String, String>) -> Self {
        self.body = RequestBody::Form(data);
        self
    }

    pub fn bytes(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    pub fn basic_auth(mut self, username: impl Into<String>, password: Option<impl Into<String>>) -> Self {
        self.auth = Some(Authentication::Basic {
            username: username.into(),
            password: password.map(Into::into),
        });
        self
    }

    pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
        self.auth = Some(Authentication::Bearer(token.into()));
        self
    }

    /// Which named worker pool runs this request. Defaults to `Background`.
    pub fn queue(mut self, queue: QueueId) -> Self {
        self.queue = queue;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry the request up to `retry` more times on failure.
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Send the request, returning a `Promise<HttpResponse>` settled on
    /// `self.queue` (retried up to `self.retry` times, racing `self.timeout`
    /// if set).
    pub fn send(self) -> Promise<HttpResponse> {
        let scheduler = self.client.scheduler().clone();
        let queue = self.queue;
        let timeout = self.timeout;
        let retry = self.retry;
        let built = Arc::new(self);
        Promise::new_throwing(scheduler, queue, timeout, retry, move || built.execute())
    }

    fn execute(&self) -> pledge::Result<HttpResponse> {
        tracing::debug!(target: crate::logging::TARGET, method = %self.method, url = %self.url, "sending request");
        let mut url = url::Url::parse(&self.url).map_err(|e| into_pledge(HttpError::from(e)))?;
        for (key, value) in &self.query {
            url.query_pairs_mut().append_pair(key, value);
        }

        let mut req = self.client.reqwest_client().request(self.method.to_reqwest(), url);
        for (name, value) in self.headers.iter() {
            req = req.header(name, value);
        }
        if let Some(auth) = &self.auth {
            req = match auth {
                Authentication::Basic { username, password } => req.basic_auth(username, password.as_ref()),
                Authentication::Bearer(token) => req.bearer_auth(token),
            };
        }
        req = match &self.body {
            RequestBody::None => req,
            RequestBody::Text(text) => req.body(text.clone()),
            RequestBody::Json(value) => req.json(value),
            RequestBody::Form(data) => req.form(data),
            RequestBody::Bytes(bytes) => req.body(bytes.clone()),
        };

        let response = req.send().map_err(|e| into_pledge(HttpError::from(e)))?;
        tracing::trace!(target: crate::logging::TARGET, status = response.status().as_u16(), "received response");
        HttpResponse::from_reqwest(response)
    }
}
