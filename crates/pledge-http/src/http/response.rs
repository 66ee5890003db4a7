//! A materialized HTTP response: status, headers, and body are read
//! eagerly so the value is plain data a promise can carry across threads.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::error::{HttpError, into_pledge};

/// The settled value of `fetch`/`upload`/`download`. Cheaply `Clone`
/// (the body is a refcounted `Bytes`) so it can flow through `.then`, whose
/// retry loop needs to re-observe the upstream value on every attempt.
#[derive(Clone)]
pub struct HttpResponse {
    status: u16,
    headers: http::HeaderMap,
    url: String,
    body: Bytes,
    downloaded_path: Option<PathBuf>,
}

impl HttpResponse {
    pub(crate) fn from_reqwest(response: reqwest::blocking::Response) -> pledge::Result<Self> {
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().as_str().to_string();
        let body = response.bytes().map_err(|e| into_pledge(HttpError::from(e)))?;
        Ok(Self { status, headers, url, body, downloaded_path: None })
    }

    pub(crate) fn for_download(
        status: u16,
        headers: http::HeaderMap,
        url: String,
        path: PathBuf,
    ) -> Self {
        Self { status, headers, url, body: Bytes::new(), downloaded_path: Some(path) }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// `true` for a 2xx status.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers.get(name.as_ref()).and_then(|v| v.to_str().ok())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    pub fn text(&self) -> pledge::Result<String> {
        std::str::from_utf8(&self.body)
            .map(str::to_string)
            .map_err(|e| into_pledge(HttpError::Utf8(e)))
    }

    pub fn json<T: DeserializeOwned>(&self) -> pledge::Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| into_pledge(HttpError::from(e)))
    }

    /// The destination path for a `download` response; `None` for
    /// `fetch`/`upload`.
    pub fn downloaded_path(&self) -> Option<&Path> {
        self.downloaded_path.as_deref()
    }

    /// `Err` with the status (and body as the message, if UTF-8) unless
    /// `ok()`.
    pub fn error_for_status(self) -> pledge::Result<Self> {
        if self.ok() {
            return Ok(self);
        }
        let message = self.text().ok();
        Err(into_pledge(HttpError::Status { status: self.status, message }))
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("url", &self.url)
            .field("downloaded_path", &self.downloaded_path)
            .finish()
    }
}
