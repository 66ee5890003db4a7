//! HTTP-specific error type.
//!
//! `HttpError` never reaches a caller directly — every fallible operation
//! wraps it into [`pledge::Error::User`] via [`into_pledge`] before handing
//! it to a promise's `reject`.

use std::fmt;

#[derive(Debug)]
pub enum HttpError {
    Request(reqwest::Error),
    InvalidUrl(url::ParseError),
    InvalidHeader(String),
    Json(serde_json::Error),
    Io(std::io::Error),
    Utf8(std::str::Utf8Error),
    Status { status: u16, message: Option<String> },
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request(err) => write!(f, "HTTP request error: {err}"),
            Self::InvalidUrl(err) => write!(f, "invalid URL: {err}"),
            Self::InvalidHeader(msg) => write!(f, "invalid header: {msg}"),
            Self::Json(err) => write!(f, "JSON error: {err}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Utf8(err) => write!(f, "response body is not valid UTF-8: {err}"),
            Self::Status { status, message } => match message {
                Some(msg) => write!(f, "HTTP {status}: {msg}"),
                None => write!(f, "HTTP {status}"),
            },
        }
    }
}

impl std::error::Error for HttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(err) => Some(err),
            Self::InvalidUrl(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Utf8(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err)
    }
}

impl From<url::ParseError> for HttpError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

pub(crate) fn into_pledge(err: HttpError) -> pledge::Error {
    pledge::Error::user(err)
}
