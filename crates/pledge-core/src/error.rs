//! Error types for pledge.

use std::fmt;

/// The error a resolved [`crate::Promise`] carries when it is not `Ok`.
///
/// Mirrors the `ErrorKind` taxonomy: a promise either produced a value, was
/// rejected by user code, ran out of time, was cancelled, or (for
/// aggregators) failed because none of its members ever settled.
#[derive(Debug)]
pub enum Error {
    /// Rejected by the stage or constructor body itself.
    User(Box<dyn std::error::Error + Send + Sync>),
    /// A timeout policy fired before the stage completed.
    TimedOut,
    /// The promise or chain was cancelled before it settled.
    Cancelled,
    /// An aggregator (`race`/`any`) was given zero members.
    Empty,
    /// An aggregator (`all`/`any`) failed because every member rejected.
    Aggregate(Vec<Error>),
}

impl Error {
    /// Wrap any error-carrying type as a [`Error::User`].
    pub fn user<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::User(Box::new(err))
    }

    /// `true` if this is [`Error::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// `true` if this is [`Error::TimedOut`].
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(err) => write!(f, "{err}"),
            Self::TimedOut => write!(f, "stage timed out"),
            Self::Cancelled => write!(f, "promise was cancelled"),
            Self::Empty => write!(f, "no promises to aggregate"),
            Self::Aggregate(errors) => {
                write!(f, "{} member(s) failed:", errors.len())?;
                for err in errors {
                    write!(f, " [{err}]")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::User(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        match self {
            Self::User(err) => Self::User(Box::new(StringError(err.to_string()))),
            Self::TimedOut => Self::TimedOut,
            Self::Cancelled => Self::Cancelled,
            Self::Empty => Self::Empty,
            Self::Aggregate(errors) => Self::Aggregate(errors.clone()),
        }
    }
}

/// A rendered-to-string stand-in used when cloning a `User` error whose
/// inner type is not itself `Clone`.
#[derive(Debug)]
struct StringError(String);

impl fmt::Display for StringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StringError {}

/// A specialized `Result` for pledge operations.
pub type Result<T> = std::result::Result<T, Error>;
