//! Error taxonomy for the client.
//!
//! Validation problems are raised synchronously at compile time, transient
//! transport failures are classified for the retry policy, and server-side
//! rejections surface as typed variants rather than opaque transport errors.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The closed set of failure classes the retry policy may act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientKind {
    /// The server signalled an explicit rate limit (HTTP 429).
    RateLimited,
    /// The server signalled temporary unavailability (HTTP 503).
    ServiceUnavailable,
    /// The connection failed before a response was produced.
    Connection,
}

#[derive(Debug, Error)]
pub enum Error {
    /// A constraint argument failed validation while compiling a query.
    #[error("invalid constraint on `{field}`: {message}")]
    InvalidConstraint { field: String, message: String },

    /// A query option failed validation while compiling a query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A credential value could not produce a session token.
    #[error("invalid session credential: {0}")]
    InvalidSession(String),

    /// The server rejected the request's credentials. Never retried.
    #[error("unauthorized (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// A structured error returned by the server.
    #[error("server error {code}: {message}")]
    Api { code: i64, message: String },

    /// A transient failure eligible for retry.
    #[error("{message}")]
    Transient { kind: TransientKind, message: String },

    /// The retry budget was spent without a successful response.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// The caller-supplied deadline elapsed before the request completed.
    #[error("deadline exceeded after {attempts} attempts")]
    DeadlineExceeded { attempts: u32 },

    /// An operation required a persisted record but was given an unsaved one.
    #[error("record in `{class_name}` has no object id")]
    MissingObjectId { class_name: String },

    /// A request or response body could not be encoded or decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// A non-transient transport fault.
    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    pub(crate) fn constraint(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn rate_limited(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::RateLimited,
            message: message.into(),
        }
    }

    pub(crate) fn service_unavailable(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::ServiceUnavailable,
            message: message.into(),
        }
    }

    pub(crate) fn connection(message: impl Into<String>) -> Self {
        Self::Transient {
            kind: TransientKind::Connection,
            message: message.into(),
        }
    }

    /// Map a transport-level failure onto the taxonomy. Connection setup and
    /// timeout faults are retryable; anything else is surfaced as-is.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() {
            Self::connection(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// The transient classification of this error, if it has one.
    pub fn transient_kind(&self) -> Option<TransientKind> {
        match self {
            Self::Transient { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether the retry policy is allowed to retry this error.
    pub fn is_transient(&self) -> bool {
        self.transient_kind().is_some()
    }
}
