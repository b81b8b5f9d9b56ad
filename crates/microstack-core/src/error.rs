//! The structured error carrier shared by all MicroStack services.
//!
//! Every service produces a [`ServiceError`] carrying an HTTP status, an
//! AWS-style error code, and a human-readable message. The wire codecs
//! render the carrier into the dialect-appropriate envelope (JSON `__type`,
//! S3 `<Error>`, or a Query `<ErrorResponse>`); the core never formats
//! envelopes itself.

use std::fmt;

use http::StatusCode;

/// Coarse classification of a [`ServiceError`].
///
/// The kind drives cross-service behavior (the stack orchestrator's tolerant
/// deletion keys off [`ErrorKind::NotFound`]); the `code` string carried
/// alongside is what actually reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced entity is absent.
    NotFound,
    /// A unique-key collision.
    AlreadyExists,
    /// A shape violation in the request.
    InvalidArgument,
    /// The operation conflicts with current state (e.g. non-empty bucket).
    Conflict,
    /// A programming error; mapped to HTTP 500.
    Internal,
}

impl ErrorKind {
    /// The default HTTP status for this kind, used when the service does not
    /// override it.
    #[must_use]
    pub fn default_status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidArgument => StatusCode::BAD_REQUEST,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A structured service error: HTTP status + AWS error code + message.
///
/// This is the single carrier through which *local-to-the-operation* errors
/// (not-found, already-exists, invalid-argument, conflict) propagate out of
/// the core. Handler faults and timeouts never take this path; they are
/// captured inside the invocation result.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ServiceError {
    /// Coarse error classification.
    pub kind: ErrorKind,
    /// AWS-style error code rendered on the wire (e.g. `NoSuchBucket`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// HTTP status to respond with.
    pub status: StatusCode,
}

impl ServiceError {
    /// Create an error with an explicit kind, code, and message, using the
    /// kind's default HTTP status.
    #[must_use]
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: kind.default_status(),
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Override the HTTP status (some dialects report not-found as 400).
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// A *not-found* error.
    #[must_use]
    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, code, message)
    }

    /// An *already-exists* error.
    #[must_use]
    pub fn already_exists(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, code, message)
    }

    /// An *invalid-argument* error.
    #[must_use]
    pub fn invalid_argument(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, code, message)
    }

    /// A *conflict* error.
    #[must_use]
    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, code, message)
    }

    /// An *internal* error with the fixed `InternalServerError` code.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, "InternalServerError", message)
    }

    /// Whether this error is of the *not-found* kind.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not-found",
            Self::AlreadyExists => "already-exists",
            Self::InvalidArgument => "invalid-argument",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Convenience result type for MicroStack service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
