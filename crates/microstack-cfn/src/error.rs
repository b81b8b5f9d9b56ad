//! Stack orchestrator error types.

use http::StatusCode;
use microstack_core::{ErrorKind, ServiceError};

/// Stack service error type.
///
/// CloudFormation's Query dialect reports almost everything as a Sender
/// `ValidationError` with HTTP 400, including missing stacks; the
/// conversion below preserves that while keeping the carrier kind accurate.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// The named stack does not exist.
    #[error("Stack with id {name} does not exist")]
    StackNotFound {
        /// The stack name or id that was not found.
        name: String,
    },

    /// A stack with this name already exists.
    #[error("Stack [{name}] already exists")]
    StackAlreadyExists {
        /// The colliding stack name.
        name: String,
    },

    /// The template or request failed validation.
    #[error("{message}")]
    Validation {
        /// What failed.
        message: String,
    },
}

impl StackError {
    /// Convenience constructor for validation errors.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

impl From<StackError> for ServiceError {
    fn from(err: StackError) -> Self {
        let message = err.to_string();
        let (kind, code) = match &err {
            StackError::StackNotFound { .. } => (ErrorKind::NotFound, "ValidationError"),
            StackError::StackAlreadyExists { .. } => {
                (ErrorKind::AlreadyExists, "AlreadyExistsException")
            }
            StackError::Validation { .. } => (ErrorKind::InvalidArgument, "ValidationError"),
        };

        ServiceError::new(kind, code, message).with_status(StatusCode::BAD_REQUEST)
    }
}

/// Convenience result type for stack operations.
pub type StackResult<T> = Result<T, StackError>;
