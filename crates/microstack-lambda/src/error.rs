//! Lambda-specific error types.
//!
//! These cover the *pre-invocation* failure surface: registry lookups,
//! malformed handlers, bad bundles. Faults raised by the handler itself and
//! timeouts never appear here; they are captured inside
//! [`InvokeResult`](crate::InvokeResult).

use microstack_core::{ErrorKind, ServiceError};

/// Lambda service error type.
#[derive(Debug, thiserror::Error)]
pub enum LambdaError {
    /// The named function does not exist.
    #[error("Function not found: {name}")]
    FunctionNotFound {
        /// The function name that was not found.
        name: String,
    },

    /// A function with this name already exists.
    #[error("Function already exist: {name}")]
    FunctionAlreadyExists {
        /// The colliding function name.
        name: String,
    },

    /// A request parameter is invalid (unsupported runtime, malformed
    /// handler, missing handler file, empty bundle).
    #[error("{message}")]
    InvalidParameter {
        /// Description of the invalid parameter.
        message: String,
    },

    /// The invocation payload is not valid JSON.
    #[error("Could not parse request body as JSON: {message}")]
    InvalidRequestContent {
        /// Parser diagnostic.
        message: String,
    },

    /// The runtime itself failed (scratch I/O, subprocess spawn).
    #[error("Runtime failure: {message}")]
    Runtime {
        /// What went wrong.
        message: String,
    },
}

impl LambdaError {
    /// Convenience constructor for invalid-parameter errors.
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    /// Convenience constructor for runtime failures.
    #[must_use]
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

impl From<LambdaError> for ServiceError {
    fn from(err: LambdaError) -> Self {
        let message = err.to_string();
        let (kind, code) = match &err {
            LambdaError::FunctionNotFound { .. } => {
                (ErrorKind::NotFound, "ResourceNotFoundException")
            }
            LambdaError::FunctionAlreadyExists { .. } => {
                (ErrorKind::AlreadyExists, "ResourceConflictException")
            }
            LambdaError::InvalidParameter { .. } => {
                (ErrorKind::InvalidArgument, "InvalidParameterValueException")
            }
            LambdaError::InvalidRequestContent { .. } => {
                (ErrorKind::InvalidArgument, "InvalidRequestContentException")
            }
            LambdaError::Runtime { .. } => (ErrorKind::Internal, "ServiceException"),
        };

        ServiceError::new(kind, code, message)
    }
}

/// Convenience result type for Lambda operations.
pub type LambdaResult<T> = Result<T, LambdaError>;
