//! Logs-specific error types.

use http::StatusCode;
use microstack_core::{ErrorKind, ServiceError};

/// Logs service error type.
///
/// Each variant maps to one of the CloudWatch Logs error codes. The JSON 1.1
/// dialect reports every client error as HTTP 400, so the conversion into
/// [`ServiceError`] overrides the carrier's default not-found status.
#[derive(Debug, thiserror::Error)]
pub enum LogsError {
    /// The specified log group already exists.
    #[error("The specified log group already exists: {name}")]
    GroupAlreadyExists {
        /// The colliding group name.
        name: String,
    },

    /// The specified log group does not exist.
    #[error("The specified log group does not exist: {name}")]
    GroupNotFound {
        /// The group name that was not found.
        name: String,
    },

    /// The specified log stream already exists.
    #[error("The specified log stream already exists: {name}")]
    StreamAlreadyExists {
        /// The colliding stream name.
        name: String,
    },

    /// The specified log stream does not exist.
    #[error("The specified log stream does not exist: {name}")]
    StreamNotFound {
        /// The stream name that was not found.
        name: String,
    },

    /// A request parameter is invalid.
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        /// Description of the invalid parameter.
        message: String,
    },
}

impl From<LogsError> for ServiceError {
    fn from(err: LogsError) -> Self {
        let message = err.to_string();
        let (kind, code) = match &err {
            LogsError::GroupAlreadyExists { .. } | LogsError::StreamAlreadyExists { .. } => {
                (ErrorKind::AlreadyExists, "ResourceAlreadyExistsException")
            }
            LogsError::GroupNotFound { .. } | LogsError::StreamNotFound { .. } => {
                (ErrorKind::NotFound, "ResourceNotFoundException")
            }
            LogsError::InvalidParameter { .. } => {
                (ErrorKind::InvalidArgument, "InvalidParameterException")
            }
        };

        ServiceError::new(kind, code, message).with_status(StatusCode::BAD_REQUEST)
    }
}

/// Convenience result type for logs operations.
pub type LogsResult<T> = Result<T, LogsError>;
