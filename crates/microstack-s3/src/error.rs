//! S3-specific error types.

use microstack_core::{ErrorKind, ServiceError};

/// Object store error type.
///
/// Each variant corresponds to a well-known S3 error code; the conversion
/// into [`ServiceError`] attaches the code and the REST status S3 uses for
/// it (404 for missing entities, 409 for conflicts, 400 otherwise).
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// The specified bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The requested bucket name is not available.
    #[error("The requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The colliding bucket name.
        bucket: String,
    },

    /// The bucket is not empty and cannot be deleted.
    #[error("The bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// The non-empty bucket.
        bucket: String,
    },

    /// The specified key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// The specified bucket name is not valid.
    #[error("Invalid bucket name: {name}: {reason}")]
    InvalidBucketName {
        /// The invalid name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An argument provided is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },
}

impl From<ObjectStoreError> for ServiceError {
    fn from(err: ObjectStoreError) -> Self {
        let message = err.to_string();
        let (kind, code) = match &err {
            ObjectStoreError::NoSuchBucket { .. } => (ErrorKind::NotFound, "NoSuchBucket"),
            ObjectStoreError::BucketAlreadyExists { .. } => {
                (ErrorKind::AlreadyExists, "BucketAlreadyExists")
            }
            ObjectStoreError::BucketNotEmpty { .. } => (ErrorKind::Conflict, "BucketNotEmpty"),
            ObjectStoreError::NoSuchKey { .. } => (ErrorKind::NotFound, "NoSuchKey"),
            ObjectStoreError::InvalidBucketName { .. } => {
                (ErrorKind::InvalidArgument, "InvalidBucketName")
            }
            ObjectStoreError::InvalidArgument { .. } => {
                (ErrorKind::InvalidArgument, "InvalidArgument")
            }
        };

        ServiceError::new(kind, code, message)
    }
}

/// Convenience result type for object store operations.
pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;
