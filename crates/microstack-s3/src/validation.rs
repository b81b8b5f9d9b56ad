//! Validation for bucket names and object keys.

use crate::error::ObjectStoreError;

/// Minimum bucket name length.
const MIN_BUCKET_NAME_LEN: usize = 3;

/// Maximum bucket name length.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Validate an S3 bucket name.
///
/// The accepted shape is `[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]`: 3-63
/// characters, lowercase letters, digits, dots and hyphens only, starting
/// and ending with a letter or digit.
///
/// # Errors
///
/// Returns [`ObjectStoreError::InvalidBucketName`] if any rule is violated.
///
/// # Examples
///
/// ```
/// use microstack_s3::validate_bucket_name;
///
/// assert!(validate_bucket_name("my-valid-bucket").is_ok());
/// assert!(validate_bucket_name("AB").is_err());
/// ```
pub fn validate_bucket_name(name: &str) -> Result<(), ObjectStoreError> {
    let len = name.len();

    if !(MIN_BUCKET_NAME_LEN..=MAX_BUCKET_NAME_LEN).contains(&len) {
        return Err(ObjectStoreError::InvalidBucketName {
            name: name.to_owned(),
            reason: format!(
                "Bucket name must be between {MIN_BUCKET_NAME_LEN} and {MAX_BUCKET_NAME_LEN} characters long"
            ),
        });
    }

    if !name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
    {
        return Err(ObjectStoreError::InvalidBucketName {
            name: name.to_owned(),
            reason: "Bucket name must only contain lowercase letters, numbers, hyphens, and dots"
                .to_owned(),
        });
    }

    let first = name.as_bytes()[0];
    let last = name.as_bytes()[len - 1];
    if !(first.is_ascii_lowercase() || first.is_ascii_digit())
        || !(last.is_ascii_lowercase() || last.is_ascii_digit())
    {
        return Err(ObjectStoreError::InvalidBucketName {
            name: name.to_owned(),
            reason: "Bucket name must start and end with a letter or number".to_owned(),
        });
    }

    Ok(())
}

/// Validate an S3 object key. Keys must be non-empty.
///
/// # Errors
///
/// Returns [`ObjectStoreError::InvalidArgument`] if the key is empty.
pub fn validate_object_key(key: &str) -> Result<(), ObjectStoreError> {
    if key.is_empty() {
        return Err(ObjectStoreError::InvalidArgument {
            message: "Object key must not be empty".to_owned(),
        });
    }
    Ok(())
}
