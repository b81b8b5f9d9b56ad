//! In-memory S3 object store for MicroStack.
//!
//! Buckets hold objects in a sorted map so prefix listings and V2
//! pagination fall out of ordered iteration. Bodies are byte-accurate and
//! ETags are the quoted hex MD5 of the body, matching what S3 reports for
//! non-multipart uploads.

mod error;
mod state;
mod validation;

pub use error::{ObjectStoreError, ObjectStoreResult};
pub use state::{BucketSummary, ListV2Page, ObjectStore, ObjectSummary, StoredObject};
pub use validation::{validate_bucket_name, validate_object_key};
