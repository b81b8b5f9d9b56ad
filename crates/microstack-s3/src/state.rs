//! Object store state: buckets and objects.
//!
//! One [`ObjectStore`] owns every bucket; each bucket keeps its objects in a
//! `BTreeMap` so ascending-key iteration gives prefix listings and V2
//! pagination for free. The aggregate is guarded by a single
//! `parking_lot::RwLock`; writers are serialised per-aggregate.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{ObjectStoreError, ObjectStoreResult};
use crate::validation::{validate_bucket_name, validate_object_key};

/// Default page size for V2 listings.
const DEFAULT_MAX_KEYS: usize = 1000;

/// A stored object with its derived metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object key.
    pub key: String,
    /// Raw body bytes.
    pub body: Bytes,
    /// Quoted hex MD5 of the body.
    pub etag: String,
    /// Content type; defaults to `application/octet-stream`.
    pub content_type: String,
    /// Last modification instant.
    pub last_modified: DateTime<Utc>,
}

/// Listing entry for an object (no body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    /// Object key.
    pub key: String,
    /// Quoted hex MD5 of the body.
    pub etag: String,
    /// Body length in bytes.
    pub size: u64,
    /// Last modification instant.
    pub last_modified: DateTime<Utc>,
}

/// Listing entry for a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    /// Bucket name.
    pub name: String,
    /// Creation instant.
    pub creation_time: DateTime<Utc>,
}

/// One page of a V2 listing.
#[derive(Debug, Clone)]
pub struct ListV2Page {
    /// Objects on this page, ascending by key.
    pub objects: Vec<ObjectSummary>,
    /// Whether more keys remain after this page.
    pub is_truncated: bool,
    /// Token for the next page: the last key returned.
    pub next_continuation_token: Option<String>,
}

#[derive(Debug)]
struct Bucket {
    creation_time: DateTime<Utc>,
    objects: BTreeMap<String, StoredObject>,
}

impl Bucket {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            creation_time: now,
            objects: BTreeMap::new(),
        }
    }
}

/// The object store.
#[derive(Debug, Default)]
pub struct ObjectStore {
    buckets: RwLock<BTreeMap<String, Bucket>>,
}

impl ObjectStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::InvalidBucketName`] for a name outside
    /// the accepted shape, or [`ObjectStoreError::BucketAlreadyExists`] on a
    /// collision.
    pub fn create_bucket(&self, name: &str) -> ObjectStoreResult<()> {
        validate_bucket_name(name)?;

        let mut buckets = self.buckets.write();
        if buckets.contains_key(name) {
            return Err(ObjectStoreError::BucketAlreadyExists {
                bucket: name.to_owned(),
            });
        }
        buckets.insert(name.to_owned(), Bucket::new(Utc::now()));

        info!(bucket = %name, "bucket created");
        Ok(())
    }

    /// List all buckets, sorted by name.
    #[must_use]
    pub fn list_buckets(&self) -> Vec<BucketSummary> {
        let buckets = self.buckets.read();
        buckets
            .iter()
            .map(|(name, b)| BucketSummary {
                name: name.clone(),
                creation_time: b.creation_time,
            })
            .collect()
    }

    /// Check that a bucket exists.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::NoSuchBucket`] if it does not.
    pub fn head_bucket(&self, name: &str) -> ObjectStoreResult<BucketSummary> {
        let buckets = self.buckets.read();
        let bucket = buckets.get(name).ok_or_else(|| ObjectStoreError::NoSuchBucket {
            bucket: name.to_owned(),
        })?;
        Ok(BucketSummary {
            name: name.to_owned(),
            creation_time: bucket.creation_time,
        })
    }

    /// Delete an empty bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::NoSuchBucket`] if absent or
    /// [`ObjectStoreError::BucketNotEmpty`] if it still holds objects.
    pub fn delete_bucket(&self, name: &str) -> ObjectStoreResult<()> {
        let mut buckets = self.buckets.write();
        let bucket = buckets.get(name).ok_or_else(|| ObjectStoreError::NoSuchBucket {
            bucket: name.to_owned(),
        })?;

        if !bucket.objects.is_empty() {
            return Err(ObjectStoreError::BucketNotEmpty {
                bucket: name.to_owned(),
            });
        }
        buckets.remove(name);

        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    /// Store an object, replacing any previous body under the same key.
    ///
    /// Returns the quoted ETag of the stored body.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::NoSuchBucket`] if the bucket is absent or
    /// [`ObjectStoreError::InvalidArgument`] for an empty key.
    pub fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> ObjectStoreResult<String> {
        validate_object_key(key)?;

        let mut buckets = self.buckets.write();
        let entry = buckets.get_mut(bucket).ok_or_else(|| ObjectStoreError::NoSuchBucket {
            bucket: bucket.to_owned(),
        })?;

        let etag = compute_etag(&body);
        let size = body.len();
        entry.objects.insert(
            key.to_owned(),
            StoredObject {
                key: key.to_owned(),
                body,
                etag: etag.clone(),
                content_type: content_type
                    .unwrap_or("application/octet-stream")
                    .to_owned(),
                last_modified: Utc::now(),
            },
        );

        debug!(bucket = %bucket, key = %key, size, "object stored");
        Ok(etag)
    }

    /// Fetch an object with its body.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::NoSuchBucket`] / [`ObjectStoreError::NoSuchKey`]
    /// if either is absent.
    pub fn get_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<StoredObject> {
        let buckets = self.buckets.read();
        let entry = buckets.get(bucket).ok_or_else(|| ObjectStoreError::NoSuchBucket {
            bucket: bucket.to_owned(),
        })?;
        entry
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NoSuchKey {
                key: key.to_owned(),
            })
    }

    /// Fetch an object's metadata (the body is cheap to clone but `head`
    /// callers only read headers).
    ///
    /// # Errors
    ///
    /// Same as [`ObjectStore::get_object`].
    pub fn head_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<StoredObject> {
        self.get_object(bucket, key)
    }

    /// Delete an object.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::NoSuchBucket`] if the bucket is absent.
    /// Deleting a missing key succeeds, matching S3.
    pub fn delete_object(&self, bucket: &str, key: &str) -> ObjectStoreResult<()> {
        let mut buckets = self.buckets.write();
        let entry = buckets.get_mut(bucket).ok_or_else(|| ObjectStoreError::NoSuchBucket {
            bucket: bucket.to_owned(),
        })?;
        entry.objects.remove(key);

        debug!(bucket = %bucket, key = %key, "object deleted");
        Ok(())
    }

    /// V2 listing with prefix, page size, and continuation token.
    ///
    /// Candidates are the keys starting with `prefix` in ascending order.
    /// With a token, the first key returned is strictly greater than the
    /// token. When the page is truncated, the token for the next page is the
    /// last key returned.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectStoreError::NoSuchBucket`] if the bucket is absent.
    pub fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        max_keys: Option<usize>,
        continuation_token: Option<&str>,
    ) -> ObjectStoreResult<ListV2Page> {
        let max_keys = max_keys.unwrap_or(DEFAULT_MAX_KEYS);

        let buckets = self.buckets.read();
        let entry = buckets.get(bucket).ok_or_else(|| ObjectStoreError::NoSuchBucket {
            bucket: bucket.to_owned(),
        })?;

        let mut objects = Vec::new();
        let mut remaining = false;
        for (key, obj) in entry.objects.iter() {
            if !key.starts_with(prefix) {
                continue;
            }
            if let Some(token) = continuation_token {
                if key.as_str() <= token {
                    continue;
                }
            }
            if objects.len() == max_keys {
                remaining = true;
                break;
            }
            objects.push(ObjectSummary {
                key: key.clone(),
                etag: obj.etag.clone(),
                size: obj.body.len() as u64,
                last_modified: obj.last_modified,
            });
        }

        let next_continuation_token = if remaining {
            objects.last().map(|o| o.key.clone())
        } else {
            None
        };

        Ok(ListV2Page {
            is_truncated: remaining,
            next_continuation_token,
            objects,
        })
    }
}

/// Compute the quoted hex MD5 digest S3 reports as the ETag.
#[must_use]
fn compute_etag(body: &[u8]) -> String {
    let digest = Md5::digest(body);
    format!("\"{}\"", hex::encode(digest))
}
