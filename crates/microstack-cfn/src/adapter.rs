//! Adapter traits between the orchestrator and the provisioned services.
//!
//! The orchestrator never touches the registry, ledger, or object store
//! directly; the binary implements these traits against them. `create`
//! receives the resource's properties with every intrinsic already resolved
//! and returns the physical id; `delete` takes the physical id back. A
//! *not-found* carrier error from `delete` is what tolerant stack deletion
//! keys off.

use std::sync::Arc;

use microstack_core::ServiceResult;
use serde_json::{Map, Value};

/// Provisions `AWS::Lambda::Function` resources.
pub trait FunctionAdapter: Send + Sync {
    /// Create a function from resolved template properties; returns the
    /// physical id (the function name).
    fn create(&self, properties: &Map<String, Value>) -> ServiceResult<String>;

    /// Delete a function by physical id.
    fn delete(&self, physical_id: &str) -> ServiceResult<()>;
}

/// Provisions `AWS::Logs::LogGroup` resources.
pub trait LogGroupAdapter: Send + Sync {
    /// Create a log group from resolved template properties; returns the
    /// physical id (the group name).
    fn create(&self, properties: &Map<String, Value>) -> ServiceResult<String>;

    /// Delete a log group by physical id.
    fn delete(&self, physical_id: &str) -> ServiceResult<()>;
}

/// Provisions `AWS::S3::Bucket` resources.
pub trait BucketAdapter: Send + Sync {
    /// Create a bucket from resolved template properties; returns the
    /// physical id (the bucket name).
    fn create(&self, properties: &Map<String, Value>) -> ServiceResult<String>;

    /// Delete a bucket by physical id.
    fn delete(&self, physical_id: &str) -> ServiceResult<()>;
}

/// The full adapter set the orchestrator drives.
#[derive(Clone)]
pub struct ResourceAdapters {
    /// Lambda function adapter.
    pub functions: Arc<dyn FunctionAdapter>,
    /// Log group adapter.
    pub log_groups: Arc<dyn LogGroupAdapter>,
    /// Bucket adapter.
    pub buckets: Arc<dyn BucketAdapter>,
}

impl std::fmt::Debug for ResourceAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceAdapters").finish_non_exhaustive()
    }
}
