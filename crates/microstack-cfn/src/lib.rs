//! CloudFormation-style stack orchestrator for MicroStack.
//!
//! Parses declarative templates (JSON or YAML), orders resources
//! topologically over `DependsOn`, provisions them through narrow adapter
//! traits against the other subsystems, records a full event timeline, and
//! implements update-with-rollback and tolerant deletion. Each stack is a
//! single-writer entity; describes may observe interim state.

mod adapter;
mod error;
mod graph;
mod intrinsics;
mod orchestrator;
mod stack;
mod template;

pub use adapter::{BucketAdapter, FunctionAdapter, LogGroupAdapter, ResourceAdapters};
pub use error::{StackError, StackResult};
pub use orchestrator::StackOrchestrator;
pub use stack::{ResourceStatus, Stack, StackEvent, StackResource, StackStatus};
pub use template::{
    ResourceSpec, TYPE_BUCKET, TYPE_LAMBDA_FUNCTION, TYPE_LOG_GROUP, Template, parse_template,
};
