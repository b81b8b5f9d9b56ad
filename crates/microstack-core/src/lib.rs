//! Core configuration, error carrier, and shared types for MicroStack.
//!
//! This crate provides the foundational building blocks shared across all
//! MicroStack service implementations: environment-driven configuration,
//! the structured [`ServiceError`] carrier every service funnels errors
//! through, and ARN helpers for the fixed local account.

mod arn;
mod config;
mod error;

pub use arn::{ACCOUNT_ID, REGION, function_arn, log_group_arn, stack_arn};
pub use config::{ConfigError, MicroStackConfig};
pub use error::{ErrorKind, ServiceError, ServiceResult};
