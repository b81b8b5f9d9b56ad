//! Function registry: code + configuration store with versioning.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{LambdaError, LambdaResult};

/// The single runtime tag the registry accepts.
pub const ACCEPTED_RUNTIME: &str = "nodejs18.x";

/// Minimum configurable timeout in seconds.
const MIN_TIMEOUT_SECONDS: u64 = 1;

/// Default timeout in seconds when none is configured.
const DEFAULT_TIMEOUT_SECONDS: u64 = 3;

/// A registered function.
#[derive(Debug, Clone)]
pub struct FunctionRecord {
    /// Unique function name.
    pub name: String,
    /// Runtime tag (always [`ACCEPTED_RUNTIME`]).
    pub runtime: String,
    /// Execution role; opaque to MicroStack.
    pub role: String,
    /// Dotted `module.export` handler reference.
    pub handler: String,
    /// Per-invocation timeout in seconds.
    pub timeout_seconds: u64,
    /// Environment variables injected into the handler process.
    pub environment: HashMap<String, String>,
    /// The raw ZIP bundle.
    pub code_bundle: Bytes,
    /// Base64 SHA-256 of the bundle.
    pub code_digest: String,
    /// Monotonic version; 1 on create, +1 on each code update.
    pub version: u64,
    /// Last mutation instant.
    pub last_modified: DateTime<Utc>,
}

/// Input for [`FunctionRegistry::create`].
#[derive(Debug, Clone)]
pub struct NewFunction {
    /// Unique function name.
    pub name: String,
    /// Runtime tag; must equal [`ACCEPTED_RUNTIME`].
    pub runtime: String,
    /// Execution role.
    pub role: String,
    /// Dotted `module.export` handler reference.
    pub handler: String,
    /// Timeout in seconds; defaults to 3.
    pub timeout_seconds: Option<u64>,
    /// Environment variables.
    pub environment: HashMap<String, String>,
    /// Decoded ZIP bundle.
    pub bundle: Bytes,
}

/// Partial configuration update for [`FunctionRegistry::update_config`].
///
/// `None` fields are retained from the current record.
#[derive(Debug, Clone, Default)]
pub struct ConfigPatch {
    /// New runtime tag, if changing.
    pub runtime: Option<String>,
    /// New role, if changing.
    pub role: Option<String>,
    /// New handler reference, if changing.
    pub handler: Option<String>,
    /// New timeout, if changing.
    pub timeout_seconds: Option<u64>,
    /// New environment, if changing (replaces the whole mapping).
    pub environment: Option<HashMap<String, String>>,
}

/// The function registry.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: DashMap<String, FunctionRecord>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new function at version 1.
    ///
    /// # Errors
    ///
    /// Rejects unsupported runtimes, empty bundles, timeouts below one
    /// second, and duplicate names.
    pub fn create(&self, input: NewFunction) -> LambdaResult<FunctionRecord> {
        if input.runtime != ACCEPTED_RUNTIME {
            return Err(LambdaError::invalid_parameter(format!(
                "Unsupported runtime: {} (only {ACCEPTED_RUNTIME} is available)",
                input.runtime
            )));
        }
        if input.bundle.is_empty() {
            return Err(LambdaError::invalid_parameter(
                "Code bundle must not be empty",
            ));
        }
        let timeout_seconds = input.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if timeout_seconds < MIN_TIMEOUT_SECONDS {
            return Err(LambdaError::invalid_parameter(format!(
                "Timeout must be at least {MIN_TIMEOUT_SECONDS} second, got {timeout_seconds}"
            )));
        }

        let record = FunctionRecord {
            code_digest: compute_code_digest(&input.bundle),
            name: input.name.clone(),
            runtime: input.runtime,
            role: input.role,
            handler: input.handler,
            timeout_seconds,
            environment: input.environment,
            code_bundle: input.bundle,
            version: 1,
            last_modified: Utc::now(),
        };

        // Entry-based insert keeps the uniqueness check and the write atomic.
        match self.functions.entry(input.name.clone()) {
            Entry::Occupied(_) => Err(LambdaError::FunctionAlreadyExists {
                name: input.name,
            }),
            Entry::Vacant(slot) => {
                let stored = slot.insert(record);
                info!(function = %input.name, "function created");
                Ok(stored.value().clone())
            }
        }
    }

    /// Fetch a function by name.
    ///
    /// # Errors
    ///
    /// Returns [`LambdaError::FunctionNotFound`] if absent.
    pub fn get(&self, name: &str) -> LambdaResult<FunctionRecord> {
        self.functions
            .get(name)
            .map(|r| r.clone())
            .ok_or_else(|| LambdaError::FunctionNotFound {
                name: name.to_owned(),
            })
    }

    /// List all functions, sorted by name.
    #[must_use]
    pub fn list(&self) -> Vec<FunctionRecord> {
        let mut records: Vec<FunctionRecord> =
            self.functions.iter().map(|r| r.clone()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Delete a function.
    ///
    /// # Errors
    ///
    /// Returns [`LambdaError::FunctionNotFound`] if absent.
    pub fn delete(&self, name: &str) -> LambdaResult<()> {
        if self.functions.remove(name).is_none() {
            return Err(LambdaError::FunctionNotFound {
                name: name.to_owned(),
            });
        }
        info!(function = %name, "function deleted");
        Ok(())
    }

    /// Apply a configuration patch. The version is unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LambdaError::FunctionNotFound`] if absent, or an
    /// *invalid-parameter* error for a bad runtime or timeout in the patch.
    pub fn update_config(&self, name: &str, patch: ConfigPatch) -> LambdaResult<FunctionRecord> {
        if let Some(ref runtime) = patch.runtime {
            if runtime != ACCEPTED_RUNTIME {
                return Err(LambdaError::invalid_parameter(format!(
                    "Unsupported runtime: {runtime} (only {ACCEPTED_RUNTIME} is available)"
                )));
            }
        }
        if let Some(timeout) = patch.timeout_seconds {
            if timeout < MIN_TIMEOUT_SECONDS {
                return Err(LambdaError::invalid_parameter(format!(
                    "Timeout must be at least {MIN_TIMEOUT_SECONDS} second, got {timeout}"
                )));
            }
        }

        let mut record =
            self.functions
                .get_mut(name)
                .ok_or_else(|| LambdaError::FunctionNotFound {
                    name: name.to_owned(),
                })?;

        if let Some(runtime) = patch.runtime {
            record.runtime = runtime;
        }
        if let Some(role) = patch.role {
            record.role = role;
        }
        if let Some(handler) = patch.handler {
            record.handler = handler;
        }
        if let Some(timeout) = patch.timeout_seconds {
            record.timeout_seconds = timeout;
        }
        if let Some(environment) = patch.environment {
            record.environment = environment;
        }
        record.last_modified = Utc::now();

        info!(function = %name, version = record.version, "function configuration updated");
        Ok(record.clone())
    }

    /// Replace the code bundle, recompute the digest, and bump the version.
    ///
    /// # Errors
    ///
    /// Returns [`LambdaError::FunctionNotFound`] if absent or an
    /// *invalid-parameter* error for an empty bundle.
    pub fn update_code(&self, name: &str, bundle: Bytes) -> LambdaResult<FunctionRecord> {
        if bundle.is_empty() {
            return Err(LambdaError::invalid_parameter(
                "Code bundle must not be empty",
            ));
        }

        let mut record =
            self.functions
                .get_mut(name)
                .ok_or_else(|| LambdaError::FunctionNotFound {
                    name: name.to_owned(),
                })?;

        record.code_digest = compute_code_digest(&bundle);
        record.code_bundle = bundle;
        record.version += 1;
        record.last_modified = Utc::now();

        info!(function = %name, version = record.version, "function code updated");
        Ok(record.clone())
    }
}

/// Base64-encoded SHA-256 of a code bundle.
#[must_use]
pub fn compute_code_digest(bundle: &[u8]) -> String {
    BASE64_STANDARD.encode(Sha256::digest(bundle))
}
