//! Composition root: the log sink and the stack adapters.
//!
//! The orchestrator and the function runtime only know narrow traits; this
//! module is where those traits meet the registry, the ledger, and the
//! object store. Keeping the bridges here keeps the service crates free of
//! cross-dependencies.

use std::collections::HashMap;
use std::sync::Arc;

use microstack_cfn::{BucketAdapter, FunctionAdapter, LogGroupAdapter};
use microstack_core::{ServiceError, ServiceResult};
use microstack_lambda::{FunctionRegistry, InvocationLogSink, NewFunction, bundle_from_source};
use microstack_logs::LogStore;
use microstack_s3::ObjectStore;
use serde_json::{Map, Value};

/// Log sink that writes invocation trails into the ledger.
pub struct LedgerSink {
    store: Arc<LogStore>,
}

impl LedgerSink {
    /// Create a sink over the ledger.
    #[must_use]
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }
}

impl InvocationLogSink for LedgerSink {
    fn publish(&self, group: &str, stream: &str, message: &str, timestamp: i64) {
        self.store.append_event(group, stream, message, Some(timestamp));
    }
}

/// `AWS::Lambda::Function` adapter over the registry.
pub struct FunctionResources {
    registry: Arc<FunctionRegistry>,
}

impl FunctionResources {
    /// Create an adapter over the registry.
    #[must_use]
    pub fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self { registry }
    }
}

impl FunctionAdapter for FunctionResources {
    fn create(&self, properties: &Map<String, Value>) -> ServiceResult<String> {
        let name = string_property(properties, "FunctionName")?;
        let runtime = string_property(properties, "Runtime")?;
        let role = string_property(properties, "Role")?;
        let handler = string_property(properties, "Handler")?;
        let timeout_seconds = numeric_property(properties, "Timeout")?;
        let environment = environment_variables(properties)?;
        let source = inline_code(properties)?;

        // The inline source becomes a single-file bundle named after the
        // handler's module part.
        let module = handler.split('.').next().filter(|m| !m.is_empty()).ok_or_else(|| {
            ServiceError::invalid_argument(
                "ValidationError",
                format!("Handler must be of the form module.export, got '{handler}'"),
            )
        })?;
        let bundle = bundle_from_source(module, source).map_err(ServiceError::from)?;

        let record = self.registry.create(NewFunction {
            name: name.to_owned(),
            runtime: runtime.to_owned(),
            role: role.to_owned(),
            handler: handler.to_owned(),
            timeout_seconds,
            environment,
            bundle,
        })?;
        Ok(record.name)
    }

    fn delete(&self, physical_id: &str) -> ServiceResult<()> {
        self.registry.delete(physical_id).map_err(ServiceError::from)
    }
}

/// `AWS::Logs::LogGroup` adapter over the ledger.
pub struct LogGroupResources {
    store: Arc<LogStore>,
}

impl LogGroupResources {
    /// Create an adapter over the ledger.
    #[must_use]
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }
}

impl LogGroupAdapter for LogGroupResources {
    fn create(&self, properties: &Map<String, Value>) -> ServiceResult<String> {
        let name = string_property(properties, "LogGroupName")?;
        let retention = match properties.get("RetentionInDays") {
            None => None,
            Some(value) => Some(value.as_i64().ok_or_else(|| {
                ServiceError::invalid_argument(
                    "ValidationError",
                    "RetentionInDays must be an integer",
                )
            })?),
        };
        self.store.create_group(name, retention)?;
        Ok(name.to_owned())
    }

    fn delete(&self, physical_id: &str) -> ServiceResult<()> {
        self.store.delete_group(physical_id).map_err(ServiceError::from)
    }
}

/// `AWS::S3::Bucket` adapter over the object store.
pub struct BucketResources {
    store: Arc<ObjectStore>,
}

impl BucketResources {
    /// Create an adapter over the object store.
    #[must_use]
    pub fn new(store: Arc<ObjectStore>) -> Self {
        Self { store }
    }
}

impl BucketAdapter for BucketResources {
    fn create(&self, properties: &Map<String, Value>) -> ServiceResult<String> {
        let name = string_property(properties, "BucketName")?;
        self.store.create_bucket(name)?;
        Ok(name.to_owned())
    }

    fn delete(&self, physical_id: &str) -> ServiceResult<()> {
        self.store.delete_bucket(physical_id).map_err(ServiceError::from)
    }
}

/// Fetch a required non-empty string property.
fn string_property<'a>(properties: &'a Map<String, Value>, key: &str) -> ServiceResult<&'a str> {
    properties
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::invalid_argument(
                "ValidationError",
                format!("Property {key} must be a non-empty string"),
            )
        })
}

/// Fetch an optional numeric property as whole seconds.
fn numeric_property(properties: &Map<String, Value>, key: &str) -> ServiceResult<Option<u64>> {
    match properties.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_f64().map(|f| f as u64))
            .map(Some)
            .ok_or_else(|| {
                ServiceError::invalid_argument(
                    "ValidationError",
                    format!("Property {key} must be numeric"),
                )
            }),
    }
}

/// Extract `Environment.Variables` as a string map.
fn environment_variables(
    properties: &Map<String, Value>,
) -> ServiceResult<HashMap<String, String>> {
    let Some(environment) = properties.get("Environment") else {
        return Ok(HashMap::new());
    };
    let variables = environment
        .get("Variables")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let mut map = HashMap::with_capacity(variables.len());
    for (name, value) in variables {
        let Some(text) = value.as_str() else {
            return Err(ServiceError::invalid_argument(
                "ValidationError",
                format!("Environment variable {name} must be a string"),
            ));
        };
        map.insert(name, text.to_owned());
    }
    Ok(map)
}

/// Extract `Code.ZipFile` inline source.
fn inline_code(properties: &Map<String, Value>) -> ServiceResult<&str> {
    properties
        .get("Code")
        .and_then(|code| code.get("ZipFile"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            ServiceError::invalid_argument(
                "ValidationError",
                "Code must be a mapping containing exactly ZipFile",
            )
        })
}
