//! In-process end-to-end scenarios for MicroStack.
//!
//! These tests wire the real crates together the way the server binary
//! does - registry, runtime, ledger, object store, and orchestrator - and
//! drive whole scenarios through them. Tests that execute JavaScript skip
//! themselves when `node` is not on the PATH.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use microstack_cfn::{
    BucketAdapter, FunctionAdapter, LogGroupAdapter, ResourceAdapters, StackOrchestrator,
};
use microstack_core::{ServiceError, ServiceResult};
use microstack_lambda::{
    FunctionRegistry, FunctionRuntime, InvocationLogSink, NewFunction, bundle_from_source,
};
use microstack_logs::LogStore;
use microstack_s3::ObjectStore;
use serde_json::Value;

#[cfg(test)]
mod scenario_invoke;
#[cfg(test)]
mod scenario_objects;
#[cfg(test)]
mod scenario_stack;

/// Everything the server binary wires, assembled in-process.
pub struct TestStack {
    /// The log ledger.
    pub logs: Arc<LogStore>,
    /// The object store.
    pub objects: Arc<ObjectStore>,
    /// The function registry.
    pub registry: Arc<FunctionRegistry>,
    /// The function runtime, publishing into `logs`.
    pub runtime: Arc<FunctionRuntime>,
    /// The stack orchestrator, provisioning through the stores above.
    pub orchestrator: Arc<StackOrchestrator>,
    /// Owns the scratch tree for the lifetime of the test.
    _scratch: tempfile::TempDir,
}

/// Initialize tracing once for the whole test binary.
fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Assemble the full in-process stack.
#[must_use]
pub fn test_stack() -> TestStack {
    init_tracing();
    let scratch = tempfile::tempdir().expect("scratch tempdir");

    let logs = Arc::new(LogStore::new());
    let objects = Arc::new(ObjectStore::new());
    let registry = Arc::new(FunctionRegistry::new());
    let runtime = Arc::new(FunctionRuntime::new(
        Arc::clone(&registry),
        scratch.path().to_path_buf(),
        Arc::new(LedgerSink {
            store: Arc::clone(&logs),
        }),
    ));

    let adapters = ResourceAdapters {
        functions: Arc::new(FunctionResources {
            registry: Arc::clone(&registry),
        }),
        log_groups: Arc::new(LogGroupResources {
            store: Arc::clone(&logs),
        }),
        buckets: Arc::new(BucketResources {
            store: Arc::clone(&objects),
        }),
    };
    let orchestrator = Arc::new(StackOrchestrator::new(adapters));

    TestStack {
        logs,
        objects,
        registry,
        runtime,
        orchestrator,
        _scratch: scratch,
    }
}

/// Whether `node` is available; scenarios that run handlers skip without it.
#[must_use]
pub fn node_available() -> bool {
    std::process::Command::new("node")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Register a function whose bundle holds one `index.mjs` with `source`.
pub fn create_function(stack: &TestStack, name: &str, source: &str) -> ServiceResult<()> {
    create_function_with(stack, name, source, 3, HashMap::new())
}

/// Register a function with an explicit timeout and environment.
pub fn create_function_with(
    stack: &TestStack,
    name: &str,
    source: &str,
    timeout_seconds: u64,
    environment: HashMap<String, String>,
) -> ServiceResult<()> {
    let bundle = bundle_from_source("index", source)?;
    stack
        .registry
        .create(NewFunction {
            name: name.to_owned(),
            runtime: "nodejs18.x".to_owned(),
            role: "arn:aws:iam::000000000000:role/integration".to_owned(),
            handler: "index.handler".to_owned(),
            timeout_seconds: Some(timeout_seconds),
            environment,
            bundle,
        })
        .map_err(ServiceError::from)?;
    Ok(())
}

/// Base64-encode a single-file bundle, as the HTTP layer would receive it.
#[must_use]
pub fn bundle_b64(source: &str) -> String {
    let bundle = bundle_from_source("index", source).expect("bundle");
    BASE64_STANDARD.encode(&bundle)
}

/// Parse an invocation payload as JSON.
#[must_use]
pub fn parse_payload(payload: &Bytes) -> Value {
    serde_json::from_slice(payload).expect("invocation payload is valid JSON")
}

// ---------------------------------------------------------------------------
// Glue mirroring the server binary's wiring
// ---------------------------------------------------------------------------

struct LedgerSink {
    store: Arc<LogStore>,
}

impl InvocationLogSink for LedgerSink {
    fn publish(&self, group: &str, stream: &str, message: &str, timestamp: i64) {
        self.store.append_event(group, stream, message, Some(timestamp));
    }
}

struct FunctionResources {
    registry: Arc<FunctionRegistry>,
}

impl FunctionAdapter for FunctionResources {
    fn create(&self, properties: &serde_json::Map<String, Value>) -> ServiceResult<String> {
        let name = required_str(properties, "FunctionName")?;
        let handler = required_str(properties, "Handler")?;
        let module = handler.split('.').next().unwrap_or("index");
        let source = properties
            .get("Code")
            .and_then(|code| code.get("ZipFile"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        let mut environment = HashMap::new();
        if let Some(variables) = properties
            .get("Environment")
            .and_then(|e| e.get("Variables"))
            .and_then(Value::as_object)
        {
            for (key, value) in variables {
                environment.insert(key.clone(), value.as_str().unwrap_or_default().to_owned());
            }
        }

        let bundle = bundle_from_source(module, source)?;
        let record = self.registry.create(NewFunction {
            name: name.to_owned(),
            runtime: required_str(properties, "Runtime")?.to_owned(),
            role: required_str(properties, "Role")?.to_owned(),
            handler: handler.to_owned(),
            timeout_seconds: properties.get("Timeout").and_then(Value::as_u64),
            environment,
            bundle,
        })?;
        Ok(record.name)
    }

    fn delete(&self, physical_id: &str) -> ServiceResult<()> {
        self.registry.delete(physical_id).map_err(ServiceError::from)
    }
}

struct LogGroupResources {
    store: Arc<LogStore>,
}

impl LogGroupAdapter for LogGroupResources {
    fn create(&self, properties: &serde_json::Map<String, Value>) -> ServiceResult<String> {
        let name = required_str(properties, "LogGroupName")?;
        let retention = properties.get("RetentionInDays").and_then(Value::as_i64);
        self.store.create_group(name, retention)?;
        Ok(name.to_owned())
    }

    fn delete(&self, physical_id: &str) -> ServiceResult<()> {
        self.store.delete_group(physical_id).map_err(ServiceError::from)
    }
}

struct BucketResources {
    store: Arc<ObjectStore>,
}

impl BucketAdapter for BucketResources {
    fn create(&self, properties: &serde_json::Map<String, Value>) -> ServiceResult<String> {
        let name = required_str(properties, "BucketName")?;
        self.store.create_bucket(name)?;
        Ok(name.to_owned())
    }

    fn delete(&self, physical_id: &str) -> ServiceResult<()> {
        self.store.delete_bucket(physical_id).map_err(ServiceError::from)
    }
}

fn required_str<'a>(
    properties: &'a serde_json::Map<String, Value>,
    key: &str,
) -> ServiceResult<&'a str> {
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
