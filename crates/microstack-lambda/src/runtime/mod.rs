//! The per-invocation function runtime.
//!
//! Pipeline: resolve the record, validate the handler reference, materialise
//! the bundle into a scratch directory, execute in a fresh Node.js process
//! raced against the configured timeout, classify the outcome, publish the
//! invocation trail, and clean up. Pre-invocation failures (missing
//! function, malformed handler, missing handler file) propagate as service
//! errors; handler faults and timeouts are captured in [`InvokeResult`].

pub(crate) mod bundle;
mod node;
mod scratch;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LambdaError, LambdaResult};
use crate::registry::{FunctionRecord, FunctionRegistry};
use crate::sink::InvocationLogSink;

use self::bundle::{extract_bundle, resolve_handler_file, split_handler};
use self::node::{HandlerOutcome, run_handler};

/// The `FunctionError` value reported for faults and timeouts.
const FUNCTION_ERROR_UNHANDLED: &str = "Unhandled";

/// The outcome of one invocation.
///
/// `payload` is always valid UTF-8 JSON: the handler's return value on
/// success, or an `{errorType, errorMessage}` document when
/// `function_error` is set.
#[derive(Debug, Clone)]
pub struct InvokeResult {
    /// UTF-8 JSON payload.
    pub payload: Bytes,
    /// `Some("Unhandled")` for handler faults and timeouts.
    pub function_error: Option<String>,
}

/// The function runtime.
pub struct FunctionRuntime {
    registry: Arc<FunctionRegistry>,
    scratch_root: PathBuf,
    sink: Arc<dyn InvocationLogSink>,
}

impl std::fmt::Debug for FunctionRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRuntime")
            .field("scratch_root", &self.scratch_root)
            .finish_non_exhaustive()
    }
}

impl FunctionRuntime {
    /// Create a runtime over a registry, with scratch directories under
    /// `scratch_root` and log events delivered to `sink`.
    pub fn new(
        registry: Arc<FunctionRegistry>,
        scratch_root: PathBuf,
        sink: Arc<dyn InvocationLogSink>,
    ) -> Self {
        Self {
            registry,
            scratch_root,
            sink,
        }
    }

    /// Invoke a function by name with a raw JSON payload.
    ///
    /// An empty payload is the JSON value `null`.
    ///
    /// # Errors
    ///
    /// Pre-invocation errors only: unknown function, malformed handler
    /// reference, unreadable bundle, missing handler file, non-callable
    /// export, or runtime infrastructure failures. Faults raised by the
    /// handler and timeouts are reported inside the returned
    /// [`InvokeResult`], never as errors.
    pub async fn invoke(&self, name: &str, payload: &[u8]) -> LambdaResult<InvokeResult> {
        let record = self.registry.get(name)?;
        let (module, export) = split_handler(&record.handler)?;
        let event = parse_event(payload)?;

        let scratch = scratch::ScratchDir::create(&self.scratch_root, &record.name, record.version)
            .map_err(|e| LambdaError::runtime(format!("Failed to create scratch directory: {e}")))?;
        extract_bundle(&record.code_bundle, scratch.path())?;

        let handler_file = resolve_handler_file(scratch.path(), module).ok_or_else(|| {
            LambdaError::invalid_parameter(format!(
                "No handler source found for module '{module}' (tried .mjs, .js, .cjs)"
            ))
        })?;

        let request_id = Uuid::new_v4();
        let started = Utc::now();
        let timeout = Duration::from_secs(record.timeout_seconds);

        debug!(
            function = %record.name,
            version = record.version,
            request_id = %request_id,
            "invoking handler"
        );

        let outcome = run_handler(
            scratch.path(),
            &handler_file,
            export,
            &request_id.to_string(),
            &record.name,
            &record.environment,
            &event,
            timeout,
        )
        .await?;

        let result = match outcome {
            HandlerOutcome::BadHandler(message) => {
                return Err(LambdaError::invalid_parameter(message));
            }
            HandlerOutcome::Completed(value) => {
                let payload = serde_json::to_vec(&value).map_err(|e| {
                    LambdaError::runtime(format!("Failed to encode handler result: {e}"))
                })?;
                InvokeResult {
                    payload: Bytes::from(payload),
                    function_error: None,
                }
            }
            HandlerOutcome::Fault {
                error_type,
                error_message,
            } => fault_result(&error_type, &error_message),
            HandlerOutcome::TimedOut => {
                let message = format!(
                    "Task timed out after {:.2} seconds",
                    record.timeout_seconds as f64
                );
                fault_result("TimeoutError", &message)
            }
        };

        self.publish_trail(&record, &request_id, started.timestamp_millis(), &result);

        info!(
            function = %record.name,
            request_id = %request_id,
            function_error = result.function_error.as_deref().unwrap_or("none"),
            "invocation finished"
        );
        Ok(result)
    }

    /// Publish the `START` / `RESULT|ERROR` / `END` trail for one
    /// invocation. The three events carry timestamps t, t+1ms, t+2ms so
    /// retrieval order is stable under the ledger's tie-breaking.
    fn publish_trail(
        &self,
        record: &FunctionRecord,
        request_id: &Uuid,
        start_millis: i64,
        result: &InvokeResult,
    ) {
        let group = format!("/aws/lambda/{}", record.name);
        let day = chrono::DateTime::from_timestamp_millis(start_millis)
            .unwrap_or_else(Utc::now)
            .format("%Y/%m/%d");
        let stream = format!("{day}/[$LATEST]{}", request_id.simple());

        let verdict = if result.function_error.is_some() {
            "ERROR"
        } else {
            "RESULT"
        };
        let payload_text = String::from_utf8_lossy(&result.payload);

        self.sink.publish(
            &group,
            &stream,
            &format!("START RequestId: {request_id}"),
            start_millis,
        );
        self.sink.publish(
            &group,
            &stream,
            &format!("{verdict} {payload_text}"),
            start_millis + 1,
        );
        self.sink.publish(
            &group,
            &stream,
            &format!("END RequestId: {request_id}"),
            start_millis + 2,
        );
    }
}

/// Parse the invocation payload: empty means JSON `null`.
fn parse_event(payload: &[u8]) -> LambdaResult<serde_json::Value> {
    if payload.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(payload).map_err(|e| LambdaError::InvalidRequestContent {
        message: e.to_string(),
    })
}

/// Build the fault-shaped result payload.
fn fault_result(error_type: &str, error_message: &str) -> InvokeResult {
    let payload = json!({
        "errorType": error_type,
        "errorMessage": error_message,
    });
    InvokeResult {
        payload: Bytes::from(serde_json::to_vec(&payload).expect("fault payload serializes")),
        function_error: Some(FUNCTION_ERROR_UNHANDLED.to_owned()),
    }
}
