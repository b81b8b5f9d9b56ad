//! Node.js handler execution.
//!
//! Each invocation spawns a fresh `node` process running an embedded driver
//! script. The driver imports the handler file, invokes the export with
//! `(event, context)`, and reports a single marker-delimited JSON envelope
//! on stdout. A fresh process per invocation guarantees the handler always
//! observes the current code bundle; no module cache survives between
//! invocations. The function's environment variables are passed to the
//! child process only; the parent environment is never touched.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{LambdaError, LambdaResult};

/// File name the driver script is written under inside the scratch dir.
const DRIVER_FILE: &str = ".microstack-runner.cjs";

/// Marker preceding the driver's result envelope on stdout. Handler code is
/// free to write to stdout; only the text after the last marker is parsed.
const RESULT_MARKER: &str = "__MICROSTACK_RESULT__";

/// The driver script executed by `node`.
///
/// argv: `<handlerPath> <exportName> <requestId> <functionName> <timeoutMs>`;
/// the event JSON arrives on stdin.
const DRIVER_SOURCE: &str = r#"'use strict';

const { pathToFileURL } = require('node:url');

function reply(envelope) {
  process.stdout.write('\n__MICROSTACK_RESULT__' + JSON.stringify(envelope) + '\n');
}

function messageOf(err) {
  if (err && typeof err.message === 'string' && err.message.length > 0) {
    return err.message;
  }
  return 'Unknown error';
}

function nameOf(err) {
  if (err && typeof err.name === 'string' && err.name.length > 0) {
    return err.name;
  }
  return 'Error';
}

async function readStdin() {
  const chunks = [];
  for await (const chunk of process.stdin) {
    chunks.push(chunk);
  }
  return Buffer.concat(chunks).toString('utf8');
}

async function main() {
  const [handlerPath, exportName, requestId, functionName, timeoutMs] = process.argv.slice(2);
  const deadline = Date.now() + Number(timeoutMs);

  const raw = await readStdin();
  const event = raw.length === 0 ? null : JSON.parse(raw);

  let mod;
  try {
    mod = await import(pathToFileURL(handlerPath).href);
  } catch (err) {
    reply({ outcome: 'bad-handler', message: 'Cannot load handler file: ' + messageOf(err) });
    return;
  }

  const fn = mod[exportName];
  if (typeof fn !== 'function') {
    reply({ outcome: 'bad-handler', message: "Handler export '" + exportName + "' is not a function" });
    return;
  }

  const context = {
    awsRequestId: requestId,
    functionName: functionName,
    functionVersion: '$LATEST',
    getRemainingTimeInMillis: () => Math.max(0, deadline - Date.now()),
  };

  try {
    const value = await fn(event, context);
    const normalized = value === undefined ? null : value;
    try {
      reply({ outcome: 'ok', value: normalized });
    } catch (err) {
      reply({ outcome: 'fault', errorType: nameOf(err), errorMessage: messageOf(err) });
    }
  } catch (err) {
    reply({ outcome: 'fault', errorType: nameOf(err), errorMessage: messageOf(err) });
  }
}

main().catch((err) => {
  reply({ outcome: 'fault', errorType: nameOf(err), errorMessage: messageOf(err) });
});
"#;

/// What the handler did.
#[derive(Debug)]
pub enum HandlerOutcome {
    /// The handler returned a value (possibly `null`).
    Completed(serde_json::Value),
    /// An exception escaped the handler.
    Fault {
        /// The fault's class name, or `Error`.
        error_type: String,
        /// The fault's message, or `Unknown error`.
        error_message: String,
    },
    /// The timer won the race; the process was killed.
    TimedOut,
    /// The handler could not be loaded or the export is not callable.
    BadHandler(String),
}

/// The driver's stdout envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriverEnvelope {
    outcome: String,
    #[serde(default)]
    value: Option<serde_json::Value>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Run the handler in a fresh `node` process, racing it against `timeout`.
///
/// # Errors
///
/// Returns a runtime error when the driver cannot be written, `node` cannot
/// be spawned, or the envelope is missing/garbled. Handler faults and
/// timeouts are *outcomes*, not errors.
#[allow(clippy::too_many_arguments)]
pub async fn run_handler(
    scratch: &Path,
    handler_file: &Path,
    export: &str,
    request_id: &str,
    function_name: &str,
    environment: &HashMap<String, String>,
    event: &serde_json::Value,
    timeout: Duration,
) -> LambdaResult<HandlerOutcome> {
    let driver_path = scratch.join(DRIVER_FILE);
    tokio::fs::write(&driver_path, DRIVER_SOURCE)
        .await
        .map_err(|e| LambdaError::runtime(format!("Failed to write driver script: {e}")))?;

    let mut command = Command::new("node");
    command
        .arg(&driver_path)
        .arg(handler_file)
        .arg(export)
        .arg(request_id)
        .arg(function_name)
        .arg(timeout.as_millis().to_string())
        .current_dir(scratch)
        .envs(environment)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| LambdaError::runtime(format!("Failed to spawn node: {e}")))?;

    let event_bytes = serde_json::to_vec(event)
        .map_err(|e| LambdaError::runtime(format!("Failed to encode event: {e}")))?;

    if let Some(mut stdin) = child.stdin.take() {
        // A write failure means the child died early; the envelope parse
        // below reports the real problem.
        if let Err(e) = stdin.write_all(&event_bytes).await {
            debug!(error = %e, "failed to write event to handler stdin");
        }
    }

    // `wait_with_output` owns the child, so dropping the future on timeout
    // drops the child and `kill_on_drop` reaps the process.
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_elapsed) => Ok(HandlerOutcome::TimedOut),
        Ok(Err(e)) => Err(LambdaError::runtime(format!(
            "Failed to collect handler output: {e}"
        ))),
        Ok(Ok(output)) => parse_outcome(&output.stdout),
    }
}

/// Extract the outcome from the driver's stdout.
fn parse_outcome(stdout: &[u8]) -> LambdaResult<HandlerOutcome> {
    let text = String::from_utf8_lossy(stdout);
    let start = text
        .rfind(RESULT_MARKER)
        .ok_or_else(|| LambdaError::runtime("Handler driver produced no result envelope"))?;
    let line = text[start + RESULT_MARKER.len()..]
        .lines()
        .next()
        .unwrap_or("");

    let envelope: DriverEnvelope = serde_json::from_str(line)
        .map_err(|e| LambdaError::runtime(format!("Malformed driver envelope: {e}")))?;

    match envelope.outcome.as_str() {
        "ok" => Ok(HandlerOutcome::Completed(
            envelope.value.unwrap_or(serde_json::Value::Null),
        )),
        "fault" => Ok(HandlerOutcome::Fault {
            error_type: envelope.error_type.unwrap_or_else(|| "Error".to_owned()),
            error_message: envelope
                .error_message
                .unwrap_or_else(|| "Unknown error".to_owned()),
        }),
        "bad-handler" => Ok(HandlerOutcome::BadHandler(
            envelope
                .message
                .unwrap_or_else(|| "Handler could not be loaded".to_owned()),
        )),
        other => Err(LambdaError::runtime(format!(
            "Unknown driver outcome: {other}"
        ))),
    }
}
