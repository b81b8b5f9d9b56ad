//! CloudWatch Logs HTTP service (JSON 1.1).
//!
//! All requests are `POST /` with the operation named in the `X-Amz-Target`
//! header:
//!
//! ```text
//! X-Amz-Target: Logs_20140328.PutLogEvents
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::{Response, StatusCode};
use microstack_core::ServiceError;
use microstack_logs::model::{
    CreateLogGroupRequest, CreateLogStreamRequest, DeleteLogGroupRequest,
    DescribeLogGroupsRequest, DescribeLogGroupsResponse, DescribeLogStreamsRequest,
    DescribeLogStreamsResponse, GetLogEventsRequest, GetLogEventsResponse, LogGroupEntry,
    LogStreamEntry, OutputLogEvent, PutLogEventsRequest, PutLogEventsResponse,
    PutRetentionPolicyRequest,
};
use microstack_logs::LogStore;
use tracing::debug;

use crate::body::HttpBody;
use crate::respond::{CONTENT_TYPE_AMZ_JSON, json_error, json_response};

/// The expected prefix for the `X-Amz-Target` header value.
const TARGET_PREFIX: &str = "Logs_20140328.";

/// All supported Logs operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsOperation {
    /// Create a log group.
    CreateLogGroup,
    /// Delete a log group.
    DeleteLogGroup,
    /// Create a log stream.
    CreateLogStream,
    /// Set a group's retention policy.
    PutRetentionPolicy,
    /// List log groups by prefix.
    DescribeLogGroups,
    /// List a group's streams by prefix.
    DescribeLogStreams,
    /// Append events to a stream.
    PutLogEvents,
    /// Read a stream's events.
    GetLogEvents,
}

impl LogsOperation {
    /// Parse an operation name into a `LogsOperation`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "CreateLogGroup" => Some(Self::CreateLogGroup),
            "DeleteLogGroup" => Some(Self::DeleteLogGroup),
            "CreateLogStream" => Some(Self::CreateLogStream),
            "PutRetentionPolicy" => Some(Self::PutRetentionPolicy),
            "DescribeLogGroups" => Some(Self::DescribeLogGroups),
            "DescribeLogStreams" => Some(Self::DescribeLogStreams),
            "PutLogEvents" => Some(Self::PutLogEvents),
            "GetLogEvents" => Some(Self::GetLogEvents),
            _ => None,
        }
    }

    /// The AWS operation name string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateLogGroup => "CreateLogGroup",
            Self::DeleteLogGroup => "DeleteLogGroup",
            Self::CreateLogStream => "CreateLogStream",
            Self::PutRetentionPolicy => "PutRetentionPolicy",
            Self::DescribeLogGroups => "DescribeLogGroups",
            Self::DescribeLogStreams => "DescribeLogStreams",
            Self::PutLogEvents => "PutLogEvents",
            Self::GetLogEvents => "GetLogEvents",
        }
    }
}

impl fmt::Display for LogsOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a request belongs to the Logs service.
#[must_use]
pub fn is_logs_request(headers: &http::HeaderMap) -> bool {
    headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|t| t.starts_with("Logs_"))
}

/// Resolve the operation from the `X-Amz-Target` header.
fn resolve_operation(headers: &http::HeaderMap) -> Result<LogsOperation, ServiceError> {
    let target = headers
        .get("x-amz-target")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            ServiceError::invalid_argument("MissingAction", "Missing required header: X-Amz-Target")
                .with_status(StatusCode::BAD_REQUEST)
        })?;

    let name = target.strip_prefix(TARGET_PREFIX).ok_or_else(|| {
        ServiceError::invalid_argument(
            "InvalidAction",
            format!("Unrecognized operation: {target}"),
        )
    })?;

    LogsOperation::from_name(name).ok_or_else(|| {
        ServiceError::invalid_argument(
            "InvalidAction",
            format!("Unrecognized operation: {target}"),
        )
    })
}

/// The Logs HTTP service.
#[derive(Debug, Clone)]
pub struct LogsService {
    store: Arc<LogStore>,
}

impl LogsService {
    /// Create a service over the ledger.
    #[must_use]
    pub fn new(store: Arc<LogStore>) -> Self {
        Self { store }
    }

    /// Handle one Logs request.
    pub fn handle(&self, parts: &http::request::Parts, body: &Bytes) -> Response<HttpBody> {
        match self.dispatch(parts, body) {
            Ok(response) => response,
            Err(err) => json_error(&err, CONTENT_TYPE_AMZ_JSON),
        }
    }

    fn dispatch(
        &self,
        parts: &http::request::Parts,
        body: &Bytes,
    ) -> Result<Response<HttpBody>, ServiceError> {
        if parts.method != http::Method::POST {
            return Err(ServiceError::invalid_argument(
                "InvalidAction",
                format!("Logs requires POST, got {}", parts.method),
            ));
        }

        let op = resolve_operation(&parts.headers)?;
        debug!(operation = %op, "dispatching Logs operation");

        match op {
            LogsOperation::CreateLogGroup => {
                let req: CreateLogGroupRequest = deserialize(body)?;
                self.store
                    .create_group(&req.log_group_name, req.retention_in_days)
                    .map_err(ServiceError::from)?;
                empty_json()
            }
            LogsOperation::DeleteLogGroup => {
                let req: DeleteLogGroupRequest = deserialize(body)?;
                self.store
                    .delete_group(&req.log_group_name)
                    .map_err(ServiceError::from)?;
                empty_json()
            }
            LogsOperation::CreateLogStream => {
                let req: CreateLogStreamRequest = deserialize(body)?;
                self.store
                    .create_stream(&req.log_group_name, &req.log_stream_name)
                    .map_err(ServiceError::from)?;
                empty_json()
            }
            LogsOperation::PutRetentionPolicy => {
                let req: PutRetentionPolicyRequest = deserialize(body)?;
                self.store
                    .put_retention(&req.log_group_name, req.retention_in_days)
                    .map_err(ServiceError::from)?;
                empty_json()
            }
            LogsOperation::DescribeLogGroups => {
                let req: DescribeLogGroupsRequest = deserialize_or_default(body)?;
                let prefix = req.log_group_name_prefix.unwrap_or_default();
                let groups = self
                    .store
                    .describe_groups(&prefix)
                    .into_iter()
                    .map(|g| LogGroupEntry {
                        arn: microstack_core::log_group_arn(&g.name),
                        log_group_name: g.name,
                        creation_time: g.creation_time.timestamp_millis(),
                        retention_in_days: g.retention_days,
                        stored_bytes: g.stored_bytes,
                    })
                    .collect();
                serialize(&DescribeLogGroupsResponse { log_groups: groups })
            }
            LogsOperation::DescribeLogStreams => {
                let req: DescribeLogStreamsRequest = deserialize(body)?;
                let prefix = req.log_stream_name_prefix.unwrap_or_default();
                let streams = self
                    .store
                    .describe_streams(&req.log_group_name, &prefix)
                    .map_err(ServiceError::from)?
                    .into_iter()
                    .map(|s| LogStreamEntry {
                        log_stream_name: s.name,
                        creation_time: s.creation_time.timestamp_millis(),
                        last_ingestion_time: s.last_ingestion_time,
                        stored_bytes: s.stored_bytes,
                    })
                    .collect();
                serialize(&DescribeLogStreamsResponse {
                    log_streams: streams,
                })
            }
            LogsOperation::PutLogEvents => {
                let req: PutLogEventsRequest = deserialize(body)?;
                for event in &req.log_events {
                    self.store.append_event(
                        &req.log_group_name,
                        &req.log_stream_name,
                        &event.message,
                        event.timestamp,
                    );
                }
                serialize(&PutLogEventsResponse {
                    next_sequence_token: "0".to_owned(),
                })
            }
            LogsOperation::GetLogEvents => {
                let req: GetLogEventsRequest = deserialize(body)?;
                let events = self
                    .store
                    .get_events(&req.log_group_name, &req.log_stream_name)
                    .map_err(ServiceError::from)?
                    .into_iter()
                    .map(|e| OutputLogEvent {
                        timestamp: e.timestamp,
                        ingestion_time: e.ingestion_time,
                        message: e.message,
                    })
                    .collect();
                serialize(&GetLogEventsResponse { events })
            }
        }
    }
}

/// Deserialize a JSON request body.
fn deserialize<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ServiceError> {
    serde_json::from_slice(body).map_err(|e| {
        ServiceError::invalid_argument(
            "InvalidParameterException",
            format!("Failed to parse request body: {e}"),
        )
    })
}

/// Deserialize a JSON request body, treating an empty body as the default.
fn deserialize_or_default<T: serde::de::DeserializeOwned + Default>(
    body: &[u8],
) -> Result<T, ServiceError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    deserialize(body)
}

/// Serialize a response type into a JSON 1.1 response.
fn serialize<T: serde::Serialize>(value: &T) -> Result<Response<HttpBody>, ServiceError> {
    let json = serde_json::to_vec(value)
        .map_err(|e| ServiceError::internal(format!("Failed to serialize response: {e}")))?;
    Ok(json_response(StatusCode::OK, CONTENT_TYPE_AMZ_JSON, json))
}

/// Operations without output return an empty `{}` body.
fn empty_json() -> Result<Response<HttpBody>, ServiceError> {
    Ok(json_response(
        StatusCode::OK,
        CONTENT_TYPE_AMZ_JSON,
        b"{}".to_vec(),
    ))
}
