//! Wire model for the CloudWatch Logs JSON 1.1 dialect.
//!
//! Field names follow the AWS API (camelCase); timestamps are epoch
//! milliseconds.

use serde::{Deserialize, Serialize};

/// `Logs_20140328.CreateLogGroup` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLogGroupRequest {
    /// Name of the group to create.
    pub log_group_name: String,
    /// Optional retention in days.
    #[serde(default)]
    pub retention_in_days: Option<i64>,
}

/// `Logs_20140328.DeleteLogGroup` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteLogGroupRequest {
    /// Name of the group to delete.
    pub log_group_name: String,
}

/// `Logs_20140328.CreateLogStream` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLogStreamRequest {
    /// Owning group.
    pub log_group_name: String,
    /// Name of the stream to create.
    pub log_stream_name: String,
}

/// `Logs_20140328.PutRetentionPolicy` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutRetentionPolicyRequest {
    /// Target group.
    pub log_group_name: String,
    /// Retention in days.
    pub retention_in_days: i64,
}

/// `Logs_20140328.DescribeLogGroups` request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeLogGroupsRequest {
    /// Optional name prefix filter.
    #[serde(default)]
    pub log_group_name_prefix: Option<String>,
}

/// One group in a `DescribeLogGroups` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogGroupEntry {
    /// Group name.
    pub log_group_name: String,
    /// Creation time in epoch milliseconds.
    pub creation_time: i64,
    /// Configured retention, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_in_days: Option<i64>,
    /// Total stored bytes across the group's streams.
    pub stored_bytes: u64,
    /// Group ARN.
    pub arn: String,
}

/// `Logs_20140328.DescribeLogGroups` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeLogGroupsResponse {
    /// Matching groups, sorted by name.
    pub log_groups: Vec<LogGroupEntry>,
}

/// `Logs_20140328.DescribeLogStreams` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeLogStreamsRequest {
    /// Owning group.
    pub log_group_name: String,
    /// Optional name prefix filter.
    #[serde(default)]
    pub log_stream_name_prefix: Option<String>,
}

/// One stream in a `DescribeLogStreams` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStreamEntry {
    /// Stream name.
    pub log_stream_name: String,
    /// Creation time in epoch milliseconds.
    pub creation_time: i64,
    /// Last ingestion time, if anything was appended.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_ingestion_time: Option<i64>,
    /// Total stored bytes of the stream's messages.
    pub stored_bytes: u64,
}

/// `Logs_20140328.DescribeLogStreams` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescribeLogStreamsResponse {
    /// Matching streams, sorted by name.
    pub log_streams: Vec<LogStreamEntry>,
}

/// One input event in a `PutLogEvents` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputLogEvent {
    /// Event time in epoch milliseconds; defaults to the ingestion instant.
    #[serde(default)]
    pub timestamp: Option<i64>,
    /// Message text.
    pub message: String,
}

/// `Logs_20140328.PutLogEvents` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutLogEventsRequest {
    /// Target group (auto-created if missing).
    pub log_group_name: String,
    /// Target stream (auto-created if missing).
    pub log_stream_name: String,
    /// Events to append.
    pub log_events: Vec<InputLogEvent>,
}

/// `Logs_20140328.PutLogEvents` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PutLogEventsResponse {
    /// Opaque token; MicroStack does not sequence uploads.
    pub next_sequence_token: String,
}

/// `Logs_20140328.GetLogEvents` request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLogEventsRequest {
    /// Owning group.
    pub log_group_name: String,
    /// Target stream.
    pub log_stream_name: String,
}

/// One output event in a `GetLogEvents` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputLogEvent {
    /// Event time in epoch milliseconds.
    pub timestamp: i64,
    /// Ingestion time in epoch milliseconds.
    pub ingestion_time: i64,
    /// Message text.
    pub message: String,
}

/// `Logs_20140328.GetLogEvents` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetLogEventsResponse {
    /// Events ascending by timestamp.
    pub events: Vec<OutputLogEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_deserialize_create_log_group_request() {
        let req: CreateLogGroupRequest =
            serde_json::from_str(r#"{"logGroupName":"apps","retentionInDays":7}"#).unwrap();
        assert_eq!(req.log_group_name, "apps");
        assert_eq!(req.retention_in_days, Some(7));
    }

    #[test]
    fn test_should_default_optional_fields() {
        let req: CreateLogGroupRequest =
            serde_json::from_str(r#"{"logGroupName":"apps"}"#).unwrap();
        assert!(req.retention_in_days.is_none());

        let req: DescribeLogGroupsRequest = serde_json::from_str("{}").unwrap();
        assert!(req.log_group_name_prefix.is_none());
    }

    #[test]
    fn test_should_deserialize_put_log_events_request() {
        let req: PutLogEventsRequest = serde_json::from_str(
            r#"{
                "logGroupName": "g",
                "logStreamName": "s",
                "logEvents": [
                    {"timestamp": 123, "message": "hello"},
                    {"message": "no timestamp"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(req.log_events.len(), 2);
        assert_eq!(req.log_events[0].timestamp, Some(123));
        assert!(req.log_events[1].timestamp.is_none());
    }

    #[test]
    fn test_should_serialize_group_entry_in_camel_case() {
        let entry = LogGroupEntry {
            log_group_name: "apps".to_owned(),
            creation_time: 1,
            retention_in_days: None,
            stored_bytes: 0,
            arn: "arn:aws:logs:us-east-1:000000000000:log-group:apps".to_owned(),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["logGroupName"], "apps");
        assert!(json.get("retentionInDays").is_none());
    }
}
