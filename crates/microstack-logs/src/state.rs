//! Log ledger state: groups, streams, and events.
//!
//! A single [`LogStore`] owns every group. Streams live inside their group,
//! events inside their stream. The whole aggregate is guarded by one
//! `parking_lot::RwLock` around a `BTreeMap`, which makes the lexicographic
//! listings the natural read path; writers are serialised per-aggregate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{LogsError, LogsResult};

/// A single log event inside a stream.
///
/// Timestamps are epoch milliseconds, matching the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Caller-supplied event time (defaults to the ingestion instant).
    pub timestamp: i64,
    /// When the ledger accepted the event.
    pub ingestion_time: i64,
    /// UTF-8 message text.
    pub message: String,
}

/// A log stream: an ordered list of events plus accounting.
#[derive(Debug)]
struct LogStream {
    creation_time: DateTime<Utc>,
    last_ingestion_time: Option<i64>,
    stored_bytes: u64,
    events: Vec<LogEvent>,
}

impl LogStream {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            creation_time: now,
            last_ingestion_time: None,
            stored_bytes: 0,
            events: Vec::new(),
        }
    }
}

/// A log group: named streams plus retention configuration.
#[derive(Debug)]
struct LogGroup {
    creation_time: DateTime<Utc>,
    retention_days: Option<i64>,
    streams: BTreeMap<String, LogStream>,
}

impl LogGroup {
    fn new(now: DateTime<Utc>, retention_days: Option<i64>) -> Self {
        Self {
            creation_time: now,
            retention_days,
            streams: BTreeMap::new(),
        }
    }

    fn stored_bytes(&self) -> u64 {
        self.streams.values().map(|s| s.stored_bytes).sum()
    }
}

/// Listing entry for a log group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogGroupSummary {
    /// Group name.
    pub name: String,
    /// Creation instant.
    pub creation_time: DateTime<Utc>,
    /// Configured retention, if any.
    pub retention_days: Option<i64>,
    /// Sum of the stored bytes of every stream in the group.
    pub stored_bytes: u64,
}

/// Listing entry for a log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogStreamSummary {
    /// Stream name.
    pub name: String,
    /// Creation instant.
    pub creation_time: DateTime<Utc>,
    /// Last ingestion instant, if anything was ever appended.
    pub last_ingestion_time: Option<i64>,
    /// Sum of the UTF-8 byte lengths of the stream's event messages.
    pub stored_bytes: u64,
}

/// The log ledger.
#[derive(Debug, Default)]
pub struct LogStore {
    groups: RwLock<BTreeMap<String, LogGroup>>,
}

impl LogStore {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty log group.
    ///
    /// # Errors
    ///
    /// Returns [`LogsError::GroupAlreadyExists`] if the name is taken, or
    /// [`LogsError::InvalidParameter`] if the name is empty.
    pub fn create_group(&self, name: &str, retention_days: Option<i64>) -> LogsResult<()> {
        if name.is_empty() {
            return Err(LogsError::InvalidParameter {
                message: "logGroupName must not be empty".to_owned(),
            });
        }

        let mut groups = self.groups.write();
        if groups.contains_key(name) {
            return Err(LogsError::GroupAlreadyExists {
                name: name.to_owned(),
            });
        }
        groups.insert(name.to_owned(), LogGroup::new(Utc::now(), retention_days));

        info!(log_group = %name, "log group created");
        Ok(())
    }

    /// Delete a log group and everything in it.
    ///
    /// # Errors
    ///
    /// Returns [`LogsError::GroupNotFound`] if the group does not exist.
    pub fn delete_group(&self, name: &str) -> LogsResult<()> {
        let mut groups = self.groups.write();
        if groups.remove(name).is_none() {
            return Err(LogsError::GroupNotFound {
                name: name.to_owned(),
            });
        }

        info!(log_group = %name, "log group deleted");
        Ok(())
    }

    /// Register an empty stream in an existing group.
    ///
    /// # Errors
    ///
    /// Returns [`LogsError::GroupNotFound`] if the group is absent, or
    /// [`LogsError::StreamAlreadyExists`] on a name collision.
    pub fn create_stream(&self, group: &str, name: &str) -> LogsResult<()> {
        let mut groups = self.groups.write();
        let entry = groups.get_mut(group).ok_or_else(|| LogsError::GroupNotFound {
            name: group.to_owned(),
        })?;

        if entry.streams.contains_key(name) {
            return Err(LogsError::StreamAlreadyExists {
                name: name.to_owned(),
            });
        }
        entry.streams.insert(name.to_owned(), LogStream::new(Utc::now()));

        debug!(log_group = %group, log_stream = %name, "log stream created");
        Ok(())
    }

    /// Set the retention policy of an existing group.
    ///
    /// # Errors
    ///
    /// Returns [`LogsError::GroupNotFound`] if the group is absent, or
    /// [`LogsError::InvalidParameter`] for a non-positive retention.
    pub fn put_retention(&self, group: &str, days: i64) -> LogsResult<()> {
        if days < 1 {
            return Err(LogsError::InvalidParameter {
                message: format!("retentionInDays must be positive, got {days}"),
            });
        }

        let mut groups = self.groups.write();
        let entry = groups.get_mut(group).ok_or_else(|| LogsError::GroupNotFound {
            name: group.to_owned(),
        })?;
        entry.retention_days = Some(days);
        Ok(())
    }

    /// Append one event, auto-creating the group and stream if missing.
    ///
    /// The event timestamp defaults to now; the ingestion time is always
    /// now. The stream is re-sorted by timestamp after the insert (the sort
    /// is stable, so ties keep insertion order) and its byte accounting is
    /// recomputed.
    pub fn append_event(&self, group: &str, stream: &str, message: &str, timestamp: Option<i64>) {
        let now = Utc::now();
        let now_millis = now.timestamp_millis();

        let mut groups = self.groups.write();
        let group_entry = groups
            .entry(group.to_owned())
            .or_insert_with(|| LogGroup::new(now, None));
        let stream_entry = group_entry
            .streams
            .entry(stream.to_owned())
            .or_insert_with(|| LogStream::new(now));

        stream_entry.events.push(LogEvent {
            timestamp: timestamp.unwrap_or(now_millis),
            ingestion_time: now_millis,
            message: message.to_owned(),
        });
        stream_entry.events.sort_by_key(|e| e.timestamp);
        stream_entry.stored_bytes = stream_entry
            .events
            .iter()
            .map(|e| e.message.len() as u64)
            .sum();
        stream_entry.last_ingestion_time = Some(now_millis);

        debug!(
            log_group = %group,
            log_stream = %stream,
            bytes = stream_entry.stored_bytes,
            "log event appended"
        );
    }

    /// List groups whose name starts with `prefix`, sorted by name.
    ///
    /// An empty prefix returns every group. Listings never paginate.
    #[must_use]
    pub fn describe_groups(&self, prefix: &str) -> Vec<LogGroupSummary> {
        let groups = self.groups.read();
        groups
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, g)| LogGroupSummary {
                name: name.clone(),
                creation_time: g.creation_time,
                retention_days: g.retention_days,
                stored_bytes: g.stored_bytes(),
            })
            .collect()
    }

    /// List the streams of one group whose name starts with `prefix`.
    ///
    /// # Errors
    ///
    /// Returns [`LogsError::GroupNotFound`] if the group is absent.
    pub fn describe_streams(&self, group: &str, prefix: &str) -> LogsResult<Vec<LogStreamSummary>> {
        let groups = self.groups.read();
        let entry = groups.get(group).ok_or_else(|| LogsError::GroupNotFound {
            name: group.to_owned(),
        })?;

        Ok(entry
            .streams
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, s)| LogStreamSummary {
                name: name.clone(),
                creation_time: s.creation_time,
                last_ingestion_time: s.last_ingestion_time,
                stored_bytes: s.stored_bytes,
            })
            .collect())
    }

    /// Return a fresh copy of a stream's events, ascending by timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`LogsError::GroupNotFound`] / [`LogsError::StreamNotFound`]
    /// if either is absent.
    pub fn get_events(&self, group: &str, stream: &str) -> LogsResult<Vec<LogEvent>> {
        let groups = self.groups.read();
        let group_entry = groups.get(group).ok_or_else(|| LogsError::GroupNotFound {
            name: group.to_owned(),
        })?;
        let stream_entry =
            group_entry
                .streams
                .get(stream)
                .ok_or_else(|| LogsError::StreamNotFound {
                    name: stream.to_owned(),
                })?;

        Ok(stream_entry.events.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_create_and_list_groups_sorted() {
        let store = LogStore::new();
        store.create_group("beta", None).unwrap();
        store.create_group("alpha", Some(7)).unwrap();

        let groups = store.describe_groups("");
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
        assert_eq!(groups[0].retention_days, Some(7));
    }

    #[test]
    fn test_should_reject_duplicate_group() {
        let store = LogStore::new();
        store.create_group("apps", None).unwrap();
        assert!(matches!(
            store.create_group("apps", None),
            Err(LogsError::GroupAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_should_reject_delete_of_missing_group() {
        let store = LogStore::new();
        assert!(matches!(
            store.delete_group("nope"),
            Err(LogsError::GroupNotFound { .. })
        ));
    }

    #[test]
    fn test_should_filter_groups_by_prefix() {
        let store = LogStore::new();
        store.create_group("/aws/lambda/a", None).unwrap();
        store.create_group("/aws/lambda/b", None).unwrap();
        store.create_group("/custom", None).unwrap();

        let groups = store.describe_groups("/aws/lambda/");
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_should_auto_create_group_and_stream_on_append() {
        let store = LogStore::new();
        store.append_event("g", "s", "hello", None);

        let groups = store.describe_groups("");
        assert_eq!(groups.len(), 1);
        let streams = store.describe_streams("g", "").unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].stored_bytes, 5);
    }

    #[test]
    fn test_should_sort_events_by_timestamp() {
        let store = LogStore::new();
        store.append_event("g", "s", "third", Some(300));
        store.append_event("g", "s", "first", Some(100));
        store.append_event("g", "s", "second", Some(200));

        let events = store.get_events("g", "s").unwrap();
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_should_keep_insertion_order_for_equal_timestamps() {
        let store = LogStore::new();
        store.append_event("g", "s", "a", Some(100));
        store.append_event("g", "s", "b", Some(100));
        store.append_event("g", "s", "c", Some(100));

        let events = store.get_events("g", "s").unwrap();
        let messages: Vec<&str> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_should_account_stream_bytes_as_utf8_lengths() {
        let store = LogStore::new();
        store.append_event("g", "s", "héllo", None);
        store.append_event("g", "s", "ab", None);

        let streams = store.describe_streams("g", "").unwrap();
        // "héllo" is 6 bytes in UTF-8, "ab" is 2.
        assert_eq!(streams[0].stored_bytes, 8);

        let groups = store.describe_groups("g");
        assert_eq!(groups[0].stored_bytes, 8);
    }

    #[test]
    fn test_should_reject_describe_streams_of_missing_group() {
        let store = LogStore::new();
        assert!(matches!(
            store.describe_streams("nope", ""),
            Err(LogsError::GroupNotFound { .. })
        ));
    }

    #[test]
    fn test_should_reject_get_events_of_missing_stream() {
        let store = LogStore::new();
        store.create_group("g", None).unwrap();
        assert!(matches!(
            store.get_events("g", "nope"),
            Err(LogsError::StreamNotFound { .. })
        ));
    }

    #[test]
    fn test_should_create_stream_explicitly() {
        let store = LogStore::new();
        store.create_group("g", None).unwrap();
        store.create_stream("g", "s").unwrap();

        assert!(matches!(
            store.create_stream("g", "s"),
            Err(LogsError::StreamAlreadyExists { .. })
        ));
        assert!(matches!(
            store.create_stream("missing", "s"),
            Err(LogsError::GroupNotFound { .. })
        ));
    }

    #[test]
    fn test_should_set_retention_on_existing_group() {
        let store = LogStore::new();
        store.create_group("g", None).unwrap();
        store.put_retention("g", 14).unwrap();

        let groups = store.describe_groups("g");
        assert_eq!(groups[0].retention_days, Some(14));

        assert!(matches!(
            store.put_retention("g", 0),
            Err(LogsError::InvalidParameter { .. })
        ));
        assert!(matches!(
            store.put_retention("missing", 14),
            Err(LogsError::GroupNotFound { .. })
        ));
    }

    #[test]
    fn test_should_set_ingestion_time_on_append() {
        let store = LogStore::new();
        let before = Utc::now().timestamp_millis();
        store.append_event("g", "s", "x", Some(1));
        let after = Utc::now().timestamp_millis();

        let events = store.get_events("g", "s").unwrap();
        assert_eq!(events[0].timestamp, 1);
        assert!(events[0].ingestion_time >= before && events[0].ingestion_time <= after);

        let streams = store.describe_streams("g", "").unwrap();
        assert_eq!(streams[0].last_ingestion_time, Some(events[0].ingestion_time));
    }
}
