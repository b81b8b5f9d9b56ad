//! Stack records, statuses, and the event journal.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Stack-level status state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackStatus {
    /// Creation underway.
    CreateInProgress,
    /// Creation finished successfully.
    CreateComplete,
    /// Creation failed; terminal, no rollback on create.
    CreateFailed,
    /// Update underway.
    UpdateInProgress,
    /// Update finished successfully.
    UpdateComplete,
    /// Update failed; rollback follows.
    UpdateFailed,
    /// Rolling back to the previous template.
    UpdateRollbackInProgress,
    /// Rollback finished successfully.
    UpdateRollbackComplete,
    /// Rollback itself failed.
    UpdateRollbackFailed,
    /// Deletion underway.
    DeleteInProgress,
    /// Deletion finished successfully.
    DeleteComplete,
    /// Deletion failed partway.
    DeleteFailed,
}

impl StackStatus {
    /// The wire string (`CREATE_IN_PROGRESS`, ...).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
        }
    }

    /// Whether `updateStack` is allowed from this status.
    #[must_use]
    pub fn allows_update(&self) -> bool {
        matches!(
            self,
            Self::CreateComplete | Self::UpdateComplete | Self::UpdateRollbackComplete
        )
    }

    /// Whether this status is terminal (no operation in progress).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::CreateInProgress
                | Self::UpdateInProgress
                | Self::UpdateRollbackInProgress
                | Self::DeleteInProgress
        )
    }
}

impl std::fmt::Display for StackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource-level status; the verb mirrors the stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Resource creation underway.
    CreateInProgress,
    /// Resource created.
    CreateComplete,
    /// Resource creation failed.
    CreateFailed,
    /// Resource re-creation during an update underway.
    UpdateInProgress,
    /// Resource re-created during an update.
    UpdateComplete,
    /// Resource re-creation during an update failed.
    UpdateFailed,
    /// Resource deletion underway.
    DeleteInProgress,
    /// Resource deleted (or already gone).
    DeleteComplete,
    /// Resource deletion failed.
    DeleteFailed,
}

impl ResourceStatus {
    /// The wire string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::CreateFailed => "CREATE_FAILED",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
        }
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resource record inside a stack; at most one entry per logical id.
#[derive(Debug, Clone)]
pub struct StackResource {
    /// Logical id from the template.
    pub logical_id: String,
    /// Physical id once provisioned.
    pub physical_id: Option<String>,
    /// Resource type string.
    pub resource_type: String,
    /// Current status.
    pub status: ResourceStatus,
    /// Reason for the current status, if any.
    pub status_reason: Option<String>,
    /// Instant of the last status change.
    pub timestamp: DateTime<Utc>,
}

/// One journal entry; the journal is prepend-only and never compacted.
#[derive(Debug, Clone)]
pub struct StackEvent {
    /// Fresh UUID per event.
    pub event_id: String,
    /// Owning stack id.
    pub stack_id: String,
    /// Owning stack name.
    pub stack_name: String,
    /// Logical id (the stack name for stack-level events).
    pub logical_id: String,
    /// Physical id, when known.
    pub physical_id: Option<String>,
    /// Resource type (`AWS::CloudFormation::Stack` for stack-level events).
    pub resource_type: String,
    /// Status string at the time of the event.
    pub status: String,
    /// Optional reason.
    pub reason: Option<String>,
    /// Event instant.
    pub timestamp: DateTime<Utc>,
}

/// The type string used for stack-level journal entries.
pub const STACK_RESOURCE_TYPE: &str = "AWS::CloudFormation::Stack";

/// A stack record.
#[derive(Debug, Clone)]
pub struct Stack {
    /// ARN-shaped stack id.
    pub stack_id: String,
    /// Unique stack name.
    pub stack_name: String,
    /// Raw template text as last accepted.
    pub template_body: String,
    /// Creation instant.
    pub creation_time: DateTime<Utc>,
    /// Current status.
    pub status: StackStatus,
    /// Reason for the current status, if any.
    pub status_reason: Option<String>,
    /// Resource records, one per logical id.
    pub resources: Vec<StackResource>,
    /// Logical ids in the order they completed; reversed for deletes.
    pub creation_order: Vec<String>,
    /// Event journal, most recent first.
    pub events: Vec<StackEvent>,
}

impl Stack {
    /// Create a fresh stack record in `CREATE_IN_PROGRESS`.
    #[must_use]
    pub fn new(stack_name: &str, template_body: &str) -> Self {
        let stack_id = microstack_core::stack_arn(stack_name, &Uuid::new_v4().to_string());
        Self {
            stack_id,
            stack_name: stack_name.to_owned(),
            template_body: template_body.to_owned(),
            creation_time: Utc::now(),
            status: StackStatus::CreateInProgress,
            status_reason: None,
            resources: Vec::new(),
            creation_order: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Transition the stack status, prepending a stack-level event.
    pub fn set_status(&mut self, status: StackStatus, reason: Option<String>) {
        self.status = status;
        self.status_reason = reason.clone();
        self.push_event(
            self.stack_name.clone(),
            None,
            STACK_RESOURCE_TYPE.to_owned(),
            status.as_str().to_owned(),
            reason,
        );
    }

    /// Upsert a resource record and prepend the matching event.
    pub fn set_resource_status(
        &mut self,
        logical_id: &str,
        resource_type: &str,
        physical_id: Option<String>,
        status: ResourceStatus,
        reason: Option<String>,
    ) {
        let now = Utc::now();
        match self.resources.iter_mut().find(|r| r.logical_id == logical_id) {
            Some(existing) => {
                if physical_id.is_some() {
                    existing.physical_id = physical_id.clone();
                }
                existing.status = status;
                existing.status_reason = reason.clone();
                existing.timestamp = now;
            }
            None => self.resources.push(StackResource {
                logical_id: logical_id.to_owned(),
                physical_id: physical_id.clone(),
                resource_type: resource_type.to_owned(),
                status,
                status_reason: reason.clone(),
                timestamp: now,
            }),
        }

        self.push_event(
            logical_id.to_owned(),
            physical_id,
            resource_type.to_owned(),
            status.as_str().to_owned(),
            reason,
        );
    }

    fn push_event(
        &mut self,
        logical_id: String,
        physical_id: Option<String>,
        resource_type: String,
        status: String,
        reason: Option<String>,
    ) {
        self.events.insert(
            0,
            StackEvent {
                event_id: Uuid::new_v4().to_string(),
                stack_id: self.stack_id.clone(),
                stack_name: self.stack_name.clone(),
                logical_id,
                physical_id,
                resource_type,
                status,
                reason,
                timestamp: Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_start_in_create_in_progress() {
        let stack = Stack::new("demo", "{}");
        assert_eq!(stack.status, StackStatus::CreateInProgress);
        assert!(stack.stack_id.contains("stack/demo/"));
    }

    #[test]
    fn test_should_prepend_events_on_status_change() {
        let mut stack = Stack::new("demo", "{}");
        stack.set_status(StackStatus::CreateInProgress, None);
        stack.set_status(StackStatus::CreateComplete, None);

        assert_eq!(stack.events.len(), 2);
        // Most recent first.
        assert_eq!(stack.events[0].status, "CREATE_COMPLETE");
        assert_eq!(stack.events[1].status, "CREATE_IN_PROGRESS");
        assert_eq!(stack.events[0].resource_type, STACK_RESOURCE_TYPE);
        assert_ne!(stack.events[0].event_id, stack.events[1].event_id);
    }

    #[test]
    fn test_should_keep_one_record_per_logical_id() {
        let mut stack = Stack::new("demo", "{}");
        stack.set_resource_status("A", "AWS::S3::Bucket", None, ResourceStatus::CreateInProgress, None);
        stack.set_resource_status(
            "A",
            "AWS::S3::Bucket",
            Some("a-bucket".to_owned()),
            ResourceStatus::CreateComplete,
            None,
        );

        assert_eq!(stack.resources.len(), 1);
        assert_eq!(stack.resources[0].status, ResourceStatus::CreateComplete);
        assert_eq!(stack.resources[0].physical_id.as_deref(), Some("a-bucket"));
        // But both transitions are in the journal.
        assert_eq!(stack.events.len(), 2);
    }

    #[test]
    fn test_should_keep_physical_id_when_later_update_omits_it() {
        let mut stack = Stack::new("demo", "{}");
        stack.set_resource_status(
            "A",
            "AWS::S3::Bucket",
            Some("a-bucket".to_owned()),
            ResourceStatus::CreateComplete,
            None,
        );
        stack.set_resource_status("A", "AWS::S3::Bucket", None, ResourceStatus::DeleteInProgress, None);
        assert_eq!(stack.resources[0].physical_id.as_deref(), Some("a-bucket"));
    }

    #[test]
    fn test_should_gate_updates_on_status() {
        assert!(StackStatus::CreateComplete.allows_update());
        assert!(StackStatus::UpdateComplete.allows_update());
        assert!(StackStatus::UpdateRollbackComplete.allows_update());
        assert!(!StackStatus::CreateFailed.allows_update());
        assert!(!StackStatus::DeleteComplete.allows_update());
        assert!(!StackStatus::UpdateInProgress.allows_update());
    }

    #[test]
    fn test_should_classify_terminal_statuses() {
        assert!(StackStatus::CreateComplete.is_terminal());
        assert!(StackStatus::CreateFailed.is_terminal());
        assert!(StackStatus::DeleteComplete.is_terminal());
        assert!(!StackStatus::CreateInProgress.is_terminal());
        assert!(!StackStatus::UpdateRollbackInProgress.is_terminal());
    }
}
