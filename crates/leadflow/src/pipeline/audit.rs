//! Append-only activity log of lifecycle transitions.
//!
//! Entries reference leads by id only; they are never updated and outlive the lead they
//! describe (archived or deleted leads keep their history).

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{LeadId, PipelineStage};
use super::store::{LeadTransaction, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    WorkflowBucketChanged,
    KanbanColumnChanged,
    StatusChanged,
    Archived,
    Restored,
    #[serde(rename = "sent_to_elevenlabs")]
    SentToDialer,
}

impl AuditAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WorkflowBucketChanged => "workflow_bucket_changed",
            Self::KanbanColumnChanged => "kanban_column_changed",
            Self::StatusChanged => "status_changed",
            Self::Archived => "archived",
            Self::Restored => "restored",
            Self::SentToDialer => "sent_to_elevenlabs",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityEntry {
    pub id: u64,
    pub lead_id: LeadId,
    pub action: AuditAction,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewActivity {
    pub lead_id: LeadId,
    pub action: AuditAction,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Write side of the activity log. Engine operations only ever append through here.
pub struct AuditLog;

impl AuditLog {
    pub fn record(
        tx: &mut dyn LeadTransaction,
        lead_id: LeadId,
        action: AuditAction,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) -> Result<ActivityEntry, StoreError> {
        tx.append_activity(NewActivity {
            lead_id,
            action,
            old_value: old_value.map(str::to_string),
            new_value: new_value.map(str::to_string),
        })
    }

    /// Logs bucket and column changes independently; returns how many entries were written.
    pub fn record_stage_change(
        tx: &mut dyn LeadTransaction,
        lead_id: LeadId,
        before: PipelineStage,
        after: PipelineStage,
    ) -> Result<usize, StoreError> {
        let mut written = 0;

        if before.bucket() != after.bucket() {
            Self::record(
                tx,
                lead_id,
                AuditAction::WorkflowBucketChanged,
                Some(before.bucket().as_str()),
                Some(after.bucket().as_str()),
            )?;
            written += 1;
        }

        if before.kanban_column() != after.kanban_column() {
            Self::record(
                tx,
                lead_id,
                AuditAction::KanbanColumnChanged,
                before.kanban_column().map(|column| column.as_str()),
                after.kanban_column().map(|column| column.as_str()),
            )?;
            written += 1;
        }

        Ok(written)
    }

    pub fn history(
        tx: &mut dyn LeadTransaction,
        lead_id: LeadId,
    ) -> Result<Vec<ActivityEntry>, StoreError> {
        tx.activity(lead_id)
    }
}
