//! Lead lifecycle state machine.
//!
//! Every operation runs inside one store transaction. Stage changes go through
//! [`apply_stage`], which rewrites the stage and legacy status together and appends one
//! activity entry per changed dimension.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::audit::{ActivityEntry, AuditAction, AuditLog};
use super::domain::{
    ArchiveId, ArchivedLead, KanbanColumn, Lead, LeadDetailsPatch, LeadDraft, LeadField, LeadId,
    NewArchivedLead, PipelineStage, WorkflowBucket,
};
use super::error::{ValidationError, WorkflowError};
use super::phone::PhoneFunnel;
use super::store::{LeadStore, LeadTransaction, StoreError};

pub struct WorkflowEngine<S> {
    store: Arc<S>,
    phone_funnel: PhoneFunnel,
}

impl<S> WorkflowEngine<S>
where
    S: LeadStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_phone_funnel(store, PhoneFunnel::standard())
    }

    pub fn with_phone_funnel(store: Arc<S>, phone_funnel: PhoneFunnel) -> Self {
        Self {
            store,
            phone_funnel,
        }
    }

    pub fn create_lead(&self, draft: LeadDraft) -> Result<Lead, WorkflowError> {
        let new_lead = draft.into_new_lead();
        if new_lead.name.is_empty() {
            return Err(ValidationError::MissingFields(vec![LeadField::Name.label()]).into());
        }

        let lead = self
            .store
            .transaction(|tx| tx.insert_lead(new_lead).map_err(WorkflowError::from))?;
        info!(lead_id = %lead.id, name = %lead.name, "lead created");
        Ok(lead)
    }

    pub fn get_lead(&self, id: LeadId) -> Result<Lead, WorkflowError> {
        self.store.transaction(|tx| fetch_lead(tx, id))
    }

    /// Active leads, newest first, optionally limited to one bucket.
    pub fn list_leads(&self, bucket: Option<WorkflowBucket>) -> Result<Vec<Lead>, WorkflowError> {
        let mut leads = self
            .store
            .transaction(|tx| tx.leads().map_err(WorkflowError::from))?;
        if let Some(bucket) = bucket {
            leads.retain(|lead| lead.stage.bucket() == bucket);
        }
        leads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(leads)
    }

    pub fn update_lead_details(
        &self,
        id: LeadId,
        patch: LeadDetailsPatch,
    ) -> Result<Lead, WorkflowError> {
        self.store.transaction(|tx| {
            let mut lead = fetch_lead(tx, id)?;
            if patch.is_empty() {
                return Ok(lead);
            }

            patch.apply(&mut lead);
            if lead.name.is_empty() {
                let missing = ValidationError::MissingFields(vec![LeadField::Name.label()]);
                return Err(WorkflowError::from(missing));
            }
            lead.updated_at = Utc::now();
            tx.update_lead(&lead)?;
            Ok(lead)
        })
    }

    /// Hard-deletes active leads; unknown ids are skipped. Activity entries are kept.
    pub fn bulk_delete(&self, ids: &[LeadId]) -> Result<usize, WorkflowError> {
        let deleted = self.store.transaction(|tx| {
            let mut deleted = 0;
            for id in unique(ids) {
                match tx.delete_lead(id) {
                    Ok(()) => deleted += 1,
                    Err(StoreError::NotFound { .. }) => continue,
                    Err(other) => return Err(WorkflowError::from(other)),
                }
            }
            Ok::<_, WorkflowError>(deleted)
        })?;
        info!(requested = ids.len(), deleted, "leads deleted");
        Ok(deleted)
    }

    pub fn activity_for(&self, id: LeadId) -> Result<Vec<ActivityEntry>, WorkflowError> {
        self.store
            .transaction(|tx| AuditLog::history(tx, id).map_err(WorkflowError::from))
    }

    /// Moves a lead to `requested_bucket`. Inside Kanban the column defaults to `new`;
    /// outside it any column is dropped. Re-issuing the current stage changes nothing.
    pub fn transition(
        &self,
        id: LeadId,
        requested_bucket: &str,
        requested_column: Option<&str>,
    ) -> Result<Lead, WorkflowError> {
        let bucket: WorkflowBucket = requested_bucket.parse()?;
        let column = match (bucket, requested_column) {
            (WorkflowBucket::Kanban, Some(raw)) => Some(raw.parse::<KanbanColumn>()?),
            _ => None,
        };
        let target = PipelineStage::from_parts(bucket, column);

        self.store.transaction(|tx| {
            let lead = fetch_lead(tx, id)?;
            apply_stage(tx, lead, target)
        })
    }

    /// Promotes one lead onto the Kanban board once its contact data is complete.
    pub fn promote_to_kanban(&self, id: LeadId) -> Result<Lead, WorkflowError> {
        self.store.transaction(|tx| promote(tx, id))
    }

    /// All-or-nothing promotion: the first invalid lead aborts the batch and nothing from
    /// it is written.
    pub fn bulk_promote_to_kanban(&self, ids: &[LeadId]) -> Result<Vec<Lead>, WorkflowError> {
        self.store.transaction(|tx| {
            unique(ids)
                .into_iter()
                .map(|id| promote(tx, id))
                .collect::<Result<Vec<_>, _>>()
        })
    }

    /// Moves leads currently in `ALL` to `READY`; ids elsewhere (or unknown) are skipped.
    pub fn bulk_mark_ready(&self, ids: &[LeadId]) -> Result<usize, WorkflowError> {
        self.store.transaction(|tx| {
            let mut moved = 0;
            for id in unique(ids) {
                let Some(lead) = tx.lead(id)? else {
                    continue;
                };
                if lead.stage != PipelineStage::All {
                    continue;
                }
                apply_stage(tx, lead, PipelineStage::Ready)?;
                moved += 1;
            }
            Ok(moved)
        })
    }

    /// Snapshots the lead into the archive, deletes it and logs where it came from, all in
    /// one transaction.
    pub fn archive_lead(&self, id: LeadId) -> Result<ArchivedLead, WorkflowError> {
        let archived = self.store.transaction(|tx| {
            let lead = fetch_lead(tx, id)?;
            let snapshot = tx.insert_archived(NewArchivedLead::from(&lead))?;
            tx.delete_lead(lead.id)?;
            AuditLog::record(
                tx,
                lead.id,
                AuditAction::Archived,
                Some(lead.stage.bucket().as_str()),
                None,
            )?;
            Ok::<_, WorkflowError>(snapshot)
        })?;
        info!(lead_id = %id, archive_id = %archived.id, "lead archived");
        Ok(archived)
    }

    /// Restores each snapshot independently onto the Kanban board. A failing id is logged
    /// and skipped; the rest still restore.
    pub fn restore_leads(&self, ids: &[ArchiveId]) -> Result<usize, WorkflowError> {
        let mut restored = 0;
        for id in unique(ids) {
            match self.store.transaction(|tx| restore_one(tx, id)) {
                Ok(lead) => {
                    info!(archive_id = %id, lead_id = %lead.id, "lead restored");
                    restored += 1;
                }
                Err(err) => warn!(archive_id = %id, error = %err, "restore skipped"),
            }
        }
        Ok(restored)
    }

    pub fn list_archived(&self) -> Result<Vec<ArchivedLead>, WorkflowError> {
        let mut archived = self
            .store
            .transaction(|tx| tx.archived_leads().map_err(WorkflowError::from))?;
        archived.sort_by(|a, b| b.archived_at.cmp(&a.archived_at).then(b.id.cmp(&a.id)));
        Ok(archived)
    }

    /// Permanently removes archive snapshots; unknown ids are skipped.
    pub fn purge_archived(&self, ids: &[ArchiveId]) -> Result<usize, WorkflowError> {
        self.store.transaction(|tx| {
            let mut purged = 0;
            for id in unique(ids) {
                match tx.delete_archived(id) {
                    Ok(()) => purged += 1,
                    Err(StoreError::NotFound { .. }) => continue,
                    Err(other) => return Err(WorkflowError::from(other)),
                }
            }
            Ok(purged)
        })
    }

    /// Records a call outcome reported by the dialing integration. The lead is located
    /// through the phone funnel and forced onto the Kanban board in the reported column.
    pub fn update_status_by_phone(&self, phone: &str, status: &str) -> Result<Lead, WorkflowError> {
        let column = KanbanColumn::parse_field(status, "status")?;

        self.store.transaction(|tx| {
            let found = self
                .phone_funnel
                .locate(tx, phone)?
                .ok_or_else(|| WorkflowError::not_found("lead with phone", phone.trim()))?;
            info!(lead_id = %found.lead.id, stage = found.stage, "phone matched");
            let target = PipelineStage::Kanban(column);
            if found.lead.stage == target {
                return sync_status(tx, found.lead);
            }
            apply_stage(tx, found.lead, target)
        })
    }
}

fn fetch_lead(tx: &mut dyn LeadTransaction, id: LeadId) -> Result<Lead, WorkflowError> {
    tx.lead(id)?
        .ok_or_else(|| WorkflowError::not_found("lead", id))
}

fn promote(tx: &mut dyn LeadTransaction, id: LeadId) -> Result<Lead, WorkflowError> {
    let lead = fetch_lead(tx, id)?;
    let missing = lead.missing_kanban_fields();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing).into());
    }
    apply_stage(tx, lead, PipelineStage::Kanban(KanbanColumn::New))
}

fn restore_one(tx: &mut dyn LeadTransaction, id: ArchiveId) -> Result<Lead, WorkflowError> {
    let snapshot = tx
        .archived(id)?
        .ok_or_else(|| WorkflowError::not_found("archived lead", id))?;
    let lead = tx.insert_lead(snapshot.to_restored_lead())?;
    tx.delete_archived(id)?;
    AuditLog::record(
        tx,
        lead.id,
        AuditAction::Restored,
        None,
        Some(lead.stage.bucket().as_str()),
    )?;
    Ok(lead)
}

/// Writes `target` onto the lead. Unchanged stages are left untouched, so repeating a
/// transition neither rewrites the row nor adds activity entries.
pub(crate) fn apply_stage(
    tx: &mut dyn LeadTransaction,
    mut lead: Lead,
    target: PipelineStage,
) -> Result<Lead, WorkflowError> {
    let before = lead.stage;
    if before == target {
        return Ok(lead);
    }

    lead.stage = target;
    lead.status = target.status_label().to_string();
    lead.updated_at = Utc::now();
    tx.update_lead(&lead)?;
    AuditLog::record_stage_change(tx, lead.id, before, target)?;

    info!(
        lead_id = %lead.id,
        from = before.bucket().as_str(),
        to = target.bucket().as_str(),
        column = target.kanban_column().map(KanbanColumn::as_str),
        "lead stage changed"
    );
    Ok(lead)
}

/// Rewrites a drifted status (for example `sent` after dispatch) back to the label of the
/// lead's current stage and logs it. A status that already matches is left alone.
fn sync_status(tx: &mut dyn LeadTransaction, mut lead: Lead) -> Result<Lead, WorkflowError> {
    let label = lead.stage.status_label();
    if lead.status == label {
        return Ok(lead);
    }

    let previous = std::mem::replace(&mut lead.status, label.to_string());
    lead.updated_at = Utc::now();
    tx.update_lead(&lead)?;
    AuditLog::record(
        tx,
        lead.id,
        AuditAction::StatusChanged,
        Some(&previous),
        Some(label),
    )?;
    info!(lead_id = %lead.id, from = %previous, to = label, "lead status changed");
    Ok(lead)
}

fn unique<T: Copy + Eq + std::hash::Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
