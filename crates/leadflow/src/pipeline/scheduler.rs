//! Call-slot assignment and batch hand-off to the calling service.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::Serialize;
use tracing::{error, info};

use super::audit::{AuditAction, AuditLog};
use super::dialer::{DialerGateway, DispatchItem, DispatchPayload};
use super::domain::{Lead, LeadId, SENT_STATUS};
use super::error::{ValidationError, WorkflowError};
use super::store::LeadStore;

pub const SLOT_SPACING_MINUTES: i64 = 30;

/// Identity forwarded with every dispatched batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchSettings {
    pub agent_id: String,
    pub phone_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub sent_count: usize,
    pub upstream_file_id: Option<String>,
    pub upstream_inserted: u64,
    pub upstream_skipped: u64,
}

/// Start of the hour after `now`. A time exactly on the hour still moves to the next one.
pub fn next_full_hour(now: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
    truncated + Duration::hours(1)
}

pub struct CallQueueScheduler<S, D> {
    store: Arc<S>,
    dialer: Arc<D>,
    settings: DispatchSettings,
}

impl<S, D> CallQueueScheduler<S, D>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    pub fn new(store: Arc<S>, dialer: Arc<D>, settings: DispatchSettings) -> Self {
        Self {
            store,
            dialer,
            settings,
        }
    }

    pub fn generate_queue(&self) -> Result<usize, WorkflowError> {
        self.generate_queue_at(Utc::now())
    }

    /// Gives every unscheduled Kanban lead a slot, 30 minutes apart in ascending id order,
    /// starting at the next full hour after `now`.
    ///
    /// Two concurrent calls can both see the same unscheduled rows; the later commit wins.
    pub fn generate_queue_at(&self, now: DateTime<Utc>) -> Result<usize, WorkflowError> {
        let base = next_full_hour(now);

        let scheduled = self.store.transaction(|tx| {
            let pending: Vec<Lead> = tx
                .leads()?
                .into_iter()
                .filter(|lead| lead.stage.is_in_kanban() && lead.scheduled_at.is_none())
                .collect();

            for (slot, mut lead) in (0_i64..).zip(pending.iter().cloned()) {
                lead.scheduled_at = Some(base + Duration::minutes(SLOT_SPACING_MINUTES * slot));
                lead.updated_at = now;
                tx.update_lead(&lead)?;
            }
            Ok::<_, WorkflowError>(pending.len())
        })?;

        if scheduled > 0 {
            info!(scheduled, first_slot = %base, "call queue generated");
        }
        Ok(scheduled)
    }

    /// Kanban leads holding a slot, earliest first.
    pub fn list_queue(&self) -> Result<Vec<Lead>, WorkflowError> {
        let mut queue: Vec<Lead> = self.store.transaction(|tx| {
            Ok::<_, WorkflowError>(
                tx.leads()?
                    .into_iter()
                    .filter(|lead| lead.stage.is_in_kanban() && lead.scheduled_at.is_some())
                    .collect(),
            )
        })?;
        queue.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));
        Ok(queue)
    }

    /// Sends the scheduled Kanban leads among `ids` to the calling service, then marks
    /// them sent. Nothing is written when the calling service fails.
    pub async fn dispatch(&self, ids: &[LeadId]) -> Result<DispatchSummary, WorkflowError> {
        let mut seen = HashSet::with_capacity(ids.len());
        let requested: Vec<LeadId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let mut batch: Vec<Lead> = self.store.transaction(|tx| {
            let mut batch = Vec::with_capacity(requested.len());
            for id in &requested {
                if let Some(lead) = tx.lead(*id)? {
                    if lead.stage.is_in_kanban() && lead.scheduled_at.is_some() {
                        batch.push(lead);
                    }
                }
            }
            Ok::<_, WorkflowError>(batch)
        })?;

        if batch.is_empty() {
            return Err(ValidationError::Invalid(
                "No scheduled Kanban leads selected for dispatch".to_string(),
            )
            .into());
        }
        batch.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at).then(a.id.cmp(&b.id)));

        let payload = DispatchPayload::new(
            Utc::now(),
            &self.settings.agent_id,
            &self.settings.phone_id,
            batch.iter().map(DispatchItem::from).collect(),
        );
        let receipt = self.dialer.submit(&payload).await.map_err(|err| {
            error!(error = %err, leads = batch.len(), "call queue dispatch failed");
            WorkflowError::from(err)
        })?;

        let sent_ids: Vec<LeadId> = batch.iter().map(|lead| lead.id).collect();
        let sent_count = self.store.transaction(|tx| {
            let mut sent = 0;
            for id in &sent_ids {
                let Some(mut lead) = tx.lead(*id)? else {
                    continue;
                };
                let previous = std::mem::replace(&mut lead.status, SENT_STATUS.to_string());
                lead.updated_at = Utc::now();
                tx.update_lead(&lead)?;
                AuditLog::record(
                    tx,
                    lead.id,
                    AuditAction::SentToDialer,
                    Some(previous.as_str()),
                    Some(SENT_STATUS),
                )?;
                sent += 1;
            }
            Ok::<_, WorkflowError>(sent)
        })?;

        info!(
            sent_count,
            file_id = receipt.file_id.as_deref().unwrap_or_default(),
            "call queue dispatched"
        );
        Ok(DispatchSummary {
            sent_count,
            upstream_file_id: receipt.file_id,
            upstream_inserted: receipt.inserted,
            upstream_skipped: receipt.skipped,
        })
    }
}
