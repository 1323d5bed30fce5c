//! Lead lifecycle pipeline: CSV intake, readiness triage, the Kanban call board, the
//! archive and hand-off of scheduled calls to the external calling service.
//!
//! Every state change runs inside one [`LeadStore`] transaction and is mirrored into the
//! append-only activity log.

pub mod audit;
pub mod dialer;
pub mod domain;
pub mod engine;
pub mod error;
pub mod import;
pub mod phone;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use audit::{ActivityEntry, AuditAction, AuditLog};
pub use dialer::{
    DialerError, DialerGateway, DialerReceipt, DispatchItem, DispatchPayload, HttpDialerClient,
};
pub use domain::{
    ArchiveId, ArchivedLead, ColumnMapping, KanbanColumn, Lead, LeadDetailsPatch, LeadDraft,
    LeadField, LeadId, LeadView, NewLead, PipelineStage, WorkflowBucket,
};
pub use engine::WorkflowEngine;
pub use error::{ValidationError, WorkflowError};
pub use import::{HeaderResolver, ImportRow, ImportSummary, LeadImporter};
pub use phone::{FunnelMatch, PhoneFunnel, PhoneMatcher, PhoneQuery};
pub use router::lead_router;
pub use scheduler::{next_full_hour, CallQueueScheduler, DispatchSettings, DispatchSummary};
pub use service::LeadPipeline;
pub use store::{LeadStore, LeadTransaction, MemoryLeadStore, StoreError};
