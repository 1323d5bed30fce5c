use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use serde_json::Value;

use crate::pipeline::dialer::{DialerError, DialerGateway, DialerReceipt, DispatchPayload};
use crate::pipeline::domain::{KanbanColumn, Lead, NewLead, PipelineStage};
use crate::pipeline::engine::WorkflowEngine;
use crate::pipeline::import::LeadImporter;
use crate::pipeline::scheduler::DispatchSettings;
use crate::pipeline::service::LeadPipeline;
use crate::pipeline::store::{LeadStore, LeadTransaction, MemoryLeadStore, StoreError};

pub(super) fn store() -> Arc<MemoryLeadStore> {
    Arc::new(MemoryLeadStore::new())
}

pub(super) fn engine(store: &Arc<MemoryLeadStore>) -> WorkflowEngine<MemoryLeadStore> {
    WorkflowEngine::new(Arc::clone(store))
}

pub(super) fn importer(store: &Arc<MemoryLeadStore>) -> LeadImporter<MemoryLeadStore> {
    let importer = LeadImporter::new(Arc::clone(store));
    importer.seed_default_mappings().expect("seed mappings");
    importer
}

pub(super) fn settings() -> DispatchSettings {
    DispatchSettings {
        agent_id: "agent-test".to_string(),
        phone_id: "phone-test".to_string(),
    }
}

pub(super) fn pipeline<D>(
    store: &Arc<MemoryLeadStore>,
    dialer: Arc<D>,
) -> LeadPipeline<MemoryLeadStore, D>
where
    D: DialerGateway + 'static,
{
    let pipeline = LeadPipeline::new(Arc::clone(store), dialer, settings());
    pipeline
        .importer()
        .seed_default_mappings()
        .expect("seed mappings");
    pipeline
}

/// Lead carrying every field the Kanban board requires.
pub(super) fn complete_lead(name: &str, phone: &str) -> NewLead {
    NewLead {
        location: Some("Berlin".to_string()),
        contact_name: Some("Ada".to_string()),
        contact_surname: Some("Lovelace".to_string()),
        contact_phone: Some(phone.to_string()),
        ..NewLead::named(name)
    }
}

pub(super) fn kanban_lead(name: &str, phone: &str) -> NewLead {
    let stage = PipelineStage::Kanban(KanbanColumn::New);
    NewLead {
        stage,
        status: stage.status_label().to_string(),
        ..complete_lead(name, phone)
    }
}

pub(super) fn insert(store: &Arc<MemoryLeadStore>, lead: NewLead) -> Lead {
    store
        .transaction(|tx| tx.insert_lead(lead))
        .expect("insert lead")
}

pub(super) fn fetch(store: &Arc<MemoryLeadStore>, lead: &Lead) -> Lead {
    store
        .transaction(|tx| tx.lead(lead.id))
        .expect("read lead")
        .expect("lead still present")
}

pub(super) fn all_leads(store: &Arc<MemoryLeadStore>) -> Vec<Lead> {
    store.transaction(|tx| tx.leads()).expect("read leads")
}

/// Asserts the stage projections agree for every stored lead.
pub(super) fn assert_stage_invariant(store: &Arc<MemoryLeadStore>) {
    for lead in all_leads(store) {
        let view = lead.view();
        assert_eq!(view.is_ready, view.workflow_bucket.as_str() == "READY");
        assert_eq!(view.is_in_kanban, view.workflow_bucket.as_str() == "KANBAN");
        assert_eq!(view.kanban_column.is_some(), view.is_in_kanban);
    }
}

#[derive(Default)]
pub(super) struct RecordingDialer {
    payloads: Mutex<Vec<DispatchPayload>>,
}

impl RecordingDialer {
    pub(super) fn payloads(&self) -> Vec<DispatchPayload> {
        self.payloads.lock().expect("dialer mutex poisoned").clone()
    }
}

#[async_trait]
impl DialerGateway for RecordingDialer {
    async fn submit(&self, payload: &DispatchPayload) -> Result<DialerReceipt, DialerError> {
        self.payloads
            .lock()
            .expect("dialer mutex poisoned")
            .push(payload.clone());
        Ok(DialerReceipt {
            file_id: Some("batch-1".to_string()),
            inserted: payload.items.len() as u64,
            skipped: 0,
        })
    }
}

pub(super) struct FailingDialer;

#[async_trait]
impl DialerGateway for FailingDialer {
    async fn submit(&self, _payload: &DispatchPayload) -> Result<DialerReceipt, DialerError> {
        Err(DialerError::Status {
            status: 503,
            body: "dialer offline".to_string(),
        })
    }
}

pub(super) struct UnavailableStore;

impl LeadStore for UnavailableStore {
    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        E: From<StoreError>,
        F: FnOnce(&mut dyn LeadTransaction) -> Result<T, E>,
    {
        Err(StoreError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub(super) fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
