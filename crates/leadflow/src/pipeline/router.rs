use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::dialer::DialerGateway;
use super::domain::{ArchiveId, Lead, LeadDetailsPatch, LeadDraft, LeadId, WorkflowBucket};
use super::error::{ValidationError, WorkflowError};
use super::service::LeadPipeline;
use super::store::LeadStore;

/// Router builder exposing the lead pipeline over HTTP.
pub fn lead_router<S, D>(pipeline: Arc<LeadPipeline<S, D>>) -> Router
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    Router::new()
        .route(
            "/api/v1/leads",
            get(list_leads_handler::<S, D>).post(create_lead_handler::<S, D>),
        )
        .route("/api/v1/leads/import", post(import_handler::<S, D>))
        .route(
            "/api/v1/leads/bulk-promote",
            post(bulk_promote_handler::<S, D>),
        )
        .route("/api/v1/leads/bulk-ready", post(bulk_ready_handler::<S, D>))
        .route("/api/v1/leads/bulk-delete", post(bulk_delete_handler::<S, D>))
        .route(
            "/api/v1/leads/:lead_id",
            get(get_lead_handler::<S, D>).patch(update_lead_handler::<S, D>),
        )
        .route(
            "/api/v1/leads/:lead_id/activity",
            get(activity_handler::<S, D>),
        )
        .route(
            "/api/v1/leads/:lead_id/workflow",
            post(transition_handler::<S, D>),
        )
        .route(
            "/api/v1/leads/:lead_id/promote",
            post(promote_handler::<S, D>),
        )
        .route(
            "/api/v1/leads/:lead_id/archive",
            post(archive_handler::<S, D>),
        )
        .route(
            "/api/v1/column-mappings",
            get(list_mappings_handler::<S, D>).post(put_mapping_handler::<S, D>),
        )
        .route("/api/v1/archive", get(list_archived_handler::<S, D>))
        .route("/api/v1/archive/restore", post(restore_handler::<S, D>))
        .route("/api/v1/archive/purge", post(purge_handler::<S, D>))
        .route("/api/v1/queue", get(queue_handler::<S, D>))
        .route("/api/v1/queue/generate", post(generate_queue_handler::<S, D>))
        .route("/api/v1/queue/dispatch", post(dispatch_handler::<S, D>))
        .route(
            "/api/v1/integrations/call-status",
            post(call_status_handler::<S, D>),
        )
        .with_state(pipeline)
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkflowError::NotFound { .. } => StatusCode::NOT_FOUND,
            WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::InvalidEnumValue { .. } => StatusCode::BAD_REQUEST,
            WorkflowError::Conflict(_) => StatusCode::CONFLICT,
            WorkflowError::Upstream(_) => StatusCode::BAD_GATEWAY,
            WorkflowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &self {
            WorkflowError::Internal(detail) => {
                error!(detail = %detail, "lead pipeline failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let payload = json!({
            "error": message,
            "kind": self.kind(),
        });
        (status, Json(payload)).into_response()
    }
}

type Pipeline<S, D> = State<Arc<LeadPipeline<S, D>>>;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    bucket: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WorkflowUpdate {
    workflow_bucket: Option<String>,
    kanban_column: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportRequest {
    csv: String,
    #[serde(default)]
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MappingRequest {
    csv_header: String,
    db_field: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallStatusUpdate {
    phone_number: String,
    status: String,
}

fn lead_views(leads: Vec<Lead>) -> Response {
    let views: Vec<_> = leads.iter().map(Lead::view).collect();
    (StatusCode::OK, Json(views)).into_response()
}

pub(crate) async fn list_leads_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Query(query): Query<ListQuery>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let bucket = query
        .bucket
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(str::parse::<WorkflowBucket>)
        .transpose()?;
    let leads = pipeline.engine().list_leads(bucket)?;
    Ok(lead_views(leads))
}

pub(crate) async fn create_lead_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(draft): Json<LeadDraft>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let lead = pipeline.engine().create_lead(draft)?;
    Ok((StatusCode::CREATED, Json(lead.view())).into_response())
}

pub(crate) async fn get_lead_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Path(lead_id): Path<u64>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let lead = pipeline.engine().get_lead(LeadId(lead_id))?;
    Ok((StatusCode::OK, Json(lead.view())).into_response())
}

pub(crate) async fn update_lead_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Path(lead_id): Path<u64>,
    Json(patch): Json<LeadDetailsPatch>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let lead = pipeline
        .engine()
        .update_lead_details(LeadId(lead_id), patch)?;
    Ok((StatusCode::OK, Json(lead.view())).into_response())
}

pub(crate) async fn activity_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Path(lead_id): Path<u64>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let entries = pipeline.engine().activity_for(LeadId(lead_id))?;
    Ok((StatusCode::OK, Json(entries)).into_response())
}

/// A column without a bucket implies `KANBAN`; at least one of the two must be given.
pub(crate) async fn transition_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Path(lead_id): Path<u64>,
    Json(update): Json<WorkflowUpdate>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let bucket = match (&update.workflow_bucket, &update.kanban_column) {
        (Some(bucket), _) => bucket.clone(),
        (None, Some(_)) => WorkflowBucket::Kanban.as_str().to_string(),
        (None, None) => {
            return Err(ValidationError::Invalid(
                "workflow_bucket or kanban_column is required".to_string(),
            )
            .into())
        }
    };
    let lead = pipeline.engine().transition(
        LeadId(lead_id),
        &bucket,
        update.kanban_column.as_deref(),
    )?;
    Ok((StatusCode::OK, Json(lead.view())).into_response())
}

pub(crate) async fn promote_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Path(lead_id): Path<u64>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let lead = pipeline.engine().promote_to_kanban(LeadId(lead_id))?;
    Ok((StatusCode::OK, Json(lead.view())).into_response())
}

pub(crate) async fn archive_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Path(lead_id): Path<u64>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let archived = pipeline.engine().archive_lead(LeadId(lead_id))?;
    Ok((StatusCode::OK, Json(archived)).into_response())
}

pub(crate) async fn bulk_promote_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(ids): Json<Vec<LeadId>>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let promoted = pipeline.engine().bulk_promote_to_kanban(&ids)?;
    let payload = json!({
        "message": format!("Moved {} companies to Kanban", promoted.len()),
        "count": promoted.len(),
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn bulk_ready_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(ids): Json<Vec<LeadId>>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let moved = pipeline.engine().bulk_mark_ready(&ids)?;
    let payload = json!({
        "message": format!("Marked {moved} companies as ready"),
        "count": moved,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn bulk_delete_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(ids): Json<Vec<LeadId>>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let deleted = pipeline.engine().bulk_delete(&ids)?;
    let payload = json!({
        "message": format!("Deleted {deleted} companies"),
        "count": deleted,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn import_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(request): Json<ImportRequest>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let summary = pipeline
        .importer()
        .ingest_upload(request.file_name.as_deref(), &request.csv)?;
    let payload = json!({
        "message": format!("Successfully imported {} companies", summary.inserted),
        "inserted": summary.inserted,
        "skipped": summary.skipped,
        "total_in_input": summary.total_in_input,
        "total_now": summary.total_now,
    });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn list_mappings_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let mappings = pipeline.importer().column_mappings()?;
    Ok((StatusCode::OK, Json(mappings)).into_response())
}

pub(crate) async fn put_mapping_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(request): Json<MappingRequest>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let mapping = pipeline
        .importer()
        .put_column_mapping(&request.csv_header, &request.db_field)?;
    Ok((StatusCode::OK, Json(mapping)).into_response())
}

pub(crate) async fn list_archived_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let archived = pipeline.engine().list_archived()?;
    Ok((StatusCode::OK, Json(archived)).into_response())
}

pub(crate) async fn restore_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(ids): Json<Vec<ArchiveId>>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let restored = pipeline.engine().restore_leads(&ids)?;
    let payload = json!({
        "message": format!("Restored {restored} companies"),
        "count": restored,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn purge_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(ids): Json<Vec<ArchiveId>>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let purged = pipeline.engine().purge_archived(&ids)?;
    let payload = json!({
        "message": format!("Deleted {purged} archived companies"),
        "count": purged,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn queue_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let queue = pipeline.scheduler().list_queue()?;
    Ok(lead_views(queue))
}

pub(crate) async fn generate_queue_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let scheduled = pipeline.scheduler().generate_queue()?;
    let payload = json!({
        "message": format!("Scheduled {scheduled} calls"),
        "scheduled": scheduled,
    });
    Ok((StatusCode::OK, Json(payload)).into_response())
}

pub(crate) async fn dispatch_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(ids): Json<Vec<LeadId>>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let summary = pipeline.scheduler().dispatch(&ids).await?;
    Ok((StatusCode::OK, Json(summary)).into_response())
}

/// Unauthenticated callback used by the calling integration to report call outcomes.
pub(crate) async fn call_status_handler<S, D>(
    State(pipeline): Pipeline<S, D>,
    Json(update): Json<CallStatusUpdate>,
) -> Result<Response, WorkflowError>
where
    S: LeadStore + 'static,
    D: DialerGateway + 'static,
{
    let lead = pipeline
        .engine()
        .update_status_by_phone(&update.phone_number, &update.status)?;
    Ok((StatusCode::OK, Json(lead.view())).into_response())
}
