use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tower::ServiceExt;

use super::common::*;

use crate::pipeline::domain::{KanbanColumn, NewLead, PipelineStage};
use crate::pipeline::router::{get_lead_handler, lead_router};
use crate::pipeline::service::LeadPipeline;

fn router_with_store(store: &Arc<crate::pipeline::store::MemoryLeadStore>) -> axum::Router {
    lead_router(Arc::new(pipeline(
        store,
        Arc::new(RecordingDialer::default()),
    )))
}

#[tokio::test]
async fn create_route_returns_view_with_derived_flags() {
    let store = store();
    let router = router_with_store(&store);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/leads",
            json!({"name": "Acme", "employees": 12}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["workflow_bucket"], "ALL");
    assert_eq!(body["is_ready"], false);
    assert_eq!(body["is_in_kanban"], false);
    assert!(body["kanban_column"].is_null());
}

#[tokio::test]
async fn duplicate_create_is_conflict() {
    let store = store();
    insert(&store, NewLead::named("Acme"));

    let response = router_with_store(&store)
        .oneshot(json_request("POST", "/api/v1/leads", json!({"name": "acme"})))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = read_json_body(response).await;
    assert_eq!(body["kind"], "conflict");
}

#[tokio::test]
async fn workflow_route_infers_kanban_from_column() {
    let store = store();
    let lead = insert(&store, NewLead::named("Acme"));

    let response = router_with_store(&store)
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/leads/{}/workflow", lead.id),
            json!({"kanban_column": "ivr"}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["workflow_bucket"], "KANBAN");
    assert_eq!(body["kanban_column"], "ivr");
    assert_eq!(body["is_in_kanban"], true);
    assert_eq!(
        fetch(&store, &lead).stage,
        PipelineStage::Kanban(KanbanColumn::Ivr)
    );
}

#[tokio::test]
async fn workflow_route_maps_error_kinds_to_statuses() {
    let store = store();
    let lead = insert(&store, NewLead::named("Acme"));
    let uri = format!("/api/v1/leads/{}/workflow", lead.id);

    let invalid = router_with_store(&store)
        .oneshot(json_request("POST", &uri, json!({"workflow_bucket": "DONE"})))
        .await
        .expect("router responds");
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    assert_eq!(read_json_body(invalid).await["kind"], "invalid_enum_value");

    let empty = router_with_store(&store)
        .oneshot(json_request("POST", &uri, json!({})))
        .await
        .expect("router responds");
    assert_eq!(empty.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let missing = router_with_store(&store)
        .oneshot(json_request(
            "POST",
            "/api/v1/leads/999/workflow",
            json!({"workflow_bucket": "READY"}),
        ))
        .await
        .expect("router responds");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn promote_route_lists_missing_fields() {
    let store = store();
    let lead = insert(
        &store,
        NewLead {
            contact_phone: None,
            ..complete_lead("Acme", "")
        },
    );

    let response = router_with_store(&store)
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/leads/{}/promote", lead.id),
            json!({}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "Missing required fields: Phone Number");
    assert_eq!(body["kind"], "validation_error");
}

#[tokio::test]
async fn import_route_reports_counts() {
    let store = store();

    let response = router_with_store(&store)
        .oneshot(json_request(
            "POST",
            "/api/v1/leads/import",
            json!({
                "file_name": "leads.csv",
                "csv": "Company Name,City\nAcme,Berlin\nACME,Rome\nGlobex,Paris\n",
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["message"], "Successfully imported 2 companies");
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["total_now"], 2);
}

#[tokio::test]
async fn bulk_ready_route_accepts_bare_id_arrays() {
    let store = store();
    let first = insert(&store, NewLead::named("First"));
    let second = insert(&store, NewLead::named("Second"));

    let response = router_with_store(&store)
        .oneshot(json_request(
            "POST",
            "/api/v1/leads/bulk-ready",
            json!([first.id, second.id]),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["count"], 2);

    let listed = router_with_store(&store)
        .oneshot(get_request("/api/v1/leads?bucket=ready"))
        .await
        .expect("router responds");
    let body = read_json_body(listed).await;
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(body[0]["is_ready"], true);
}

#[tokio::test]
async fn archive_and_restore_round_trip_over_http() {
    let store = store();
    let lead = insert(&store, complete_lead("Acme", "+15550000001"));
    let router = router_with_store(&store);

    let archived = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/leads/{}/archive", lead.id),
            json!({}),
        ))
        .await
        .expect("router responds");
    assert_eq!(archived.status(), StatusCode::OK);
    let snapshot = read_json_body(archived).await;

    let restored = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/archive/restore",
            json!([snapshot["id"]]),
        ))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(restored).await["count"], 1);

    let archive = router
        .oneshot(get_request("/api/v1/archive"))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(archive).await, json!([]));
}

#[tokio::test]
async fn call_status_route_updates_by_phone() {
    let store = store();
    let lead = insert(&store, complete_lead("Acme", "16195551234"));

    let response = router_with_store(&store)
        .oneshot(json_request(
            "POST",
            "/api/v1/integrations/call-status",
            json!({"phone_number": "6195551234", "status": "voicemail"}),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["id"], lead.id.0);
    assert_eq!(body["kanban_column"], "voicemail");
    assert_eq!(body["status"], "voicemail");
}

#[tokio::test]
async fn queue_routes_generate_and_dispatch() {
    let store = store();
    let lead = insert(&store, kanban_lead("Acme", "+15550000001"));
    let router = router_with_store(&store);

    let generated = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/queue/generate", json!({})))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(generated).await["scheduled"], 1);

    let dispatched = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/queue/dispatch",
            json!([lead.id]),
        ))
        .await
        .expect("router responds");
    assert_eq!(dispatched.status(), StatusCode::OK);
    let body = read_json_body(dispatched).await;
    assert_eq!(body["sent_count"], 1);
    assert_eq!(body["upstream_file_id"], "batch-1");

    let queue = router
        .oneshot(get_request("/api/v1/queue"))
        .await
        .expect("router responds");
    let body = read_json_body(queue).await;
    assert_eq!(body[0]["status"], "sent");
}

#[tokio::test]
async fn dispatch_route_maps_upstream_failure_to_bad_gateway() {
    let store = store();
    let lead = insert(&store, kanban_lead("Acme", "+15550000001"));
    let pipeline = Arc::new(pipeline(&store, Arc::new(FailingDialer)));
    pipeline
        .scheduler()
        .generate_queue()
        .expect("queue generated");

    let response = lead_router(pipeline)
        .oneshot(json_request(
            "POST",
            "/api/v1/queue/dispatch",
            json!([lead.id]),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(read_json_body(response).await["kind"], "upstream_error");
}

#[tokio::test]
async fn column_mapping_routes_round_trip() {
    let store = store();
    let router = router_with_store(&store);

    let saved = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/column-mappings",
            json!({"csv_header": "Firma", "db_field": "name"}),
        ))
        .await
        .expect("router responds");
    assert_eq!(saved.status(), StatusCode::OK);

    let listed = router
        .oneshot(get_request("/api/v1/column-mappings"))
        .await
        .expect("router responds");
    let body = read_json_body(listed).await;
    let rows = body.as_array().expect("mapping list");
    assert!(rows
        .iter()
        .any(|row| row["csv_header"] == "Firma" && row["db_field"] == "name"));
}

#[tokio::test]
async fn store_outage_hides_detail_from_clients() {
    let pipeline = Arc::new(LeadPipeline::new(
        Arc::new(UnavailableStore),
        Arc::new(RecordingDialer::default()),
        settings(),
    ));

    let response = get_lead_handler(State(pipeline), Path(1))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json_body(response).await;
    assert_eq!(body["error"], "internal error");
    assert_eq!(body["kind"], "internal_error");
}
