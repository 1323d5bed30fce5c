use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::common::*;

use crate::pipeline::audit::AuditAction;
use crate::pipeline::domain::{KanbanColumn, LeadId, NewLead, PipelineStage};
use crate::pipeline::error::{ValidationError, WorkflowError};
use crate::pipeline::scheduler::CallQueueScheduler;

fn morning() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 17, 0)
        .single()
        .expect("valid timestamp")
}

fn ten_oclock() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Inserts nine leads and moves the given ids onto the Kanban board.
fn board_with(store: &Arc<crate::pipeline::store::MemoryLeadStore>, kanban_ids: &[u64]) {
    for n in 1..=9 {
        let lead = if kanban_ids.contains(&n) {
            kanban_lead(&format!("Lead {n}"), &format!("+1555000000{n}"))
        } else {
            NewLead::named(format!("Lead {n}"))
        };
        insert(store, lead);
    }
}

#[test]
fn slots_follow_ascending_id_order() {
    let store = store();
    board_with(&store, &[5, 2, 9]);
    let scheduler = CallQueueScheduler::new(
        Arc::clone(&store),
        Arc::new(RecordingDialer::default()),
        settings(),
    );

    let scheduled = scheduler.generate_queue_at(morning()).expect("queue");

    assert_eq!(scheduled, 3);
    let queue = scheduler.list_queue().expect("queue view");
    let slots: Vec<(LeadId, DateTime<Utc>)> = queue
        .iter()
        .map(|lead| (lead.id, lead.scheduled_at.expect("slot assigned")))
        .collect();
    assert_eq!(
        slots,
        vec![
            (LeadId(2), ten_oclock()),
            (LeadId(5), ten_oclock() + Duration::minutes(30)),
            (LeadId(9), ten_oclock() + Duration::minutes(60)),
        ]
    );
}

#[test]
fn already_scheduled_leads_keep_their_slot() {
    let store = store();
    board_with(&store, &[1]);
    let scheduler = CallQueueScheduler::new(
        Arc::clone(&store),
        Arc::new(RecordingDialer::default()),
        settings(),
    );
    scheduler.generate_queue_at(morning()).expect("first run");

    let rerun = scheduler
        .generate_queue_at(morning() + Duration::hours(3))
        .expect("second run");

    assert_eq!(rerun, 0);
    let queue = scheduler.list_queue().expect("queue view");
    assert_eq!(queue[0].scheduled_at, Some(ten_oclock()));
}

#[test]
fn leads_outside_kanban_are_never_scheduled() {
    let store = store();
    board_with(&store, &[]);
    let scheduler = CallQueueScheduler::new(
        Arc::clone(&store),
        Arc::new(RecordingDialer::default()),
        settings(),
    );

    assert_eq!(scheduler.generate_queue_at(morning()).expect("queue"), 0);
    assert!(all_leads(&store)
        .iter()
        .all(|lead| lead.scheduled_at.is_none()));
}

#[tokio::test]
async fn dispatch_sends_scheduled_leads_and_marks_them_sent() {
    let store = store();
    board_with(&store, &[3, 4]);
    let dialer = Arc::new(RecordingDialer::default());
    let scheduler = CallQueueScheduler::new(Arc::clone(&store), Arc::clone(&dialer), settings());
    scheduler.generate_queue_at(morning()).expect("queue");

    let summary = scheduler
        .dispatch(&[LeadId(4), LeadId(1), LeadId(3), LeadId(4)])
        .await
        .expect("dispatch succeeds");

    assert_eq!(summary.sent_count, 2);
    assert_eq!(summary.upstream_file_id.as_deref(), Some("batch-1"));
    assert_eq!(summary.upstream_inserted, 2);

    let payloads = dialer.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].agent_id, "agent-test");
    assert_eq!(payloads[0].elevenlabs_phone_id, "phone-test");
    let companies: Vec<&str> = payloads[0]
        .items
        .iter()
        .map(|item| item.company_name.as_str())
        .collect();
    assert_eq!(companies, vec!["Lead 3", "Lead 4"]);

    let queue = scheduler.list_queue().expect("queue view");
    assert_eq!(queue.len(), 2);
    assert!(queue.iter().all(|lead| lead.status == "sent"));
    assert!(queue
        .iter()
        .all(|lead| matches!(lead.stage, PipelineStage::Kanban(_))));

    let history = engine(&store).activity_for(LeadId(3)).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, AuditAction::SentToDialer);
    assert_eq!(history[0].old_value.as_deref(), Some("new"));
    assert_eq!(history[0].new_value.as_deref(), Some("sent"));
}

#[tokio::test]
async fn outcome_for_current_column_after_dispatch_is_recorded() {
    let store = store();
    board_with(&store, &[3]);
    let dialer = Arc::new(RecordingDialer::default());
    let scheduler = CallQueueScheduler::new(Arc::clone(&store), Arc::clone(&dialer), settings());
    scheduler.generate_queue_at(morning()).expect("queue");
    scheduler
        .dispatch(&[LeadId(3)])
        .await
        .expect("dispatch succeeds");

    let engine = engine(&store);
    let updated = engine
        .update_status_by_phone("+15550000003", "new")
        .expect("status update");

    assert_eq!(updated.stage, PipelineStage::Kanban(KanbanColumn::New));
    assert_eq!(updated.status, "new");
    let history = engine.activity_for(LeadId(3)).expect("history");
    let actions: Vec<AuditAction> = history.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::SentToDialer, AuditAction::StatusChanged]
    );
    assert_eq!(history[1].old_value.as_deref(), Some("sent"));
    assert_eq!(history[1].new_value.as_deref(), Some("new"));

    engine
        .update_status_by_phone("+15550000003", "new")
        .expect("repeat report");
    assert_eq!(engine.activity_for(LeadId(3)).expect("history").len(), 2);
}

#[tokio::test]
async fn dispatch_without_scheduled_leads_is_rejected() {
    let store = store();
    board_with(&store, &[2]);
    let dialer = Arc::new(RecordingDialer::default());
    let scheduler = CallQueueScheduler::new(Arc::clone(&store), Arc::clone(&dialer), settings());

    match scheduler.dispatch(&[LeadId(1), LeadId(2)]).await {
        Err(WorkflowError::Validation(ValidationError::Invalid(_))) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(dialer.payloads().is_empty());
}

#[tokio::test]
async fn upstream_failure_leaves_leads_untouched() {
    let store = store();
    board_with(&store, &[1]);
    let scheduler =
        CallQueueScheduler::new(Arc::clone(&store), Arc::new(FailingDialer), settings());
    scheduler.generate_queue_at(morning()).expect("queue");

    match scheduler.dispatch(&[LeadId(1)]).await {
        Err(WorkflowError::Upstream(_)) => {}
        other => panic!("expected upstream error, got {other:?}"),
    }
    let queue = scheduler.list_queue().expect("queue view");
    assert_eq!(queue[0].status, "new");
    assert!(engine(&store)
        .activity_for(LeadId(1))
        .expect("history")
        .is_empty());
}
