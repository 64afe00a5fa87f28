//! End-to-end flows over the in-memory store: every lifecycle driven
//! through the service, committed, re-read and notified.

use siteflow_notify::{DirectoryEntry, InMemoryDirectory, RecordingMailer};
use siteflow_service::{
    entity_path, history_path, stock_path, ServiceError, WorkflowService,
};
use siteflow_store::{EntityStore, InMemoryStore, StorePath};
use siteflow_types::{
    Actor, ActorId, Capability, RequestEntity, RequestItem, RequestKind, RequestStatus,
    ResolveDisposition, SubtaskStatus, TaskEntity, TaskStatus, TimesheetEntity, TimesheetStatus,
    WorkflowEntity,
};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("siteflow=debug")
        .try_init();
}

fn requester() -> Actor {
    Actor::new(ActorId::new("requester"), "Requester")
}

fn approver() -> Actor {
    Actor::new(ActorId::new("approver"), "Approver").with_capability(Capability::Approve)
}

fn issuer() -> Actor {
    Actor::new(ActorId::new("storekeeper"), "Storekeeper").with_capability(Capability::Issue)
}

fn admin() -> Actor {
    Actor::new(ActorId::new("admin"), "Admin").with_capability(Capability::Administer)
}

fn make_service() -> WorkflowService<InMemoryStore> {
    init_tracing();
    WorkflowService::new(Arc::new(InMemoryStore::new()))
}

async fn seed_ppe_request(
    service: &WorkflowService<InMemoryStore>,
    stock: u64,
) -> (StorePath, WorkflowEntity) {
    service
        .store()
        .write(&stock_path("HELMET"), serde_json::json!(stock))
        .await
        .unwrap();

    let entity = WorkflowEntity::Request(
        RequestEntity::new(RequestKind::Ppe, requester().id)
            .with_item(RequestItem::new("HELMET", "Safety helmet", 2)),
    );
    let entity = service.create(entity).await.unwrap();
    (entity_path(&entity), entity)
}

async fn read_stock(service: &WorkflowService<InMemoryStore>, code: &str) -> u64 {
    service
        .store()
        .read(&stock_path(code))
        .await
        .unwrap()
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

async fn history_len(service: &WorkflowService<InMemoryStore>, employee: &ActorId) -> usize {
    service
        .store()
        .read(&history_path(employee))
        .await
        .unwrap()
        .and_then(|v| v.as_object().map(|o| o.len()))
        .unwrap_or(0)
}

#[tokio::test]
async fn ppe_request_full_lifecycle() {
    let service = make_service();
    let (path, _) = seed_ppe_request(&service, 10).await;
    let requester = requester();

    // approve with no comment: status moves, log untouched, the
    // requester's viewed flag resets
    let entity = service.approve(&path, &approver(), None).await.unwrap();
    let WorkflowEntity::Request(request) = &entity else {
        panic!("expected a request");
    };
    assert_eq!(request.status, RequestStatus::Approved);
    assert!(request.log.is_empty());
    assert!(!request.log.viewed(&requester.id));

    // issue: stock decremented, history appended, and the store agrees
    // with what the call returned
    let entity = service.issue(&path, &issuer()).await.unwrap();
    let WorkflowEntity::Request(request) = &entity else {
        panic!("expected a request");
    };
    assert_eq!(request.status, RequestStatus::Issued);
    assert_eq!(read_stock(&service, "HELMET").await, 8);
    assert_eq!(history_len(&service, &requester.id).await, 1);
    assert_eq!(service.load(&path).await.unwrap(), entity);

    // dispute then reissue: back to Issued with a SECOND history record
    service
        .dispute(&path, &requester, "item missing")
        .await
        .unwrap();
    let entity = service
        .resolve(
            &path,
            &issuer(),
            ResolveDisposition::Reissue,
            "confirmed missing",
        )
        .await
        .unwrap();
    assert_eq!(entity.status_label(), "Issued");
    assert_eq!(history_len(&service, &requester.id).await, 2);
    assert_eq!(read_stock(&service, "HELMET").await, 6);
}

#[tokio::test]
async fn stock_decrement_clamps_at_zero() {
    let service = make_service();
    let (path, _) = seed_ppe_request(&service, 1).await;

    service.approve(&path, &approver(), None).await.unwrap();
    service.issue(&path, &issuer()).await.unwrap();
    assert_eq!(read_stock(&service, "HELMET").await, 0);
}

#[tokio::test]
async fn reject_without_comment_changes_nothing() {
    let service = make_service();
    let (path, created) = seed_ppe_request(&service, 10).await;

    let action = siteflow_types::Action::new(
        siteflow_types::ActionKind::Reject,
        approver().id,
    );
    let err = service.execute(&path, &action, &approver()).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(siteflow_types::EngineError::CommentRequired(_))
    ));
    assert_eq!(service.load(&path).await.unwrap(), created);
}

#[tokio::test]
async fn unauthorized_actor_changes_nothing() {
    let service = make_service();
    let (path, created) = seed_ppe_request(&service, 10).await;

    let err = service
        .approve(&path, &requester(), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(siteflow_types::EngineError::Unauthorized { .. })
    ));
    assert_eq!(service.load(&path).await.unwrap(), created);
}

#[tokio::test]
async fn mark_viewed_is_idempotent_and_skips_the_write() {
    let service = make_service();
    let (path, _) = seed_ppe_request(&service, 10).await;
    let requester = requester();

    let mut watcher = service.watch(&path);

    let first = service.mark_viewed(&path, &requester).await.unwrap();
    assert!(first.log().viewed(&requester.id));
    let second = service.mark_viewed(&path, &requester).await.unwrap();
    assert_eq!(second, first);

    // exactly one write reached the store
    assert!(watcher.try_recv().is_ok());
    assert!(watcher.try_recv().is_err());
}

#[tokio::test]
async fn comments_accumulate_and_reset_peer_flags() {
    let service = make_service();
    let (path, _) = seed_ppe_request(&service, 10).await;
    let requester = requester();
    let approver = approver();

    service.approve(&path, &approver, None).await.unwrap();
    service.mark_viewed(&path, &requester).await.unwrap();

    let entity = service
        .comment(&path, &approver, "collect from store 3")
        .await
        .unwrap();
    assert_eq!(entity.log().len(), 1);
    assert!(!entity.log().viewed(&requester.id));

    let entity = service
        .comment(&path, &requester, "will do")
        .await
        .unwrap();
    assert_eq!(entity.log().len(), 2);
    assert!(!entity.log().viewed(&approver.id));
}

#[tokio::test]
async fn task_flow_premature_submit_then_full_approval() {
    let service = make_service();
    let creator = Actor::new(ActorId::new("creator"), "Creator");
    let alice = Actor::new(ActorId::new("alice"), "Alice");
    let bob = Actor::new(ActorId::new("bob"), "Bob");

    let entity = WorkflowEntity::Task(
        TaskEntity::new("Install scaffolding", creator.id.clone())
            .with_assignee(alice.id.clone())
            .with_assignee(bob.id.clone()),
    );
    let entity = service.create(entity).await.unwrap();
    let path = entity_path(&entity);

    // Alice finishes, Bob is mid-work: submission must not go through
    service
        .update_subtask(&path, &alice, SubtaskStatus::Done)
        .await
        .unwrap();
    let entity = service
        .update_subtask(&path, &bob, SubtaskStatus::InProgress)
        .await
        .unwrap();
    let WorkflowEntity::Task(task) = &entity else {
        panic!("expected a task")
    };
    assert_eq!(task.status(), TaskStatus::InProgress);

    let err = service
        .submit_task(&path, &alice, Some("my half done".into()), None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(siteflow_types::EngineError::InvalidTransition { .. })
    ));
    let WorkflowEntity::Task(task) = service.load(&path).await.unwrap() else {
        panic!("expected a task")
    };
    assert_eq!(task.status(), TaskStatus::InProgress);
    assert!(task.status_request.is_none());

    // Bob finishes; Alice submits; the creator returns it once, then
    // approves the resubmission
    service
        .update_subtask(&path, &bob, SubtaskStatus::Done)
        .await
        .unwrap();
    let entity = service
        .submit_task(&path, &alice, Some("all done".into()), None)
        .await
        .unwrap();
    assert_eq!(entity.status_label(), "Pending Approval");

    let entity = service
        .return_task(&path, &creator, "add handover photos")
        .await
        .unwrap();
    let WorkflowEntity::Task(task) = &entity else {
        panic!("expected a task")
    };
    assert_eq!(task.status(), TaskStatus::InProgress);
    assert_eq!(task.subtasks[&alice.id], SubtaskStatus::InProgress);

    service
        .update_subtask(&path, &alice, SubtaskStatus::Done)
        .await
        .unwrap();
    service
        .submit_task(&path, &alice, Some("photos attached".into()), None)
        .await
        .unwrap();
    let entity = service.approve(&path, &creator, None).await.unwrap();
    let WorkflowEntity::Task(task) = &entity else {
        panic!("expected a task")
    };
    assert_eq!(task.status(), TaskStatus::Done);
    assert!(task.completion_date.is_some());
}

#[tokio::test]
async fn timesheet_chain_with_rejection_loop() {
    let service = make_service();
    let worker = Actor::new(ActorId::new("worker"), "Worker");
    let office =
        Actor::new(ActorId::new("office"), "Office").with_capability(Capability::OfficeAcknowledge);

    let entity =
        WorkflowEntity::Timesheet(TimesheetEntity::new(worker.id.clone(), "2026-07"));
    let entity = service.create(entity).await.unwrap();
    let path = entity_path(&entity);

    service.acknowledge(&path, &worker).await.unwrap();
    service.send_to_office(&path, &worker).await.unwrap();
    let entity = service.reject(&path, &office, "hours mismatch").await.unwrap();
    let WorkflowEntity::Timesheet(timesheet) = &entity else {
        panic!("expected a timesheet")
    };
    assert_eq!(timesheet.status, TimesheetStatus::Rejected);

    service
        .reply(&path, &worker, "corrected the site hours")
        .await
        .unwrap();
    service.send_to_office(&path, &worker).await.unwrap();
    let entity = service.office_acknowledge(&path, &office).await.unwrap();
    let WorkflowEntity::Timesheet(timesheet) = &entity else {
        panic!("expected a timesheet")
    };
    assert_eq!(timesheet.status, TimesheetStatus::OfficeAcknowledged);
}

#[tokio::test]
async fn notifications_flow_through_the_outbox() {
    let service = make_service();
    let (path, _) = seed_ppe_request(&service, 10).await;

    let directory = InMemoryDirectory::new().with_user(DirectoryEntry::new(
        requester().id,
        "Requester",
        "requester@site.example",
    ));
    let dispatcher = service.dispatcher(directory, RecordingMailer::new());

    service.approve(&path, &approver(), None).await.unwrap();
    assert!(service.outbox().pending_count().await.unwrap() > 0);

    let report = dispatcher.drain(chrono::Utc::now()).await.unwrap();
    assert_eq!(report.sent, 1);
    assert_eq!(service.outbox().pending_count().await.unwrap(), 0);
    assert_eq!(
        dispatcher
            .outbox()
            .entries()
            .await
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn reopen_appends_a_linked_entity() {
    let service = make_service();
    let (path, _) = seed_ppe_request(&service, 10).await;
    let requester = requester();

    service
        .reject(&path, &approver(), "out of budget")
        .await
        .unwrap();
    service.acknowledge_rejection(&path, &requester).await.unwrap();

    let successor = service.reopen(&path, &requester).await.unwrap();
    let WorkflowEntity::Request(fresh) = &successor else {
        panic!("expected a request")
    };
    assert_eq!(fresh.status, RequestStatus::Pending);

    // the original is untouched and the successor lives at its own path
    let WorkflowEntity::Request(original) = service.load(&path).await.unwrap() else {
        panic!("expected a request")
    };
    assert_eq!(fresh.reopened_from.as_ref(), Some(&original.id));
    assert_eq!(original.status, RequestStatus::Rejected);
    assert_eq!(
        service.load(&entity_path(&successor)).await.unwrap(),
        successor
    );
}

#[tokio::test]
async fn internal_and_logbook_requests_share_the_machine() {
    let service = make_service();
    let requester = requester();

    for kind in [RequestKind::Internal, RequestKind::Logbook] {
        let entity = service
            .create(WorkflowEntity::Request(
                RequestEntity::new(kind, requester.id.clone())
                    .with_item(RequestItem::new("LOG-001", "Site logbook", 1)),
            ))
            .await
            .unwrap();
        let path = entity_path(&entity);

        let entity = service
            .reject(&path, &approver(), "duplicate request")
            .await
            .unwrap();
        assert_eq!(entity.status_label(), "Rejected");

        let entity = service.acknowledge_rejection(&path, &requester).await.unwrap();
        assert!(entity.acknowledged_by_requester());
    }
}

#[tokio::test]
async fn purge_is_admin_only_and_removes_the_subtree() {
    let service = make_service();
    let (path, _) = seed_ppe_request(&service, 10).await;

    let err = service.purge(&path, &requester()).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Engine(siteflow_types::EngineError::Unauthorized { .. })
    ));

    service.purge(&path, &admin()).await.unwrap();
    assert!(matches!(
        service.load(&path).await.unwrap_err(),
        ServiceError::NotFound(_)
    ));
}
