use chrono::Utc;
use facematch_backend::app::App;
use facematch_backend::models::_entities::events;
use facematch_backend::pipeline::job_payload::SyncCounters;
use facematch_backend::pipeline::job_queue::{self, JOB_TYPE_SYNC_EVENT, STATUS_CANCELED};
use facematch_backend::workers::sync_event::{SyncEventWorker, WorkerArgs};
use loco_rs::{bgworker::BackgroundWorker, testing::prelude::*};
use sea_orm::{ActiveModelTrait, ActiveValue::Set};
use serial_test::serial;

use crate::helpers;

async fn insert_event(db: &sea_orm::DatabaseConnection, id: &str) {
    let now = Utc::now().into();
    events::ActiveModel {
        id: Set(id.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        name: Set("Test Event".to_string()),
        slug: Set(format!("test-event-{id}")),
        source_folder_link: Set("https://drive.google.com/drive/folders/1a2B3c4D5e6F7g8H9i".to_string()),
        source_folder_id: Set("1a2B3c4D5e6F7g8H9i".to_string()),
        owner_user_id: Set("owner".to_string()),
        guest_code_hash: Set("hash".to_string()),
        admin_token_hash: Set("admin-hash".to_string()),
        status: Set("queued".to_string()),
    }
    .insert(db)
    .await
    .expect("failed to insert fixture event");
}

#[tokio::test]
#[serial]
async fn canceling_a_queued_sync_job_is_immediately_terminal() {
    let boot = boot_test::<App>().await.unwrap();
    let db = &boot.app_context.db;

    let job = job_queue::enqueue(
        db,
        JOB_TYPE_SYNC_EVENT,
        Some("nonexistent-event".to_string()),
        None,
        serde_json::to_value(SyncCounters::listing()).unwrap(),
        "queued",
    )
    .await
    .unwrap();

    job_queue::request_cancel(db, &job.id).await.unwrap();

    let status = job_queue::current_status(db, &job.id).await.unwrap();
    assert_eq!(status, STATUS_CANCELED);

    helpers::teardown(db).await;
}

#[tokio::test]
#[serial]
async fn sync_worker_fails_the_job_when_the_event_is_missing() {
    let boot = boot_test::<App>().await.unwrap();
    let db = &boot.app_context.db;

    let job = job_queue::enqueue(
        db,
        JOB_TYPE_SYNC_EVENT,
        Some("event-that-does-not-exist".to_string()),
        None,
        serde_json::to_value(SyncCounters::listing()).unwrap(),
        "queued",
    )
    .await
    .unwrap();

    let result = SyncEventWorker::perform_later(
        &boot.app_context,
        WorkerArgs {
            job_id: job.id.clone(),
        },
    )
    .await;
    assert!(result.is_err());

    let status = job_queue::current_status(db, &job.id).await.unwrap();
    assert_eq!(status, job_queue::STATUS_FAILED);

    helpers::teardown(db).await;
}

#[tokio::test]
#[serial]
async fn sync_worker_accepts_a_job_for_an_existing_event() {
    let boot = boot_test::<App>().await.unwrap();
    let db = &boot.app_context.db;
    insert_event(db, "evt-sync-fixture").await;

    let job = job_queue::enqueue(
        db,
        JOB_TYPE_SYNC_EVENT,
        Some("evt-sync-fixture".to_string()),
        None,
        serde_json::to_value(SyncCounters::listing()).unwrap(),
        "queued",
    )
    .await
    .unwrap();

    // Without network access to the remote folder API this will end in
    // "failed" rather than "completed", but it must not panic and must not
    // leave the job stuck in "running" (§4.H: every path out of a job
    // handler reaches a terminal or cancel-observing state).
    let _ = SyncEventWorker::perform_later(
        &boot.app_context,
        WorkerArgs {
            job_id: job.id.clone(),
        },
    )
    .await;

    let status = job_queue::current_status(db, &job.id).await.unwrap();
    assert!(job_queue::is_terminal(&status));

    helpers::teardown(db).await;
}
