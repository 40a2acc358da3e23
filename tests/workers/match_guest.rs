use chrono::{Duration, Utc};
use facematch_backend::app::App;
use facematch_backend::models::_entities::{events, guest_queries};
use facematch_backend::pipeline::job_payload::MatchPayload;
use facematch_backend::pipeline::job_queue::{self, JOB_TYPE_MATCH_GUEST, STATUS_FAILED};
use facematch_backend::workers::match_guest::{MatchGuestWorker, WorkerArgs};
use loco_rs::{bgworker::BackgroundWorker, testing::prelude::*};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serial_test::serial;

use crate::helpers;

async fn insert_event(db: &sea_orm::DatabaseConnection, id: &str) {
    let now = Utc::now().into();
    events::ActiveModel {
        id: Set(id.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        name: Set("Match Test Event".to_string()),
        slug: Set(format!("match-test-{id}")),
        source_folder_link: Set("https://drive.google.com/drive/folders/1a2B3c4D5e6F7g8H9i".to_string()),
        source_folder_id: Set("1a2B3c4D5e6F7g8H9i".to_string()),
        owner_user_id: Set("owner".to_string()),
        guest_code_hash: Set("hash".to_string()),
        admin_token_hash: Set("admin-hash".to_string()),
        status: Set("ready".to_string()),
    }
    .insert(db)
    .await
    .expect("failed to insert fixture event");
}

async fn insert_guest_query(db: &sea_orm::DatabaseConnection, id: &str, event_id: &str) {
    let now = Utc::now();
    guest_queries::ActiveModel {
        id: Set(id.to_string()),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
        event_id: Set(event_id.to_string()),
        guest_user_id: Set(None),
        status: Set("queued".to_string()),
        selfie_path: Set(None),
        expires_at: Set((now + Duration::hours(1)).into()),
        confidence: Set(None),
        cluster_id: Set(None),
        message: Set(None),
        error_text: Set(None),
        completed_at: Set(None),
    }
    .insert(db)
    .await
    .expect("failed to insert fixture guest query");
}

#[tokio::test]
#[serial]
async fn match_worker_fails_the_job_when_the_query_is_missing() {
    let boot = boot_test::<App>().await.unwrap();
    let db = &boot.app_context.db;

    let job = job_queue::enqueue(
        db,
        JOB_TYPE_MATCH_GUEST,
        None,
        Some("query-that-does-not-exist".to_string()),
        serde_json::to_value(MatchPayload::default()).unwrap(),
        "queued",
    )
    .await
    .unwrap();

    let result = MatchGuestWorker::perform_later(
        &boot.app_context,
        WorkerArgs {
            job_id: job.id.clone(),
        },
    )
    .await;
    assert!(result.is_err());

    let status = job_queue::current_status(db, &job.id).await.unwrap();
    assert_eq!(status, STATUS_FAILED);

    helpers::teardown(db).await;
}

#[tokio::test]
#[serial]
async fn match_worker_fails_cleanly_when_the_guest_has_no_selfie_on_file() {
    let boot = boot_test::<App>().await.unwrap();
    let db = &boot.app_context.db;
    insert_event(db, "evt-match-fixture").await;
    insert_guest_query(db, "query-no-selfie", "evt-match-fixture").await;

    let job = job_queue::enqueue(
        db,
        JOB_TYPE_MATCH_GUEST,
        Some("evt-match-fixture".to_string()),
        Some("query-no-selfie".to_string()),
        serde_json::to_value(MatchPayload::default()).unwrap(),
        "queued",
    )
    .await
    .unwrap();

    MatchGuestWorker::perform_later(
        &boot.app_context,
        WorkerArgs {
            job_id: job.id.clone(),
        },
    )
    .await
    .unwrap();

    let status = job_queue::current_status(db, &job.id).await.unwrap();
    assert_eq!(status, STATUS_FAILED);

    let query = guest_queries::Entity::find_by_id("query-no-selfie".to_string())
        .one(db)
        .await
        .unwrap()
        .expect("guest query should still exist");
    assert_eq!(query.status, "failed");

    helpers::teardown(db).await;
}
