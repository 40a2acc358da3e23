use chrono::Utc;
use facematch_backend::app::App;
use facematch_backend::models::_entities::events;
use facematch_backend::pipeline::job_payload::ClusterPayload;
use facematch_backend::pipeline::job_queue::{self, JOB_TYPE_CLUSTER_EVENT, STATUS_COMPLETED};
use facematch_backend::workers::cluster_event::{ClusterEventWorker, WorkerArgs};
use loco_rs::{bgworker::BackgroundWorker, testing::prelude::*};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serial_test::serial;

use crate::helpers;

async fn insert_event(db: &sea_orm::DatabaseConnection, id: &str, status: &str) {
    let now = Utc::now().into();
    events::ActiveModel {
        id: Set(id.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        name: Set("Cluster Test Event".to_string()),
        slug: Set(format!("cluster-test-{id}")),
        source_folder_link: Set("https://drive.google.com/drive/folders/1a2B3c4D5e6F7g8H9i".to_string()),
        source_folder_id: Set("1a2B3c4D5e6F7g8H9i".to_string()),
        owner_user_id: Set("owner".to_string()),
        guest_code_hash: Set("hash".to_string()),
        admin_token_hash: Set("admin-hash".to_string()),
        status: Set(status.to_string()),
    }
    .insert(db)
    .await
    .expect("failed to insert fixture event");
}

#[tokio::test]
#[serial]
async fn cluster_worker_completes_for_an_event_with_no_faces() {
    let boot = boot_test::<App>().await.unwrap();
    let db = &boot.app_context.db;
    insert_event(db, "evt-cluster-empty", "processing_clusters").await;

    let job = job_queue::enqueue(
        db,
        JOB_TYPE_CLUSTER_EVENT,
        Some("evt-cluster-empty".to_string()),
        None,
        serde_json::to_value(ClusterPayload {
            phase: "queued".to_string(),
            ..ClusterPayload::default()
        })
        .unwrap(),
        "queued",
    )
    .await
    .unwrap();

    ClusterEventWorker::perform_later(
        &boot.app_context,
        WorkerArgs {
            job_id: job.id.clone(),
        },
    )
    .await
    .unwrap();

    let status = job_queue::current_status(db, &job.id).await.unwrap();
    assert_eq!(status, STATUS_COMPLETED);

    let event = events::Entity::find_by_id("evt-cluster-empty".to_string())
        .one(db)
        .await
        .unwrap()
        .expect("event should still exist");
    assert_eq!(event.status, "ready");

    helpers::teardown(db).await;
}

#[tokio::test]
#[serial]
async fn cluster_worker_fails_the_job_when_the_event_is_missing() {
    let boot = boot_test::<App>().await.unwrap();
    let db = &boot.app_context.db;

    let job = job_queue::enqueue(
        db,
        JOB_TYPE_CLUSTER_EVENT,
        Some("event-that-does-not-exist".to_string()),
        None,
        serde_json::to_value(ClusterPayload::default()).unwrap(),
        "queued",
    )
    .await
    .unwrap();

    let result = ClusterEventWorker::perform_later(
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
