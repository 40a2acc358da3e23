//! Worker / Pipeline Driver (component H): orchestrates sync -> cluster ->
//! match, job progress, cancellation, and the idle cleanup/auto-refresh
//! pass.
//!
//! Deliberately loco-independent, like the rest of `pipeline` (see
//! `pipeline::mod` docs): `src/workers/*.rs` and
//! `src/initializers/pipeline_driver.rs` are the thin loco adapters that
//! build a [`PipelineDeps`] from an `AppContext` and call into this module
//! from `BackgroundWorker::perform` / the claim loop, mirroring the
//! teacher's `FindUnprocessedPhotosWorker` -> `process_thumbnails` split.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use thiserror::Error;
use tracing::warn;

use crate::common::settings::Settings;
use crate::models::_entities::events::{self, Entity as Events};
use crate::models::_entities::faces::{self, Entity as Faces};
use crate::models::_entities::guest_queries::{self, Entity as GuestQueries};
use crate::models::_entities::jobs;
use crate::pipeline::clusterer::{self, ClustererError};
use crate::pipeline::embedding_store::{self, EmbeddingStoreError};
use crate::pipeline::face_engine::{FaceEngine, FaceEngineError};
use crate::pipeline::job_payload::{parse_payload, ClusterPayload, MatchPayload, SyncCounters};
use crate::pipeline::job_queue::{
    self, JobQueueError, JOB_TYPE_CLUSTER_EVENT, JOB_TYPE_SYNC_EVENT,
};
use crate::pipeline::matcher::{self, MatchParams};
use crate::pipeline::remote_client::{RemoteFile, RemoteFolderClient, RemoteFolderError};
use crate::pipeline::storage::{MediaStore, StorageError};

pub const EVENT_STATUS_QUEUED: &str = "queued";
pub const EVENT_STATUS_SYNCING: &str = "syncing";
pub const EVENT_STATUS_PROCESSING_CLUSTERS: &str = "processing_clusters";
pub const EVENT_STATUS_READY: &str = "ready";
pub const EVENT_STATUS_FAILED: &str = "failed";
pub const EVENT_STATUS_CANCELED: &str = "canceled";
pub const EVENT_STATUS_CANCEL_REQUESTED: &str = "cancel_requested";

pub const QUERY_STATUS_QUEUED: &str = "queued";
pub const QUERY_STATUS_RUNNING: &str = "running";
pub const QUERY_STATUS_COMPLETED: &str = "completed";
pub const QUERY_STATUS_FAILED: &str = "failed";

/// `match_selfie`'s `max_results` for guest queries (§4.H step e).
const MATCH_MAX_RESULTS: usize = 160;
/// Events scanned per auto-refresh tick (§4.H cleanup pass).
const AUTO_SYNC_SCAN_LIMIT: u64 = 500;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error(transparent)]
    JobQueue(#[from] JobQueueError),
    #[error(transparent)]
    Store(#[from] EmbeddingStoreError),
    #[error(transparent)]
    Clusterer(#[from] ClustererError),
    #[error(transparent)]
    Remote(#[from] RemoteFolderError),
    #[error(transparent)]
    FaceEngine(#[from] FaceEngineError),
    #[error(transparent)]
    StorageIo(#[from] StorageError),
    #[error("event {0} not found")]
    EventMissing(String),
    #[error("guest query {0} not found")]
    QueryMissing(String),
    #[error("job {0} carries no event_id")]
    MissingEventRef(String),
    #[error("job {0} carries no query_id")]
    MissingQueryRef(String),
}

/// The resources one worker task needs to drive any job type: the shared
/// DB pool, the on-disk media store, the remote folder client, and the
/// process-global Face Engine handle.
pub struct PipelineDeps {
    pub db: DatabaseConnection,
    pub store: MediaStore,
    pub remote: RemoteFolderClient,
    pub face_engine: Arc<FaceEngine>,
    pub settings: Settings,
}

/// Runs a `sync_event` job end to end (§4.H steps a-i).
///
/// Returns the id of a freshly enqueued `cluster_event` job when one was
/// created, so the loco adapter can chain into it via `perform_later`
/// instead of waiting for the next claim-loop tick.
///
/// # Errors
/// If a database operation fails outright (file-level faults are absorbed
/// into the job's failure counter rather than propagated).
pub async fn run_sync_job(
    deps: &PipelineDeps,
    job: &jobs::Model,
) -> Result<Option<String>, PipelineError> {
    let event_id = job
        .event_id
        .clone()
        .ok_or_else(|| PipelineError::MissingEventRef(job.id.clone()))?;

    let Some(event) = Events::find_by_id(&event_id).one(&deps.db).await? else {
        job_queue::fail(&deps.db, &job.id, "event_missing").await?;
        return Err(PipelineError::EventMissing(event_id));
    };

    let mut counters = SyncCounters::listing();
    job_queue::upsert_payload(&deps.db, &job.id, &counters).await?;
    job_queue::mark_progress(&deps.db, &job.id, 1, "listing_drive_files").await?;

    let listed = match deps
        .remote
        .list_images(&event.source_folder_id, deps.settings.max_sync_images)
        .await
    {
        Ok(files) => files,
        Err(e) => {
            set_event_status(&deps.db, &event_id, EVENT_STATUS_FAILED).await?;
            job_queue::fail(&deps.db, &job.id, &format!("remote_listing_failed: {e}")).await?;
            return Ok(None);
        }
    };
    let listed: Vec<RemoteFile> = listed
        .into_iter()
        .filter(|f| !f.name.trim().is_empty())
        .collect();
    let total = listed.len() as u32;
    counters.total_listed = total;

    if total == 0 {
        set_event_status(&deps.db, &event_id, EVENT_STATUS_READY).await?;
        job_queue::complete(
            &deps.db,
            &job.id,
            "sync_completed_empty",
            Some(serde_json::to_value(&counters).unwrap_or_default()),
        )
        .await?;
        return Ok(None);
    }

    let existing_photos = embedding_store::photos_for_event(&deps.db, &event_id).await?;
    let existing_by_remote: HashMap<String, String> = existing_photos
        .iter()
        .map(|p| (p.remote_file_id.clone(), p.content_stamp.clone()))
        .collect();

    let (reused, refresh_queue) = partition_reused_and_refresh(&listed, &existing_by_remote);
    counters.reused_files = reused.len() as u32;
    counters.processed = counters.reused_files;
    counters.refresh_queue_total = Some(refresh_queue.len() as u32);
    counters.phase = "processing".to_string();
    job_queue::upsert_payload(&deps.db, &job.id, &counters).await?;

    let refresh_total = refresh_queue.len() as u32;
    for (index, file) in refresh_queue.iter().enumerate() {
        if job_queue::observe_cancel_requested(&deps.db, &job.id).await? {
            let txn = deps.db.begin().await?;
            set_event_status(&txn, &event_id, EVENT_STATUS_CANCELED).await?;
            job_queue::finalize_canceled(&txn, &job.id).await?;
            txn.commit().await?;
            return Ok(None);
        }

        counters.current_file_id = Some(file.id.clone());
        counters.current_file_name = Some(file.name.clone());

        let bytes = match deps.remote.download(file).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("sync {event_id}: download failed for {}: {e}", file.id);
                counters.failures += 1;
                job_queue::upsert_payload(&deps.db, &job.id, &counters).await?;
                continue;
            }
        };

        match refresh_one_photo(deps, &event_id, file, &bytes).await {
            Ok(face_count) => {
                counters.refreshed_files += 1;
                counters.processed += 1;
                counters.matched_faces += face_count as u32;
            }
            Err(e) => {
                warn!("sync {event_id}: failed to persist photo {}: {e}", file.id);
                counters.failures += 1;
            }
        }

        let percent = sync_progress_percent(counters.reused_files, index as u32 + 1, total);
        job_queue::upsert_payload(&deps.db, &job.id, &counters).await?;
        job_queue::mark_progress(
            &deps.db,
            &job.id,
            percent,
            &format!("processing image {}/{refresh_total}", index + 1),
        )
        .await?;
    }

    let keep_ids: Vec<String> = listed.iter().map(|f| f.id.clone()).collect();
    embedding_store::delete_photos_not_in(&deps.db, &event_id, &keep_ids).await?;

    let had_existing_clusters = embedding_store::has_clusters_for_event(&deps.db, &event_id).await?;
    let follow_on_cluster_job = if should_recluster(
        counters.refreshed_files,
        counters.failures,
        had_existing_clusters,
    ) {
        set_event_status(&deps.db, &event_id, EVENT_STATUS_PROCESSING_CLUSTERS).await?;
        let payload = ClusterPayload {
            phase: "queued".to_string(),
            source_job_id: Some(job.id.clone()),
            ..ClusterPayload::default()
        };
        let cluster_job = job_queue::enqueue(
            &deps.db,
            JOB_TYPE_CLUSTER_EVENT,
            Some(event_id.clone()),
            None,
            serde_json::to_value(&payload).unwrap_or_default(),
            "queued",
        )
        .await?;
        Some(cluster_job.id)
    } else {
        set_event_status(&deps.db, &event_id, EVENT_STATUS_READY).await?;
        None
    };

    job_queue::complete(
        &deps.db,
        &job.id,
        "sync_completed",
        Some(serde_json::to_value(&counters).unwrap_or_default()),
    )
    .await?;
    Ok(follow_on_cluster_job)
}

/// Downloads-then-writes a single file's thumbnail and Face rows inside one
/// transaction (§5: "writes for a given Photo happen in a single
/// transaction"). Returns the number of faces written.
async fn refresh_one_photo(
    deps: &PipelineDeps,
    event_id: &str,
    file: &RemoteFile,
    bytes: &[u8],
) -> Result<usize, PipelineError> {
    let thumbnail_path =
        deps.store
            .save_thumbnail(event_id, &file.id, bytes, deps.settings.thumbnail_max_size)?;
    let detected = deps
        .face_engine
        .embed_faces(bytes, deps.settings.face_max_faces_per_image)
        .await?;

    let txn = deps.db.begin().await?;
    let photo_id = embedding_store::upsert_photo(&txn, event_id, file, &thumbnail_path).await?;
    embedding_store::delete_faces_for_photo(&txn, photo_id).await?;
    embedding_store::insert_faces(&txn, event_id, photo_id, &detected).await?;
    txn.commit().await?;
    Ok(detected.len())
}

/// Splits `listed` into files whose content stamp is unchanged from the
/// stored Photo (reused) versus everything else, new or changed (refresh).
fn partition_reused_and_refresh(
    listed: &[RemoteFile],
    existing_by_remote: &HashMap<String, String>,
) -> (Vec<RemoteFile>, Vec<RemoteFile>) {
    let mut reused = Vec::new();
    let mut refresh_queue = Vec::new();
    for file in listed {
        match existing_by_remote.get(&file.id) {
            Some(stamp) if *stamp == file.content_stamp() => reused.push(file.clone()),
            _ => refresh_queue.push(file.clone()),
        }
    }
    (reused, refresh_queue)
}

/// Progress percent for the per-file refresh loop, clamped to `[2, 95]`
/// (§4.H step f).
fn sync_progress_percent(reused: u32, index_in_refresh: u32, total: u32) -> i32 {
    if total == 0 {
        return 95;
    }
    let fraction = f64::from(reused + index_in_refresh) / f64::from(total);
    ((fraction * 100.0) as i32).clamp(2, 95)
}

/// Decides whether a `cluster_event` job is enqueued after a sync
/// (§4.H step h).
fn should_recluster(refreshed: u32, failures: u32, had_existing_clusters: bool) -> bool {
    refreshed > 0 || failures > 0 || !had_existing_clusters
}

/// Runs a `cluster_event` job end to end (§4.E / §4.H "Cluster job").
///
/// # Errors
/// If a database operation fails.
pub async fn run_cluster_job(deps: &PipelineDeps, job: &jobs::Model) -> Result<(), PipelineError> {
    let event_id = job
        .event_id
        .clone()
        .ok_or_else(|| PipelineError::MissingEventRef(job.id.clone()))?;

    if Events::find_by_id(&event_id).one(&deps.db).await?.is_none() {
        job_queue::fail(&deps.db, &job.id, "event_missing").await?;
        return Err(PipelineError::EventMissing(event_id));
    }

    if job_queue::observe_cancel_requested(&deps.db, &job.id).await? {
        let txn = deps.db.begin().await?;
        set_event_status(&txn, &event_id, EVENT_STATUS_CANCELED).await?;
        job_queue::finalize_canceled(&txn, &job.id).await?;
        txn.commit().await?;
        return Ok(());
    }

    job_queue::mark_progress(&deps.db, &job.id, 96, "clustering_faces").await?;
    let cluster_count = clusterer::cluster_event(
        &deps.db,
        &event_id,
        deps.settings.cluster_eps,
        deps.settings.cluster_min_samples,
    )
    .await?;
    set_event_status(&deps.db, &event_id, EVENT_STATUS_READY).await?;

    let mut payload: ClusterPayload = parse_payload(&job.payload);
    payload.phase = "completed".to_string();
    payload.cluster_count = Some(cluster_count);
    job_queue::complete(
        &deps.db,
        &job.id,
        "cluster_completed",
        Some(serde_json::to_value(&payload).unwrap_or_default()),
    )
    .await?;
    Ok(())
}

/// Runs a `match_guest` job end to end (§4.H "Match job").
///
/// # Errors
/// If a database operation fails.
pub async fn run_match_job(deps: &PipelineDeps, job: &jobs::Model) -> Result<(), PipelineError> {
    let query_id = job
        .query_id
        .clone()
        .ok_or_else(|| PipelineError::MissingQueryRef(job.id.clone()))?;

    let Some(query) = GuestQueries::find_by_id(&query_id).one(&deps.db).await? else {
        job_queue::fail(&deps.db, &job.id, "query_missing").await?;
        return Err(PipelineError::QueryMissing(query_id));
    };

    let Some(event) = Events::find_by_id(&query.event_id).one(&deps.db).await? else {
        set_query_failed(&deps.db, &query_id, "event_missing").await?;
        job_queue::fail(&deps.db, &job.id, "event_missing").await?;
        return Err(PipelineError::EventMissing(query.event_id.clone()));
    };

    set_query_running(&deps.db, &query_id, "Matching selfie with clusters...").await?;
    job_queue::mark_progress(&deps.db, &job.id, 10, "matching_selfie").await?;

    if job_queue::observe_cancel_requested(&deps.db, &job.id).await? {
        return finalize_match_cancel(deps, &query_id, &job.id).await;
    }

    let Some(selfie_relative) = query.selfie_path.clone().filter(|p| !p.is_empty()) else {
        set_query_failed(&deps.db, &query_id, "Selfie file missing").await?;
        job_queue::fail(&deps.db, &job.id, "selfie_missing").await?;
        return Ok(());
    };
    let selfie_abs_path = deps.store.resolve(&selfie_relative)?;
    let Ok(selfie_bytes) = tokio::fs::read(&selfie_abs_path).await else {
        set_query_failed(&deps.db, &query_id, "Selfie file missing").await?;
        job_queue::fail(&deps.db, &job.id, "selfie_missing").await?;
        return Ok(());
    };

    if job_queue::observe_cancel_requested(&deps.db, &job.id).await? {
        return finalize_match_cancel(deps, &query_id, &job.id).await;
    }

    let embedding = deps.face_engine.embed_single_face(&selfie_bytes).await?;
    let Some(embedding) = embedding else {
        let remaining_unsynced = count_photos_without_faces(&deps.db, &event.id).await?;
        let message = no_face_message(remaining_unsynced);
        set_query_completed(&deps.db, &query_id, 0.0, &message).await?;
        job_queue::complete(&deps.db, &job.id, "match_completed_no_face", None).await?;
        return Ok(());
    };

    job_queue::mark_progress(&deps.db, &job.id, 45, "scoring_candidates").await?;
    if job_queue::observe_cancel_requested(&deps.db, &job.id).await? {
        return finalize_match_cancel(deps, &query_id, &job.id).await;
    }

    let faces = embedding_store::faces_for_event(&deps.db, &event.id).await?;
    let params = MatchParams {
        strict_threshold_percent: deps.settings.face_similarity_threshold_percent,
        top_margin: deps.settings.face_top_margin,
        relax_drop: deps.settings.face_auto_relax_drop,
        relax_min_threshold: deps.settings.face_auto_relax_min_threshold,
        max_results: MATCH_MAX_RESULTS,
    };
    let outcome = matcher::match_selfie(&embedding.embedding, &faces, &params);

    if outcome.rows.is_empty() {
        set_query_completed(&deps.db, &query_id, 0.0, "No confident match found.").await?;
        let payload = MatchPayload {
            phase: "completed".to_string(),
            result: Some("no_confident_match".to_string()),
            threshold_percent: Some(outcome.used_threshold_percent),
            adaptive_threshold_used: Some(outcome.relaxed),
            ..MatchPayload::default()
        };
        job_queue::complete(
            &deps.db,
            &job.id,
            "match_completed_no_confident_cluster",
            Some(serde_json::to_value(&payload).unwrap_or_default()),
        )
        .await?;
        return Ok(());
    }

    job_queue::mark_progress(&deps.db, &job.id, 70, "writing_results").await?;

    let confidence = outcome
        .rows
        .iter()
        .map(|r| r.score_ratio)
        .fold(0.0f32, f32::max);
    let message = format!(
        "Found you in {} photo{}.",
        outcome.rows.len(),
        if outcome.rows.len() == 1 { "" } else { "s" }
    );
    let txn = deps.db.begin().await?;
    embedding_store::rewrite_guest_results(&txn, &query_id, &outcome.rows).await?;
    set_query_completed(&txn, &query_id, confidence, &message).await?;
    txn.commit().await?;

    let payload = MatchPayload {
        phase: "completed".to_string(),
        result: Some("matched".to_string()),
        threshold_percent: Some(outcome.used_threshold_percent),
        adaptive_threshold_used: Some(outcome.relaxed),
        photos: Some(outcome.rows.len()),
        confidence: Some(confidence),
        ..MatchPayload::default()
    };
    job_queue::complete(
        &deps.db,
        &job.id,
        "match_completed",
        Some(serde_json::to_value(&payload).unwrap_or_default()),
    )
    .await?;
    Ok(())
}

/// "No clear face" message (§4.H step d), mentioning the count of photos
/// not yet synced when that count is known and non-zero.
fn no_face_message(remaining_unsynced: u64) -> String {
    if remaining_unsynced > 0 {
        format!(
            "No clear face found in selfie. Note: {remaining_unsynced} photo(s) in this event haven't been indexed yet."
        )
    } else {
        "No clear face found in selfie. Try a closer, well-lit photo.".to_string()
    }
}

async fn count_photos_without_faces(
    db: &DatabaseConnection,
    event_id: &str,
) -> Result<u64, PipelineError> {
    let photos = embedding_store::photos_for_event(db, event_id).await?;
    let faced_photo_ids: std::collections::HashSet<i32> = Faces::find()
        .filter(faces::Column::EventId.eq(event_id))
        .all(db)
        .await?
        .into_iter()
        .map(|f| f.photo_id)
        .collect();
    Ok(photos
        .iter()
        .filter(|p| !faced_photo_ids.contains(&p.id))
        .count() as u64)
}

async fn finalize_match_cancel(
    deps: &PipelineDeps,
    query_id: &str,
    job_id: &str,
) -> Result<(), PipelineError> {
    let txn = deps.db.begin().await?;
    set_query_failed(&txn, query_id, "Canceled by admin").await?;
    job_queue::finalize_canceled(&txn, job_id).await?;
    txn.commit().await?;
    Ok(())
}

/// Generic over `ConnectionTrait` so a cancel/completion path that must stay
/// atomic with its job-queue finalize (spec.md:164, spec.md:170) can thread
/// an open transaction through instead of the bare pool connection.
async fn set_event_status<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
    status: &str,
) -> Result<(), PipelineError> {
    if let Some(model) = Events::find_by_id(event_id).one(db).await? {
        let mut active: events::ActiveModel = model.into();
        active.status = Set(status.to_string());
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
    }
    Ok(())
}

async fn set_query_running<C: ConnectionTrait>(
    db: &C,
    query_id: &str,
    message: &str,
) -> Result<(), PipelineError> {
    if let Some(model) = GuestQueries::find_by_id(query_id).one(db).await? {
        let mut active: guest_queries::ActiveModel = model.into();
        active.status = Set(QUERY_STATUS_RUNNING.to_string());
        active.message = Set(Some(message.to_string()));
        active.updated_at = Set(Utc::now().into());
        active.update(db).await?;
    }
    Ok(())
}

async fn set_query_completed<C: ConnectionTrait>(
    db: &C,
    query_id: &str,
    confidence: f32,
    message: &str,
) -> Result<(), PipelineError> {
    if let Some(model) = GuestQueries::find_by_id(query_id).one(db).await? {
        let now = Utc::now();
        let mut active: guest_queries::ActiveModel = model.into();
        active.status = Set(QUERY_STATUS_COMPLETED.to_string());
        active.confidence = Set(Some(confidence));
        active.message = Set(Some(message.to_string()));
        active.completed_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(db).await?;
    }
    Ok(())
}

async fn set_query_failed<C: ConnectionTrait>(
    db: &C,
    query_id: &str,
    error_text: &str,
) -> Result<(), PipelineError> {
    if let Some(model) = GuestQueries::find_by_id(query_id).one(db).await? {
        let now = Utc::now();
        let mut active: guest_queries::ActiveModel = model.into();
        active.status = Set(QUERY_STATUS_FAILED.to_string());
        active.error_text = Set(Some(error_text.to_string()));
        active.completed_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(db).await?;
    }
    Ok(())
}

/// Marks a coupled `GuestQuery` failed with `"Canceled by admin"`, for the
/// dispatch-failure recovery path (§4.H step 3) when the cancel was observed
/// after the job's own `perform` call already unwound.
///
/// # Errors
/// If the database update fails.
pub async fn fail_query_as_canceled(
    db: &DatabaseConnection,
    query_id: &str,
) -> Result<(), PipelineError> {
    set_query_failed(db, query_id, "Canceled by admin").await
}

/// Marks a coupled `GuestQuery` failed with `error_text`, mirroring an
/// uncaught job-dispatch error onto its query (§4.H step 3 / §7).
///
/// # Errors
/// If the database update fails.
pub async fn fail_query_with_message(
    db: &DatabaseConnection,
    query_id: &str,
    error_text: &str,
) -> Result<(), PipelineError> {
    set_query_failed(db, query_id, error_text).await
}

/// Idle cleanup pass (§4.H "Cleanup+auto-refresh pass"), run roughly once
/// per 60 idle seconds by the claim loop: deletes expired selfie blobs.
///
/// # Errors
/// If a database operation fails.
pub async fn cleanup_expired_selfies(deps: &PipelineDeps) -> Result<u64, PipelineError> {
    let now = Utc::now();
    let expired = GuestQueries::find()
        .filter(guest_queries::Column::ExpiresAt.lte(now))
        .filter(guest_queries::Column::SelfiePath.is_not_null())
        .all(&deps.db)
        .await?;

    let mut cleaned = 0u64;
    for model in expired {
        if let Some(path) = model.selfie_path.clone().filter(|p| !p.is_empty()) {
            deps.store.delete_if_exists(&path);
        }
        let mut active: guest_queries::ActiveModel = model.into();
        active.selfie_path = Set(None);
        active.updated_at = Set(Utc::now().into());
        active.update(&deps.db).await?;
        cleaned += 1;
    }
    Ok(cleaned)
}

/// Auto-refresh half of the idle pass: enqueues `sync_event` jobs for
/// terminal events that are due for a refresh, up to
/// `auto_sync_batch_size` per tick.
///
/// # Errors
/// If a database operation fails.
pub async fn auto_refresh_stale_events(deps: &PipelineDeps) -> Result<u64, PipelineError> {
    if !deps.settings.auto_sync_enabled || deps.settings.google_drive_api_key.trim().is_empty() {
        return Ok(0);
    }

    let cutoff = Utc::now() - Duration::minutes(deps.settings.auto_sync_interval_minutes);
    let candidates = Events::find()
        .filter(
            events::Column::Status
                .eq(EVENT_STATUS_READY)
                .or(events::Column::Status.eq(EVENT_STATUS_FAILED))
                .or(events::Column::Status.eq(EVENT_STATUS_CANCELED))
                .or(events::Column::Status.eq(EVENT_STATUS_CANCEL_REQUESTED)),
        )
        .order_by_asc(events::Column::UpdatedAt)
        .paginate(&deps.db, AUTO_SYNC_SCAN_LIMIT)
        .fetch_page(0)
        .await?;

    let mut enqueued = 0u64;
    for event in candidates {
        if enqueued as usize >= deps.settings.auto_sync_batch_size {
            break;
        }
        if event.updated_at > cutoff.into() {
            continue;
        }
        if job_queue::has_active_job_for_event(&deps.db, &event.id).await? {
            continue;
        }
        set_event_status(&deps.db, &event.id, EVENT_STATUS_SYNCING).await?;
        let payload = SyncCounters {
            phase: "listing".to_string(),
            trigger: Some("auto_refresh".to_string()),
            ..SyncCounters::default()
        };
        job_queue::enqueue(
            &deps.db,
            JOB_TYPE_SYNC_EVENT,
            Some(event.id.clone()),
            None,
            serde_json::to_value(&payload).unwrap_or_default(),
            "queued",
        )
        .await?;
        enqueued += 1;
    }
    Ok(enqueued)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, stamp_parts: (&str, &str, &str)) -> RemoteFile {
        RemoteFile {
            id: id.to_string(),
            name: stamp_parts.2.to_string(),
            mime_type: "image/jpeg".to_string(),
            web_view_link: None,
            modified_time: Some(stamp_parts.0.to_string()),
            size: Some(stamp_parts.1.to_string()),
        }
    }

    #[test]
    fn partitions_unchanged_files_as_reused() {
        let listed = vec![
            file("a", ("t1", "100", "a.jpg")),
            file("b", ("t2", "200", "b.jpg")),
        ];
        let mut existing = HashMap::new();
        existing.insert("a".to_string(), listed[0].content_stamp());
        existing.insert("b".to_string(), "stale-stamp".to_string());

        let (reused, refresh) = partition_reused_and_refresh(&listed, &existing);
        assert_eq!(reused.len(), 1);
        assert_eq!(reused[0].id, "a");
        assert_eq!(refresh.len(), 1);
        assert_eq!(refresh[0].id, "b");
    }

    #[test]
    fn new_files_without_prior_stamp_go_to_refresh() {
        let listed = vec![file("new", ("t1", "1", "new.jpg"))];
        let existing = HashMap::new();
        let (reused, refresh) = partition_reused_and_refresh(&listed, &existing);
        assert!(reused.is_empty());
        assert_eq!(refresh.len(), 1);
    }

    #[test]
    fn sync_progress_percent_is_clamped() {
        assert_eq!(sync_progress_percent(0, 0, 0), 95);
        assert_eq!(sync_progress_percent(0, 1, 100), 2);
        assert_eq!(sync_progress_percent(98, 1, 100), 95);
    }

    #[test]
    fn recluster_fires_on_refresh_failure_or_missing_clusters() {
        assert!(should_recluster(1, 0, true));
        assert!(should_recluster(0, 1, true));
        assert!(should_recluster(0, 0, false));
        assert!(!should_recluster(0, 0, true));
    }

    #[test]
    fn no_face_message_mentions_unsynced_count_when_known() {
        assert!(no_face_message(3).contains('3'));
        assert!(!no_face_message(0).contains("haven't been indexed"));
    }
}
