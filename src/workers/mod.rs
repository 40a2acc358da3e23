//! Thin `loco-rs` adapters over `pipeline::worker`'s loco-independent job
//! handlers: one `BackgroundWorker<WorkerArgs>` per job type, matching the
//! teacher's one-worker-per-concern layout (`AnalyzeImagesWorker`,
//! `FindUnprocessedPhotosWorker`, ...).

pub mod cluster_event;
pub mod match_guest;
pub mod sync_event;

use loco_rs::app::AppContext;
use loco_rs::Error;
use sea_orm::EntityTrait;
use tracing::warn;

use crate::common::settings::Settings;
use crate::models::_entities::jobs::Entity as Jobs;
use crate::pipeline::face_engine::{self, FaceEngine};
use crate::pipeline::job_queue;
use crate::pipeline::remote_client::RemoteFolderClient;
use crate::pipeline::storage::MediaStore;
use crate::pipeline::worker::{self, PipelineDeps};

/// Builds the resource bundle a job handler needs from a loco `AppContext`.
/// Shared by all three job-type workers so each only wires up its own
/// `pipeline::worker::run_*_job` call.
pub(crate) fn build_deps(ctx: &AppContext) -> Result<PipelineDeps, Error> {
    let settings = Settings::from_context(ctx);
    let store = MediaStore::new(&settings.storage_root).map_err(|e| Error::Message(e.to_string()))?;
    let remote = RemoteFolderClient::new(settings.google_drive_api_key.clone());
    let face_engine: std::sync::Arc<FaceEngine> = face_engine::global(
        &settings,
        settings.face_model_cache_dir.clone(),
        settings.face_fallback_enabled,
    );
    Ok(PipelineDeps {
        db: ctx.db.clone(),
        store,
        remote,
        face_engine,
        settings,
    })
}

/// Dispatch-failure recovery (§4.H "Main loop" step 3 / §7): on any uncaught
/// error from a `run_*_job` call, reload the job row on a fresh connection
/// and either finalize it as `canceled` (if a cancel was observed mid-run)
/// or mark it `failed` with the stringified error, mirroring the same
/// failure onto a coupled `GuestQuery` when the job carries one.
///
/// Called from each `BackgroundWorker::perform` adapter rather than
/// centrally in the claim loop, since that's where the loco-specific
/// `AppContext` (and thus a usable DB handle) is already in scope.
pub(crate) async fn recover_from_dispatch_error(ctx: &AppContext, job_id: &str, error: &str) {
    let Ok(Some(job)) = Jobs::find_by_id(job_id).one(&ctx.db).await else {
        warn!("pipeline driver: could not reload job {job_id} to record failure: {error}");
        return;
    };

    if job.status == job_queue::STATUS_CANCEL_REQUESTED {
        if let Some(query_id) = &job.query_id {
            if let Err(e) = worker::fail_query_as_canceled(&ctx.db, query_id).await {
                warn!("pipeline driver: failed to cancel guest query {query_id}: {e}");
            }
        }
        if let Err(e) = job_queue::finalize_canceled(&ctx.db, job_id).await {
            warn!("pipeline driver: failed to finalize canceled job {job_id}: {e}");
        }
        return;
    }

    if let Some(query_id) = &job.query_id {
        if let Err(e) = worker::fail_query_with_message(&ctx.db, query_id, error).await {
            warn!("pipeline driver: failed to mark guest query {query_id} failed: {e}");
        }
    }
    if let Err(e) = job_queue::fail(&ctx.db, job_id, error).await {
        warn!("pipeline driver: failed to mark job {job_id} failed: {e}");
    }
}
