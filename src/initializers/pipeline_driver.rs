//! Pipeline Driver (component H): owns the claim loop and the idle
//! cleanup/auto-refresh cadence, since loco-rs workers are invoked per job
//! rather than polling a queue themselves (§4.H ambient detail). Follows
//! `PhotosProcessorInitializer`'s `Initializer` shape, but where that
//! initializer kicks off a single one-shot worker, this one spawns
//! `worker_concurrency` long-running tokio tasks.

use std::time::Duration;

use loco_rs::prelude::*;
use tracing::{error, warn};

use crate::common::settings::Settings;
use crate::pipeline::job_queue::{self, JOB_TYPE_CLUSTER_EVENT, JOB_TYPE_MATCH_GUEST, JOB_TYPE_SYNC_EVENT};
use crate::pipeline::worker as pipeline_worker;
use crate::workers::build_deps;
use crate::workers::cluster_event::{ClusterEventWorker, WorkerArgs as ClusterArgs};
use crate::workers::match_guest::{MatchGuestWorker, WorkerArgs as MatchArgs};
use crate::workers::sync_event::{SyncEventWorker, WorkerArgs as SyncArgs};

/// Idle ticks between cleanup/auto-refresh passes on the lead task (task
/// index 0), roughly once per minute at the default `job_idle_sleep_seconds`.
const CLEANUP_CADENCE_SECONDS: u64 = 60;

pub struct PipelineDriverInitializer;

#[async_trait]
impl Initializer for PipelineDriverInitializer {
    fn name(&self) -> String {
        "pipeline-driver".to_string()
    }

    async fn before_run(&self, ctx: &AppContext) -> Result<()> {
        let settings = Settings::from_context(ctx);
        let concurrency = settings.worker_concurrency.max(1);

        for task_index in 0..concurrency {
            let ctx = ctx.clone();
            let settings = settings.clone();
            tokio::spawn(async move {
                run_claim_loop(ctx, settings, task_index).await;
            });
        }

        Ok(())
    }
}

async fn run_claim_loop(ctx: AppContext, settings: Settings, task_index: usize) {
    let poll_interval = Duration::from_secs(settings.job_poll_interval_seconds.max(1));
    let idle_sleep = Duration::from_secs(settings.job_idle_sleep_seconds.max(1));
    let cleanup_every_ticks =
        (CLEANUP_CADENCE_SECONDS / settings.job_idle_sleep_seconds.max(1)).max(1);
    let mut idle_ticks: u64 = 0;

    loop {
        match job_queue::claim_next(&ctx.db).await {
            Ok(Some(job)) => {
                idle_ticks = 0;
                if let Err(e) = dispatch(&ctx, &job.id, &job.job_type).await {
                    error!("pipeline driver: dispatch failed for job {}: {e}", job.id);
                }
            }
            Ok(None) => {
                idle_ticks += 1;
                if task_index == 0 && idle_ticks % cleanup_every_ticks == 0 {
                    run_idle_pass(&ctx).await;
                }
                tokio::time::sleep(idle_sleep).await;
            }
            Err(e) => {
                warn!("pipeline driver: claim_next failed: {e}");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

/// Hands a freshly claimed job off to the `BackgroundWorker` matching its
/// `job_type`, via `perform_later` (§4.H: "dispatches to the matching
/// `BackgroundWorker::perform_later`").
async fn dispatch(ctx: &AppContext, job_id: &str, job_type: &str) -> Result<()> {
    match job_type {
        JOB_TYPE_SYNC_EVENT => {
            SyncEventWorker::perform_later(
                ctx,
                SyncArgs {
                    job_id: job_id.to_string(),
                },
            )
            .await
        }
        JOB_TYPE_CLUSTER_EVENT => {
            ClusterEventWorker::perform_later(
                ctx,
                ClusterArgs {
                    job_id: job_id.to_string(),
                },
            )
            .await
        }
        JOB_TYPE_MATCH_GUEST => {
            MatchGuestWorker::perform_later(
                ctx,
                MatchArgs {
                    job_id: job_id.to_string(),
                },
            )
            .await
        }
        other => Err(Error::Message(format!("unsupported job type: {other}"))),
    }
}

async fn run_idle_pass(ctx: &AppContext) {
    let deps = match build_deps(ctx) {
        Ok(deps) => deps,
        Err(e) => {
            warn!("pipeline driver: failed to build dependencies for idle pass: {e}");
            return;
        }
    };

    match pipeline_worker::cleanup_expired_selfies(&deps).await {
        Ok(count) if count > 0 => tracing::info!("cleaned up {count} expired selfie(s)"),
        Ok(_) => {}
        Err(e) => warn!("pipeline driver: selfie cleanup failed: {e}"),
    }

    match pipeline_worker::auto_refresh_stale_events(&deps).await {
        Ok(count) if count > 0 => tracing::info!("auto-refresh enqueued {count} sync job(s)"),
        Ok(_) => {}
        Err(e) => warn!("pipeline driver: auto-refresh pass failed: {e}"),
    }
}
