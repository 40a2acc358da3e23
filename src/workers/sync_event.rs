use loco_rs::prelude::*;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::_entities::jobs::Entity as Jobs;
use crate::pipeline::worker;
use crate::workers::{build_deps, cluster_event, recover_from_dispatch_error};

pub struct SyncEventWorker {
    pub ctx: AppContext,
}

#[derive(Deserialize, Debug, Serialize)]
pub struct WorkerArgs {
    pub job_id: String,
}

#[async_trait]
impl BackgroundWorker<WorkerArgs> for SyncEventWorker {
    fn build(ctx: &AppContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    async fn perform(&self, args: WorkerArgs) -> Result<()> {
        info!("======================= SyncEvent =======================");

        let deps = build_deps(&self.ctx)?;
        let job = Jobs::find_by_id(&args.job_id)
            .one(&self.ctx.db)
            .await?
            .ok_or_else(|| Error::Message(format!("job {} not found", args.job_id)))?;

        let follow_on = match worker::run_sync_job(&deps, &job).await {
            Ok(follow_on) => follow_on,
            Err(e) => {
                recover_from_dispatch_error(&self.ctx, &args.job_id, &e.to_string()).await;
                return Err(Error::Message(e.to_string()));
            }
        };

        if let Some(cluster_job_id) = follow_on {
            cluster_event::ClusterEventWorker::perform_later(
                &self.ctx,
                cluster_event::WorkerArgs {
                    job_id: cluster_job_id,
                },
            )
            .await?;
        }

        info!("✅ Successfully synced event for job {}", args.job_id);
        Ok(())
    }
}
