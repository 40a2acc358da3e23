use loco_rs::prelude::*;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::_entities::jobs::Entity as Jobs;
use crate::pipeline::worker;
use crate::workers::{build_deps, recover_from_dispatch_error};

pub struct ClusterEventWorker {
    pub ctx: AppContext,
}

#[derive(Deserialize, Debug, Serialize)]
pub struct WorkerArgs {
    pub job_id: String,
}

#[async_trait]
impl BackgroundWorker<WorkerArgs> for ClusterEventWorker {
    fn build(ctx: &AppContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    async fn perform(&self, args: WorkerArgs) -> Result<()> {
        info!("======================= ClusterEvent =======================");

        let deps = build_deps(&self.ctx)?;
        let job = Jobs::find_by_id(&args.job_id)
            .one(&self.ctx.db)
            .await?
            .ok_or_else(|| Error::Message(format!("job {} not found", args.job_id)))?;

        if let Err(e) = worker::run_cluster_job(&deps, &job).await {
            recover_from_dispatch_error(&self.ctx, &args.job_id, &e.to_string()).await;
            return Err(Error::Message(e.to_string()));
        }

        info!("✅ Successfully clustered event for job {}", args.job_id);
        Ok(())
    }
}
