use std::path::Path;

use loco_rs::{
    app::{AppContext, Hooks, Initializer},
    bgworker::{BackgroundWorker, Queue},
    boot::{create_app, BootResult, StartMode},
    config::Config,
    controller::AppRoutes,
    db::truncate_table,
    environment::Environment,
    Result,
};
use migration::Migrator;

use crate::initializers::pipeline_driver::PipelineDriverInitializer;
use crate::models::_entities::{
    events, face_clusters, faces, guest_queries, guest_results, jobs, photos, users,
};
use crate::workers::cluster_event::ClusterEventWorker;
use crate::workers::match_guest::MatchGuestWorker;
use crate::workers::sync_event::SyncEventWorker;

pub struct App;

#[async_trait::async_trait]
impl Hooks for App {
    fn app_name() -> &'static str {
        env!("CARGO_CRATE_NAME")
    }

    fn app_version() -> String {
        format!(
            "{}-{}",
            env!("CARGO_PKG_VERSION"),
            option_env!("BUILD_SHA")
                .or(option_env!("GITHUB_SHA"))
                .unwrap_or("dev")
        )
    }

    async fn boot(
        mode: StartMode,
        environment: &Environment,
        config: Config,
    ) -> Result<BootResult> {
        create_app::<Self, Migrator>(mode, environment, config).await
    }

    async fn initializers(_ctx: &AppContext) -> Result<Vec<Box<dyn Initializer>>> {
        Ok(vec![Box::new(PipelineDriverInitializer)])
    }

    fn routes(_ctx: &AppContext) -> AppRoutes {
        AppRoutes::with_default_routes()
    }

    async fn connect_workers(ctx: &AppContext, queue: &Queue) -> Result<()> {
        queue.register(SyncEventWorker::build(ctx)).await?;
        queue.register(ClusterEventWorker::build(ctx)).await?;
        queue.register(MatchGuestWorker::build(ctx)).await?;
        Ok(())
    }

    async fn truncate(ctx: &AppContext) -> Result<()> {
        truncate_table(&ctx.db, jobs::Entity).await?;
        truncate_table(&ctx.db, guest_results::Entity).await?;
        truncate_table(&ctx.db, guest_queries::Entity).await?;
        truncate_table(&ctx.db, faces::Entity).await?;
        truncate_table(&ctx.db, face_clusters::Entity).await?;
        truncate_table(&ctx.db, photos::Entity).await?;
        truncate_table(&ctx.db, events::Entity).await?;
        truncate_table(&ctx.db, users::Entity).await?;
        Ok(())
    }

    async fn seed(_ctx: &AppContext, _base: &Path) -> Result<()> {
        Ok(())
    }
}
