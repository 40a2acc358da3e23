#![allow(elided_lifetimes_in_paths)]
#![allow(clippy::wildcard_imports)]
pub use sea_orm_migration::prelude::*;
mod m20200101_000001_pgvectors;
mod m20250300_000001_short_uuid_fn;
mod m20250301_000001_users;
mod m20250301_000002_events;
mod m20250301_000003_photos;
mod m20250301_000004_faces;
mod m20250301_000005_face_clusters;
mod m20250301_000006_jobs;
mod m20250301_000007_guest_queries;
mod m20250301_000008_guest_results;
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20200101_000001_pgvectors::Migration),
            Box::new(m20250300_000001_short_uuid_fn::Migration),
            Box::new(m20250301_000001_users::Migration),
            Box::new(m20250301_000002_events::Migration),
            Box::new(m20250301_000003_photos::Migration),
            Box::new(m20250301_000004_faces::Migration),
            Box::new(m20250301_000005_face_clusters::Migration),
            Box::new(m20250301_000006_jobs::Migration),
            Box::new(m20250301_000007_guest_queries::Migration),
            Box::new(m20250301_000008_guest_results::Migration),
            // inject-above (do not remove this comment)
        ]
    }
}
