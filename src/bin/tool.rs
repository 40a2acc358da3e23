//! Admin CLI for poking the durable job queue directly, bypassing the HTTP
//! surface entirely. Talks to the same Postgres database as the app via
//! `DATABASE_URL`, using the Job Queue component's own functions rather than
//! re-implementing any of its semantics.
//!
//! ```text
//! tool enqueue-sync   <event_id>
//! tool enqueue-match  <event_id> <query_id>
//! tool cancel         <job_id>
//! tool status         <job_id>
//! ```

use facematch_backend::pipeline::job_payload::{MatchPayload, SyncCounters};
use facematch_backend::pipeline::job_queue::{self, JOB_TYPE_MATCH_GUEST, JOB_TYPE_SYNC_EVENT};
use sea_orm::{Database, DatabaseConnection};

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let Some(command) = args.next() else {
        print_usage();
        std::process::exit(2);
    };

    let db = match connect().await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to connect to database: {e}");
            std::process::exit(1);
        }
    };

    let result = match command.as_str() {
        "enqueue-sync" => {
            let Some(event_id) = args.next() else {
                print_usage();
                std::process::exit(2);
            };
            enqueue_sync(&db, &event_id).await
        }
        "enqueue-match" => {
            let (Some(event_id), Some(query_id)) = (args.next(), args.next()) else {
                print_usage();
                std::process::exit(2);
            };
            enqueue_match(&db, &event_id, &query_id).await
        }
        "cancel" => {
            let Some(job_id) = args.next() else {
                print_usage();
                std::process::exit(2);
            };
            job_queue::request_cancel(&db, &job_id)
                .await
                .map(|()| format!("job {job_id} canceled"))
        }
        "status" => {
            let Some(job_id) = args.next() else {
                print_usage();
                std::process::exit(2);
            };
            job_queue::current_status(&db, &job_id)
                .await
                .map(|status| format!("job {job_id}: {status}"))
        }
        _ => {
            print_usage();
            std::process::exit(2);
        }
    };

    match result {
        Ok(message) => println!("{message}"),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

async fn connect() -> Result<DatabaseConnection, sea_orm::DbErr> {
    let url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/facematch_backend_development".to_string());
    Database::connect(url).await
}

async fn enqueue_sync(
    db: &DatabaseConnection,
    event_id: &str,
) -> Result<String, job_queue::JobQueueError> {
    let payload = SyncCounters {
        phase: "listing".to_string(),
        trigger: Some("admin_tool".to_string()),
        ..SyncCounters::default()
    };
    let job = job_queue::enqueue(
        db,
        JOB_TYPE_SYNC_EVENT,
        Some(event_id.to_string()),
        None,
        serde_json::to_value(&payload).unwrap_or_default(),
        "queued",
    )
    .await?;
    Ok(format!("enqueued sync_event job {}", job.id))
}

async fn enqueue_match(
    db: &DatabaseConnection,
    event_id: &str,
    query_id: &str,
) -> Result<String, job_queue::JobQueueError> {
    let payload = MatchPayload {
        phase: "queued".to_string(),
        ..MatchPayload::default()
    };
    let job = job_queue::enqueue(
        db,
        JOB_TYPE_MATCH_GUEST,
        Some(event_id.to_string()),
        Some(query_id.to_string()),
        serde_json::to_value(&payload).unwrap_or_default(),
        "queued",
    )
    .await?;
    Ok(format!("enqueued match_guest job {}", job.id))
}

fn print_usage() {
    eprintln!(
        "usage: tool <enqueue-sync <event_id> | enqueue-match <event_id> <query_id> | cancel <job_id> | status <job_id>>"
    );
}
