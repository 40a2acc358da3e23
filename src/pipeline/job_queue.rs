//! Job Queue (component G): a durable FIFO queue over the `jobs` table with
//! single-acquirer claim semantics and a two-step cancel handshake.
//!
//! Grounded in the teacher's later `crates/binaries/worker/src/jobs/management.rs`
//! `claim_next_job` idiom (a `FOR UPDATE SKIP LOCKED` claim wrapped in a
//! transaction) translated to `sea-orm`; falls back to a plain
//! select-then-update for backends without skip-locked support (sqlite, used
//! in tests), relying on the transaction's isolation instead.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseBackend,
    DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Statement,
    TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::_entities::jobs::{self, Entity as Jobs};

pub const JOB_TYPE_SYNC_EVENT: &str = "sync_event";
pub const JOB_TYPE_CLUSTER_EVENT: &str = "cluster_event";
pub const JOB_TYPE_MATCH_GUEST: &str = "match_guest";

pub const STATUS_QUEUED: &str = "queued";
pub const STATUS_RUNNING: &str = "running";
pub const STATUS_CANCEL_REQUESTED: &str = "cancel_requested";
pub const STATUS_CANCELED: &str = "canceled";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error("job {0} not found")]
    NotFound(String),
}

#[must_use]
pub fn is_terminal(status: &str) -> bool {
    matches!(status, STATUS_COMPLETED | STATUS_FAILED | STATUS_CANCELED)
}

/// Enqueues a new job in `queued` state.
///
/// # Errors
/// If the insert fails.
pub async fn enqueue(
    db: &DatabaseConnection,
    job_type: &str,
    event_id: Option<String>,
    query_id: Option<String>,
    payload: serde_json::Value,
    stage: &str,
) -> Result<jobs::Model, JobQueueError> {
    let now = Utc::now().into();
    let active = jobs::ActiveModel {
        id: Set(fastrand_id()),
        created_at: Set(now),
        updated_at: Set(now),
        job_type: Set(job_type.to_string()),
        event_id: Set(event_id),
        query_id: Set(query_id),
        status: Set(STATUS_QUEUED.to_string()),
        progress_percent: Set(0),
        stage: Set(Some(stage.to_string())),
        error_text: Set(None),
        payload: Set(payload),
        attempts: Set(0),
        locked_at: Set(None),
        started_at: Set(None),
        completed_at: Set(None),
    };
    Ok(active.insert(db).await?)
}

/// Atomically claims the oldest `queued` job and transitions it to `running`.
///
/// # Errors
/// If the underlying transaction or queries fail.
pub async fn claim_next(db: &DatabaseConnection) -> Result<Option<jobs::Model>, JobQueueError> {
    let txn = db.begin().await?;
    let backend = txn.get_db_backend();

    let candidate_id: Option<String> = if backend == DatabaseBackend::Postgres {
        let stmt = Statement::from_string(
            backend,
            format!(
                "SELECT id FROM jobs WHERE status = '{STATUS_QUEUED}' ORDER BY created_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED"
            ),
        );
        txn.query_one(stmt)
            .await?
            .map(|row| row.try_get::<String>("", "id"))
            .transpose()?
    } else {
        Jobs::find()
            .filter(jobs::Column::Status.eq(STATUS_QUEUED))
            .order_by_asc(jobs::Column::CreatedAt)
            .one(&txn)
            .await?
            .map(|m| m.id)
    };

    let Some(id) = candidate_id else {
        txn.commit().await?;
        return Ok(None);
    };

    let Some(model) = Jobs::find_by_id(id).one(&txn).await? else {
        txn.commit().await?;
        return Ok(None);
    };

    let now = Utc::now().into();
    let mut active: jobs::ActiveModel = model.into();
    active.status = Set(STATUS_RUNNING.to_string());
    active.started_at = Set(Some(now));
    active.locked_at = Set(Some(now));
    active.attempts = Set(*active.attempts.as_ref() + 1);
    active.stage = Set(Some("running".to_string()));
    active.updated_at = Set(now);
    let claimed = active.update(&txn).await?;
    txn.commit().await?;
    Ok(Some(claimed))
}

/// Re-reads a job's current status, cheaply, for cooperative cancel checks.
///
/// # Errors
/// If the query fails or the job no longer exists.
pub async fn current_status(
    db: &DatabaseConnection,
    job_id: &str,
) -> Result<String, JobQueueError> {
    Jobs::find_by_id(job_id)
        .one(db)
        .await?
        .map(|m| m.status)
        .ok_or_else(|| JobQueueError::NotFound(job_id.to_string()))
}

/// True if `event_id` already has a `sync_event` or `cluster_event` job in
/// a non-terminal state, used by the auto-refresh pass to avoid double
/// enqueueing a sync for an event already being worked on.
///
/// # Errors
/// If the query fails.
pub async fn has_active_job_for_event(
    db: &DatabaseConnection,
    event_id: &str,
) -> Result<bool, JobQueueError> {
    let count = Jobs::find()
        .filter(jobs::Column::EventId.eq(event_id))
        .filter(
            jobs::Column::JobType
                .eq(JOB_TYPE_SYNC_EVENT)
                .or(jobs::Column::JobType.eq(JOB_TYPE_CLUSTER_EVENT)),
        )
        .filter(
            jobs::Column::Status
                .eq(STATUS_QUEUED)
                .or(jobs::Column::Status.eq(STATUS_RUNNING))
                .or(jobs::Column::Status.eq(STATUS_CANCEL_REQUESTED)),
        )
        .count(db)
        .await?;
    Ok(count > 0)
}

/// # Errors
/// If the update fails.
pub async fn mark_progress(
    db: &DatabaseConnection,
    job_id: &str,
    percent: i32,
    stage: &str,
) -> Result<(), JobQueueError> {
    let model = Jobs::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or_else(|| JobQueueError::NotFound(job_id.to_string()))?;
    let mut active: jobs::ActiveModel = model.into();
    active.progress_percent = Set(percent.clamp(0, 100));
    active.stage = Set(Some(stage.to_string()));
    active.updated_at = Set(Utc::now().into());
    active.update(db).await?;
    Ok(())
}

/// Merges `updates` (a serialized payload struct) into the job's free-form
/// payload column, overwriting any keys present in both.
///
/// # Errors
/// If the job is missing or the update fails.
pub async fn upsert_payload(
    db: &DatabaseConnection,
    job_id: &str,
    updates: &impl Serialize,
) -> Result<(), JobQueueError> {
    let model = Jobs::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or_else(|| JobQueueError::NotFound(job_id.to_string()))?;
    let mut merged = model.payload.clone();
    let update_value = serde_json::to_value(updates).unwrap_or(serde_json::Value::Null);
    if let (Some(merged_obj), serde_json::Value::Object(update_obj)) =
        (merged.as_object_mut(), update_value)
    {
        for (k, v) in update_obj {
            merged_obj.insert(k, v);
        }
    } else {
        merged = serde_json::to_value(updates).unwrap_or(serde_json::Value::Null);
    }
    let mut active: jobs::ActiveModel = model.into();
    active.payload = Set(merged);
    active.updated_at = Set(Utc::now().into());
    active.update(db).await?;
    Ok(())
}

/// # Errors
/// If the job is missing or the update fails.
pub async fn complete(
    db: &DatabaseConnection,
    job_id: &str,
    stage: &str,
    payload: Option<serde_json::Value>,
) -> Result<(), JobQueueError> {
    let model = Jobs::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or_else(|| JobQueueError::NotFound(job_id.to_string()))?;
    let now = Utc::now().into();
    let mut active: jobs::ActiveModel = model.into();
    active.status = Set(STATUS_COMPLETED.to_string());
    active.progress_percent = Set(100);
    active.stage = Set(Some(stage.to_string()));
    if let Some(p) = payload {
        active.payload = Set(p);
    }
    active.completed_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await?;
    Ok(())
}

/// # Errors
/// If the job is missing or the update fails.
pub async fn fail(
    db: &DatabaseConnection,
    job_id: &str,
    message: &str,
) -> Result<(), JobQueueError> {
    let model = Jobs::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or_else(|| JobQueueError::NotFound(job_id.to_string()))?;
    let mut active: jobs::ActiveModel = model.into();
    active.status = Set(STATUS_FAILED.to_string());
    active.stage = Set(Some("failed".to_string()));
    active.error_text = Set(Some(message.to_string()));
    active.updated_at = Set(Utc::now().into());
    active.update(db).await?;
    Ok(())
}

/// Marks a job as `canceled`, terminal. Used both when the worker observes
/// `cancel_requested` mid-run and when `request_cancel` catches a job that
/// was still `queued`.
///
/// Generic over `ConnectionTrait` so callers that must keep the coupled
/// Event/GuestQuery update and this finalize atomic (spec.md:170) can pass
/// an open transaction instead of the bare pool connection.
///
/// # Errors
/// If the job is missing or the update fails.
pub async fn finalize_canceled<C: ConnectionTrait>(
    db: &C,
    job_id: &str,
) -> Result<(), JobQueueError> {
    let model = Jobs::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or_else(|| JobQueueError::NotFound(job_id.to_string()))?;
    let now = Utc::now().into();
    let mut active: jobs::ActiveModel = model.into();
    active.status = Set(STATUS_CANCELED.to_string());
    active.stage = Set(Some("canceled".to_string()));
    active.completed_at = Set(Some(now));
    active.updated_at = Set(now);
    active.update(db).await?;
    Ok(())
}

/// The cancel handshake (§4.G): a no-op on terminal jobs, an immediate
/// cancel on `queued` jobs, and a `cancel_requested` flag on `running` jobs
/// for the worker to observe.
///
/// # Errors
/// If the job is missing or the update fails.
pub async fn request_cancel(db: &DatabaseConnection, job_id: &str) -> Result<(), JobQueueError> {
    let model = Jobs::find_by_id(job_id)
        .one(db)
        .await?
        .ok_or_else(|| JobQueueError::NotFound(job_id.to_string()))?;
    match model.status.as_str() {
        s if is_terminal(s) || s == STATUS_CANCEL_REQUESTED => Ok(()),
        STATUS_QUEUED => finalize_canceled(db, job_id).await,
        _ => {
            let mut active: jobs::ActiveModel = model.into();
            active.status = Set(STATUS_CANCEL_REQUESTED.to_string());
            active.updated_at = Set(Utc::now().into());
            active.update(db).await?;
            Ok(())
        }
    }
}

/// Short-hand for the per-unit-of-work cancellation checkpoint described in
/// §4.H: true when the worker should stop and finalize as canceled.
///
/// # Errors
/// If the status read fails.
pub async fn observe_cancel_requested(
    db: &DatabaseConnection,
    job_id: &str,
) -> Result<bool, JobQueueError> {
    Ok(current_status(db, job_id).await? == STATUS_CANCEL_REQUESTED)
}

fn fastrand_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    (0..22)
        .map(|_| ALPHABET[fastrand::usize(..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(is_terminal(STATUS_COMPLETED));
        assert!(is_terminal(STATUS_FAILED));
        assert!(is_terminal(STATUS_CANCELED));
        assert!(!is_terminal(STATUS_QUEUED));
        assert!(!is_terminal(STATUS_RUNNING));
        assert!(!is_terminal(STATUS_CANCEL_REQUESTED));
    }

    #[test]
    fn generated_ids_are_fixed_length_and_distinct() {
        let a = fastrand_id();
        let b = fastrand_id();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
    }
}
