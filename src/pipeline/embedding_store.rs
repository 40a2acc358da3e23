//! Embedding Store (component D).
//!
//! Thin `sea-orm` access layer over `faces`, `face_clusters`, and `photos`.
//! Centralizes the read/write shape so the clusterer and matcher never touch
//! `sea_orm::Statement` directly.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};
use thiserror::Error;

use crate::common::vector::{validate_dimension, VectorError};
use crate::models::_entities::face_clusters::{self, Entity as FaceClusters};
use crate::models::_entities::faces::{self, Entity as Faces};
use crate::models::_entities::guest_results::{self, Entity as GuestResults};
use crate::models::_entities::photos::{self, Entity as Photos};
use crate::pipeline::face_engine::FaceEmbedding;
use crate::pipeline::matcher::MatchRow;
use crate::pipeline::remote_client::RemoteFile;

#[derive(Debug, Error)]
pub enum EmbeddingStoreError {
    #[error("database error: {0}")]
    Db(#[from] DbErr),
    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// One face's embedding, tagged with the photo it belongs to; the unit the
/// clusterer and matcher both operate on.
#[derive(Debug, Clone)]
pub struct EventFace {
    pub face_id: i32,
    pub photo_id: i32,
    pub embedding: Vec<f32>,
}

/// Inserts Face rows for `photo_id`/`event_id`, assigning sequential
/// `face_index` values starting at 0.
///
/// # Errors
/// If any insert fails, or if a face's embedding is not exactly
/// [`crate::common::vector::EMBEDDING_DIM`]-dimensional (§4.I).
pub async fn insert_faces<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
    photo_id: i32,
    faces: &[FaceEmbedding],
) -> Result<(), EmbeddingStoreError> {
    for face in faces {
        validate_dimension(&face.embedding)?;
    }
    let now = Utc::now().into();
    for (index, face) in faces.iter().enumerate() {
        let active = faces::ActiveModel {
            id: Default::default(),
            created_at: Set(now),
            updated_at: Set(now),
            event_id: Set(event_id.to_string()),
            photo_id: Set(photo_id),
            face_index: Set(index as i32),
            embedding: Set(face.embedding.clone()),
            area_ratio: Set(face.area_ratio),
            det_confidence: Set(face.det_confidence),
            sharpness: Set(face.sharpness),
            bbox_x: Set(face.bbox.x),
            bbox_y: Set(face.bbox.y),
            bbox_w: Set(face.bbox.w),
            bbox_h: Set(face.bbox.h),
            cluster_label: Set(None),
        };
        active.insert(db).await?;
    }
    Ok(())
}

/// Deletes all Face rows for `photo_id`.
///
/// # Errors
/// If the delete fails.
pub async fn delete_faces_for_photo<C: ConnectionTrait>(
    db: &C,
    photo_id: i32,
) -> Result<(), EmbeddingStoreError> {
    Faces::delete_many()
        .filter(faces::Column::PhotoId.eq(photo_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Streams every Face belonging to `event_id`, ordered by `(photo_id,
/// face_index)` as required by the clusterer's determinism invariant.
///
/// # Errors
/// If the query fails.
pub async fn faces_for_event<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
) -> Result<Vec<EventFace>, EmbeddingStoreError> {
    let rows = Faces::find()
        .filter(faces::Column::EventId.eq(event_id))
        .order_by_asc(faces::Column::PhotoId)
        .order_by_asc(faces::Column::FaceIndex)
        .all(db)
        .await?;
    Ok(rows
        .into_iter()
        .map(|m| EventFace {
            face_id: m.id,
            photo_id: m.photo_id,
            embedding: m.embedding,
        })
        .collect())
}

/// Writes `cluster_label` on every Face row named in `assignments`
/// (face_id -> label, `None` for noise).
///
/// # Errors
/// If any update fails.
pub async fn assign_cluster_labels<C: ConnectionTrait>(
    db: &C,
    assignments: &[(i32, Option<i32>)],
) -> Result<(), EmbeddingStoreError> {
    for (face_id, label) in assignments {
        if let Some(model) = Faces::find_by_id(*face_id).one(db).await? {
            let mut active: faces::ActiveModel = model.into();
            active.cluster_label = Set(*label);
            active.updated_at = Set(Utc::now().into());
            active.update(db).await?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ClusterWrite {
    pub cluster_label: i32,
    pub centroid: Vec<f32>,
    pub face_count: i32,
    pub cover_photo_id: Option<i32>,
}

/// Replaces the entire FaceCluster set for `event_id` with `clusters`.
///
/// Does not open its own transaction: `cluster_event` (§4.E: "the cluster
/// job always runs inside a single transaction") passes the transaction it
/// shares with [`assign_cluster_labels`], so the two writers stay consistent.
///
/// # Errors
/// If a delete/insert fails, or if a centroid is not
/// [`crate::common::vector::EMBEDDING_DIM`]-dimensional.
pub async fn rewrite_clusters<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
    clusters: &[ClusterWrite],
) -> Result<(), EmbeddingStoreError> {
    for cluster in clusters {
        validate_dimension(&cluster.centroid)?;
    }
    FaceClusters::delete_many()
        .filter(face_clusters::Column::EventId.eq(event_id))
        .exec(db)
        .await?;
    let now = Utc::now().into();
    for cluster in clusters {
        let active = face_clusters::ActiveModel {
            id: Default::default(),
            created_at: Set(now),
            updated_at: Set(now),
            event_id: Set(event_id.to_string()),
            cluster_label: Set(cluster.cluster_label),
            centroid: Set(cluster.centroid.clone()),
            face_count: Set(cluster.face_count),
            cover_photo_id: Set(cluster.cover_photo_id),
        };
        active.insert(db).await?;
    }
    Ok(())
}

/// Whether `event_id` already has any FaceCluster rows, used by the sync
/// job's re-cluster decision (§4.H step h).
///
/// # Errors
/// If the query fails.
pub async fn has_clusters_for_event<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
) -> Result<bool, EmbeddingStoreError> {
    let count = FaceClusters::find()
        .filter(face_clusters::Column::EventId.eq(event_id))
        .count(db)
        .await?;
    Ok(count > 0)
}

/// All Photos belonging to `event_id`.
///
/// # Errors
/// If the query fails.
pub async fn photos_for_event<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
) -> Result<Vec<photos::Model>, EmbeddingStoreError> {
    Ok(Photos::find()
        .filter(photos::Column::EventId.eq(event_id))
        .all(db)
        .await?)
}

/// Photos matching `ids`, used to resolve matcher output (photo_id -> Photo)
/// without loading the whole event.
///
/// # Errors
/// If the query fails.
pub async fn photos_by_ids<C: ConnectionTrait>(
    db: &C,
    ids: &[i32],
) -> Result<Vec<photos::Model>, EmbeddingStoreError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(Photos::find()
        .filter(photos::Column::Id.is_in(ids.iter().copied()))
        .all(db)
        .await?)
}

/// Finds the existing Photo for `(event_id, remote_file_id)`, if any.
///
/// # Errors
/// If the query fails.
pub async fn find_photo<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
    remote_file_id: &str,
) -> Result<Option<photos::Model>, EmbeddingStoreError> {
    Ok(Photos::find()
        .filter(photos::Column::EventId.eq(event_id))
        .filter(photos::Column::RemoteFileId.eq(remote_file_id))
        .one(db)
        .await?)
}

/// Creates or updates the Photo row for `(event_id, remote_file.id)`,
/// stamping `content_stamp` and `thumbnail_relative_path` from the current
/// refresh. Returns the row's id.
///
/// # Errors
/// If the insert/update fails.
pub async fn upsert_photo<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
    remote_file: &RemoteFile,
    thumbnail_relative_path: &str,
) -> Result<i32, EmbeddingStoreError> {
    let now = Utc::now().into();
    let existing = find_photo(db, event_id, &remote_file.id).await?;
    let id = if let Some(model) = existing {
        let id = model.id;
        let mut active: photos::ActiveModel = model.into();
        active.file_name = Set(remote_file.name.clone());
        active.mime = Set(remote_file.mime_type.clone());
        active.remote_view_url = Set(remote_file.web_view_link.clone());
        active.thumbnail_relative_path = Set(Some(thumbnail_relative_path.to_string()));
        active.content_stamp = Set(remote_file.content_stamp());
        active.status = Set("active".to_string());
        active.updated_at = Set(now);
        active.update(db).await?;
        id
    } else {
        let active = photos::ActiveModel {
            id: Default::default(),
            created_at: Set(now),
            updated_at: Set(now),
            event_id: Set(event_id.to_string()),
            remote_file_id: Set(remote_file.id.clone()),
            file_name: Set(remote_file.name.clone()),
            mime: Set(remote_file.mime_type.clone()),
            remote_view_url: Set(remote_file.web_view_link.clone()),
            remote_preview_url: Set(None),
            remote_download_url: Set(None),
            thumbnail_relative_path: Set(Some(thumbnail_relative_path.to_string())),
            content_stamp: Set(remote_file.content_stamp()),
            status: Set("active".to_string()),
        };
        active.insert(db).await?.id
    };
    Ok(id)
}

/// Deletes every Photo for `event_id` whose `remote_file_id` is not in
/// `keep_remote_ids` (§4.H step g: closed-world sync). Cascades to Faces
/// and GuestResults via the FK constraints.
///
/// # Errors
/// If the query/delete fails.
pub async fn delete_photos_not_in<C: ConnectionTrait>(
    db: &C,
    event_id: &str,
    keep_remote_ids: &[String],
) -> Result<u64, EmbeddingStoreError> {
    let mut query = Photos::delete_many().filter(photos::Column::EventId.eq(event_id));
    if keep_remote_ids.is_empty() {
        let result = query.exec(db).await?;
        return Ok(result.rows_affected);
    }
    query = query.filter(photos::Column::RemoteFileId.is_not_in(keep_remote_ids.iter().cloned()));
    let result = query.exec(db).await?;
    Ok(result.rows_affected)
}

/// Replaces every GuestResult row for `query_id` with `rows`, matching
/// ranks and scores from the matcher's output.
///
/// # Errors
/// If the delete/insert fails.
pub async fn rewrite_guest_results<C: ConnectionTrait>(
    db: &C,
    query_id: &str,
    rows: &[MatchRow],
) -> Result<(), EmbeddingStoreError> {
    GuestResults::delete_many()
        .filter(guest_results::Column::QueryId.eq(query_id))
        .exec(db)
        .await?;
    let now = Utc::now().into();
    for row in rows {
        let active = guest_results::ActiveModel {
            id: Default::default(),
            created_at: Set(now),
            updated_at: Set(now),
            query_id: Set(query_id.to_string()),
            photo_id: Set(row.photo_id),
            score: Set(row.score_ratio),
            rank: Set(row.rank as i32),
        };
        active.insert(db).await?;
    }
    Ok(())
}
