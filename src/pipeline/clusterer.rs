//! Clusterer (component E): DBSCAN over cosine distance.
//!
//! The teacher's later worker snapshot pulled in the `hdbscan` crate, but
//! that crate is hierarchical and Euclidean-only — it exposes
//! `min_cluster_size`, not the flat epsilon-radius, cosine-metric contract
//! this component needs. For unit vectors, cosine distance relates to
//! squared Euclidean distance by `‖a-b‖² = 2(1 - cos(a,b))`, so DBSCAN is
//! implemented directly against `1 - cos(a,b)` rather than converting
//! metrics through a crate that doesn't expose this shape.

use std::collections::HashMap;

use thiserror::Error;

use crate::pipeline::embedding_store::{
    self, photos_for_event, ClusterWrite, EmbeddingStoreError, EventFace,
};
use sea_orm::{ConnectionTrait, TransactionTrait};

#[derive(Debug, Error)]
pub enum ClustererError {
    #[error(transparent)]
    Store(#[from] EmbeddingStoreError),
    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),
}

/// Label `-1` (DBSCAN noise) is represented as `None`; any other label is
/// `Some(k)` for a zero-based cluster index assigned in discovery order.
pub struct DbscanResult {
    /// Parallel to the input slice: one label per face.
    pub labels: Vec<Option<i32>>,
    pub cluster_count: usize,
}

/// Flat DBSCAN over cosine distance `1 - cos(a, b)`, assuming all input
/// vectors are already L2-normalized (true for every stored embedding).
#[must_use]
pub fn dbscan_cosine(faces: &[EventFace], eps: f32, min_samples: usize) -> DbscanResult {
    let n = faces.len();
    let mut labels: Vec<Option<i32>> = vec![None; n];
    let mut visited = vec![false; n];
    let mut next_label = 0i32;

    let neighbors = |i: usize| -> Vec<usize> {
        (0..n)
            .filter(|&j| j != i && cosine_distance(&faces[i].embedding, &faces[j].embedding) <= eps)
            .collect()
    };

    for i in 0..n {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let mut seed_set = neighbors(i);
        if seed_set.len() + 1 < min_samples {
            continue; // tentatively noise; may still be absorbed as a border point below
        }

        let label = next_label;
        next_label += 1;
        labels[i] = Some(label);

        let mut cursor = 0;
        while cursor < seed_set.len() {
            let j = seed_set[cursor];
            cursor += 1;
            if !visited[j] {
                visited[j] = true;
                let j_neighbors = neighbors(j);
                if j_neighbors.len() + 1 >= min_samples {
                    for candidate in j_neighbors {
                        if !seed_set.contains(&candidate) {
                            seed_set.push(candidate);
                        }
                    }
                }
            }
            if labels[j].is_none() {
                labels[j] = Some(label);
            }
        }
    }

    DbscanResult {
        labels,
        cluster_count: next_label as usize,
    }
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (1.0 - dot).max(0.0)
}

/// Builds the `FaceCluster` write set from a label assignment: centroid,
/// face_count, and cover_photo_id (the photo contributing the most member
/// faces, ties broken by first-seen order).
#[must_use]
pub fn build_cluster_writes(faces: &[EventFace], labels: &[Option<i32>]) -> Vec<ClusterWrite> {
    let mut by_label: HashMap<i32, Vec<usize>> = HashMap::new();
    for (idx, label) in labels.iter().enumerate() {
        if let Some(l) = label {
            by_label.entry(*l).or_default().push(idx);
        }
    }

    let mut writes: Vec<ClusterWrite> = by_label
        .into_iter()
        .map(|(label, member_indices)| {
            let dim = faces[member_indices[0]].embedding.len();
            let mut centroid = vec![0.0f32; dim];
            for &idx in &member_indices {
                for (c, v) in centroid.iter_mut().zip(faces[idx].embedding.iter()) {
                    *c += v;
                }
            }
            for c in &mut centroid {
                *c /= member_indices.len() as f32;
            }
            let norm: f32 = centroid.iter().map(|v| v * v).sum::<f32>().sqrt();
            if norm > 1e-6 {
                for c in &mut centroid {
                    *c /= norm;
                }
            }

            let mut counts: HashMap<i32, (usize, usize)> = HashMap::new(); // photo_id -> (count, first_seen_order)
            for (order, &idx) in member_indices.iter().enumerate() {
                let entry = counts.entry(faces[idx].photo_id).or_insert((0, order));
                entry.0 += 1;
            }
            let cover_photo_id = counts
                .into_iter()
                .max_by_key(|&(_, (count, first_seen))| (count, std::cmp::Reverse(first_seen)))
                .map(|(photo_id, _)| photo_id);

            ClusterWrite {
                cluster_label: label,
                centroid,
                face_count: member_indices.len() as i32,
                cover_photo_id,
            }
        })
        .collect();

    writes.sort_by_key(|c| c.cluster_label);
    writes
}

/// Runs the full cluster job for one event: loads faces, clusters them,
/// rewrites the FaceCluster set, and writes `cluster_label` back onto every
/// Face, all inside one transaction (§4.E), so a crash mid-run can never
/// leave `Face.cluster_label` pointing at a label with no matching
/// `FaceCluster` row.
///
/// # Errors
/// If any read/write against the store fails, or the transaction fails to
/// commit.
pub async fn cluster_event<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    event_id: &str,
    eps: f32,
    min_samples: usize,
) -> Result<usize, ClustererError> {
    let txn = db.begin().await?;
    let faces = embedding_store::faces_for_event(&txn, event_id).await?;
    // touched only to keep the event's photo set warm in callers that log counts
    let _ = photos_for_event(&txn, event_id).await?;

    if faces.len() < min_samples {
        embedding_store::rewrite_clusters(&txn, event_id, &[]).await?;
        let assignments: Vec<(i32, Option<i32>)> = faces.iter().map(|f| (f.face_id, None)).collect();
        embedding_store::assign_cluster_labels(&txn, &assignments).await?;
        txn.commit().await?;
        return Ok(0);
    }

    let result = dbscan_cosine(&faces, eps, min_samples);
    let writes = build_cluster_writes(&faces, &result.labels);

    let assignments: Vec<(i32, Option<i32>)> = faces
        .iter()
        .zip(result.labels.iter())
        .map(|(f, label)| (f.face_id, *label))
        .collect();

    embedding_store::rewrite_clusters(&txn, event_id, &writes).await?;
    embedding_store::assign_cluster_labels(&txn, &assignments).await?;
    txn.commit().await?;

    Ok(result.cluster_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(photo_id: i32, embedding: Vec<f32>) -> EventFace {
        EventFace {
            face_id: photo_id,
            photo_id,
            embedding,
        }
    }

    fn unit(mut v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
        v
    }

    #[test]
    fn groups_near_identical_vectors_and_flags_far_ones_as_noise() {
        let faces = vec![
            face(1, unit(vec![1.0, 0.0, 0.0])),
            face(2, unit(vec![0.99, 0.01, 0.0])),
            face(3, unit(vec![0.0, 1.0, 0.0])),
        ];
        let result = dbscan_cosine(&faces, 0.05, 2);
        assert_eq!(result.labels[0], result.labels[1]);
        assert!(result.labels[0].is_some());
        assert_eq!(result.labels[2], None);
        assert_eq!(result.cluster_count, 1);
    }

    #[test]
    fn below_min_samples_everything_is_noise() {
        let faces = vec![
            face(1, unit(vec![1.0, 0.0])),
            face(2, unit(vec![0.0, 1.0])),
        ];
        let result = dbscan_cosine(&faces, 0.5, 3);
        assert!(result.labels.iter().all(Option::is_none));
        assert_eq!(result.cluster_count, 0);
    }

    #[test]
    fn cover_photo_is_the_one_with_the_most_member_faces() {
        let faces = vec![
            face(10, unit(vec![1.0, 0.0])),
            face(10, unit(vec![0.99, 0.01])),
            face(20, unit(vec![0.98, 0.02])),
        ];
        let labels = vec![Some(0), Some(0), Some(0)];
        let writes = build_cluster_writes(&faces, &labels);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].face_count, 3);
        assert_eq!(writes[0].cover_photo_id, Some(10));
    }
}
