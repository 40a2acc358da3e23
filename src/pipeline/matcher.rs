//! Matcher (component F): scores a selfie embedding against an event's
//! indexed faces, aggregates per photo, and applies strict + adaptively
//! relaxed threshold selection with a top-margin filter.
//!
//! Deliberately linear and deterministic given its inputs (§4.F rationale):
//! all face-size calibration and small-face leniency already happened in
//! the Face Engine's filtering thresholds.

use std::collections::HashMap;

use crate::common::calibration::cosine_to_percent;
use crate::pipeline::embedding_store::EventFace;

#[derive(Debug, Clone, Copy)]
pub struct MatchParams {
    pub strict_threshold_percent: f32,
    pub top_margin: f32,
    pub relax_drop: f32,
    pub relax_min_threshold: f32,
    pub max_results: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub photo_id: i32,
    pub score_ratio: f32,
    pub rank: u32,
}

#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub rows: Vec<MatchRow>,
    pub used_threshold_percent: f32,
    pub relaxed: bool,
}

/// Scores `selfie_embedding` (assumed unit-norm, per §4.F) against every
/// `EventFace`, applying strict selection and adaptive relaxation.
#[must_use]
pub fn match_selfie(
    selfie_embedding: &[f32],
    faces: &[EventFace],
    params: &MatchParams,
) -> MatchOutcome {
    if faces.is_empty() {
        return MatchOutcome {
            rows: Vec::new(),
            used_threshold_percent: params.strict_threshold_percent,
            relaxed: false,
        };
    }

    let per_photo_best = aggregate_best_percent_per_photo(selfie_embedding, faces);
    if per_photo_best.is_empty() {
        return MatchOutcome {
            rows: Vec::new(),
            used_threshold_percent: params.strict_threshold_percent,
            relaxed: false,
        };
    }

    let strict_selected = select_with_threshold(
        &per_photo_best,
        params.strict_threshold_percent,
        params.top_margin,
    );

    let (selected, used_threshold, relaxed) = if strict_selected.is_empty() {
        let relaxed_threshold =
            (params.strict_threshold_percent - params.relax_drop.max(0.0)).max(params.relax_min_threshold);
        let relaxed_margin = params.top_margin.max(10.0);
        let relaxed_selected =
            select_with_threshold(&per_photo_best, relaxed_threshold, relaxed_margin);
        (relaxed_selected, relaxed_threshold, true)
    } else {
        (strict_selected, params.strict_threshold_percent, false)
    };

    let mut ranked: Vec<MatchRow> = selected
        .into_iter()
        .take(params.max_results)
        .enumerate()
        .map(|(i, (photo_id, percent))| MatchRow {
            photo_id,
            score_ratio: percent / 100.0,
            rank: i as u32 + 1,
        })
        .collect();
    ranked.truncate(params.max_results);

    MatchOutcome {
        rows: ranked,
        used_threshold_percent: used_threshold,
        relaxed,
    }
}

/// Vectorized cosine score per face, aggregated to the maximum percent per
/// photo. Zero-norm rows score 0 rather than NaN.
fn aggregate_best_percent_per_photo(
    selfie_embedding: &[f32],
    faces: &[EventFace],
) -> Vec<(i32, f32)> {
    let selfie_norm: f32 = selfie_embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
    let mut best: HashMap<i32, f32> = HashMap::new();

    for face in faces {
        let face_norm: f32 = face.embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        let cosine = if selfie_norm <= 1e-6 || face_norm <= 1e-6 {
            0.0
        } else {
            let dot: f32 = selfie_embedding
                .iter()
                .zip(face.embedding.iter())
                .map(|(a, b)| a * b)
                .sum();
            dot / (selfie_norm * face_norm)
        };
        let percent = cosine_to_percent(cosine);
        best.entry(face.photo_id)
            .and_modify(|existing| {
                if percent > *existing {
                    *existing = percent;
                }
            })
            .or_insert(percent);
    }

    let mut rows: Vec<(i32, f32)> = best.into_iter().collect();
    rows.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    rows
}

/// Keeps photos at or above `threshold`, then applies the top-margin filter
/// relative to the best surviving score. `per_photo_best` must already be
/// sorted descending by percent.
fn select_with_threshold(
    per_photo_best: &[(i32, f32)],
    threshold: f32,
    margin: f32,
) -> Vec<(i32, f32)> {
    let above_threshold: Vec<(i32, f32)> = per_photo_best
        .iter()
        .copied()
        .filter(|&(_, percent)| percent >= threshold)
        .collect();
    let Some(&(_, best)) = above_threshold.first() else {
        return Vec::new();
    };
    let floor = threshold.max(best - margin);
    above_threshold
        .into_iter()
        .filter(|&(_, percent)| percent >= floor)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn unit(v: Vec<f32>) -> Vec<f32> {
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        v.into_iter().map(|x| x / norm).collect()
    }

    fn face(photo_id: i32, embedding: Vec<f32>) -> EventFace {
        EventFace { face_id: photo_id, photo_id, embedding }
    }

    fn default_params() -> MatchParams {
        MatchParams {
            strict_threshold_percent: 90.0,
            top_margin: 8.0,
            relax_drop: 8.0,
            relax_min_threshold: 78.0,
            max_results: 160,
        }
    }

    #[test]
    fn empty_event_returns_no_matches() {
        let outcome = match_selfie(&unit(vec![1.0, 0.0]), &[], &default_params());
        assert!(outcome.rows.is_empty());
        assert!(!outcome.relaxed);
    }

    #[test]
    fn strict_threshold_selects_only_close_matches() {
        let selfie = unit(vec![1.0, 0.0]);
        let faces = vec![
            face(1, unit(vec![1.0, 0.0])),   // cosine 1.0 -> 100%
            face(2, unit(vec![0.0, 1.0])),   // cosine 0.0 -> 0%
        ];
        let outcome = match_selfie(&selfie, &faces, &default_params());
        assert!(!outcome.relaxed);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].photo_id, 1);
        assert_eq!(outcome.rows[0].rank, 1);
    }

    #[rstest]
    #[case(90.0, 8.0, 8.0, 78.0)]
    fn adaptive_relaxation_fires_when_strict_selection_is_empty(
        #[case] strict: f32,
        #[case] margin: f32,
        #[case] drop: f32,
        #[case] floor: f32,
    ) {
        // cosine ~0.7 maps to ~(0.7-0.15)/0.37*100 = ~148% clamped to 100... so pick a cosine
        // that lands the percent in the 85-88 range the spec's scenario 5 describes directly.
        let mut selfie = vec![1.0, 0.0];
        // cosine(selfie, candidate) chosen so percent ~86%
        let target_percent = 86.0f32;
        let target_cosine = crate::common::calibration::percent_to_cosine_threshold(target_percent);
        let candidate = vec![target_cosine, (1.0 - target_cosine * target_cosine).sqrt()];
        selfie = unit(selfie);
        let faces = vec![face(1, unit(candidate))];

        let params = MatchParams {
            strict_threshold_percent: strict,
            top_margin: margin,
            relax_drop: drop,
            relax_min_threshold: floor,
            max_results: 160,
        };
        let outcome = match_selfie(&selfie, &faces, &params);
        assert!(outcome.relaxed);
        assert_eq!(outcome.used_threshold_percent, (strict - drop).max(floor));
        assert_eq!(outcome.rows.len(), 1);
    }

    #[test]
    fn per_photo_aggregation_keeps_the_maximum_face_score() {
        let selfie = unit(vec![1.0, 0.0]);
        let faces = vec![
            face(1, unit(vec![0.1, 1.0])),
            face(1, unit(vec![0.99, 0.01])),
        ];
        let outcome = match_selfie(&selfie, &faces, &default_params());
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].photo_id, 1);
    }

    #[test]
    fn results_are_truncated_and_ranked_contiguously() {
        let selfie = unit(vec![1.0, 0.0]);
        let faces: Vec<EventFace> = (0..5)
            .map(|i| face(i, unit(vec![1.0 - i as f32 * 0.001, 0.001])))
            .collect();
        let params = MatchParams {
            strict_threshold_percent: 50.0,
            top_margin: 100.0,
            relax_drop: 8.0,
            relax_min_threshold: 30.0,
            max_results: 3,
        };
        let outcome = match_selfie(&selfie, &faces, &params);
        assert_eq!(outcome.rows.len(), 3);
        assert_eq!(outcome.rows.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        for pair in outcome.rows.windows(2) {
            assert!(pair[0].score_ratio >= pair[1].score_ratio);
        }
    }
}
