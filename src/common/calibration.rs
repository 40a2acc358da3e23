//! Cosine-similarity to percent-score calibration.
//!
//! The affine mapping and its two constants are carried over unchanged from
//! the original matching service: a cosine of 0.15 or below maps to 0%, a
//! cosine of 0.52 or above maps to 100%, and the mapping is linear in
//! between.

pub const COSINE_MAP_FLOOR: f32 = 0.15;
pub const COSINE_MAP_SPAN: f32 = 0.37;

/// Maps a cosine similarity to a calibrated percent score in `[0, 100]`.
pub fn cosine_to_percent(cosine: f32) -> f32 {
    (((cosine - COSINE_MAP_FLOOR) / COSINE_MAP_SPAN) * 100.0).clamp(0.0, 100.0)
}

/// Inverse of [`cosine_to_percent`]: the cosine value a percent threshold
/// corresponds to. Used to compare a percent threshold against cosine-space
/// candidates without re-deriving the affine map at each call site.
pub fn percent_to_cosine_threshold(percent: f32) -> f32 {
    (percent / 100.0) * COSINE_MAP_SPAN + COSINE_MAP_FLOOR
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.15, 0.0)]
    #[case(0.52, 100.0)]
    #[case(0.0, 0.0)]
    #[case(1.0, 100.0)]
    fn clamps_at_bounds(#[case] cosine: f32, #[case] expected: f32) {
        assert!((cosine_to_percent(cosine) - expected).abs() < 1e-4);
    }

    #[test]
    fn round_trips_within_range() {
        for i in 0..=100 {
            let c = COSINE_MAP_FLOOR + COSINE_MAP_SPAN * (i as f32 / 100.0);
            let percent = cosine_to_percent(c);
            let back = percent_to_cosine_threshold(percent);
            assert!((back - c).abs() < 1e-4, "c={c} percent={percent} back={back}");
        }
    }
}
