//! Validation and normalization helpers for the embedding/centroid vector
//! columns.
//!
//! The `faces.embedding` and `face_clusters.centroid` columns are bound as
//! `Vec<f32>` through sea-orm's `custom("vector")` column type (see
//! `models/_entities/faces.rs`), so the typed entity path needs no parsing
//! help here; this module covers validating a vector's length before it is
//! ever bound (§4.I) plus the normalize/pad steps the Face Engine applies to
//! raw model output.

pub const EMBEDDING_DIM: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum VectorError {
    #[error("expected {expected}-dimensional vector, got {actual}")]
    WrongDimension { expected: usize, actual: usize },
}

/// Validates that `v` is exactly [`EMBEDDING_DIM`] long before a bind.
pub fn validate_dimension(v: &[f32]) -> Result<(), VectorError> {
    if v.len() == EMBEDDING_DIM {
        Ok(())
    } else {
        Err(VectorError::WrongDimension {
            expected: EMBEDDING_DIM,
            actual: v.len(),
        })
    }
}

/// L2-normalizes `v` in place; leaves `v` untouched if its norm is ~0.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
    if norm > 1e-6 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Pads with zeros or truncates `v` to exactly [`EMBEDDING_DIM`] elements.
pub fn pad_or_truncate(mut v: Vec<f32>) -> Vec<f32> {
    v.resize(EMBEDDING_DIM, 0.0);
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_pads() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        let padded = pad_or_truncate(v);
        assert_eq!(padded.len(), EMBEDDING_DIM);
    }

    #[test]
    fn rejects_wrong_dimension() {
        assert!(validate_dimension(&[0.0; 10]).is_err());
        assert!(validate_dimension(&[0.0; EMBEDDING_DIM]).is_ok());
    }
}
