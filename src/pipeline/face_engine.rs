//! Face Engine (component C).
//!
//! Lazily loads a detector/recognizer pair behind a `tokio::sync::Mutex`,
//! following the `WorkerContext`'s `media_analyzer: Mutex<...>` handle the
//! teacher's later worker snapshot used for the same purpose before it was
//! trimmed from this tree. Model weights are cached under the configured
//! `face_model_cache_dir` and fetched lazily on first use, mirroring that
//! snapshot's `handlers/common/cache.rs`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use image::{DynamicImage, GenericImageView};
use imageproc::filter::gaussian_blur_f32;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::common::settings::Settings;
use crate::common::vector::{l2_normalize, pad_or_truncate, EMBEDDING_DIM};

const DETECTOR_MODEL_FILE: &str = "yunet.onnx";
const RECOGNIZER_MODEL_FILE: &str = "sface.onnx";
const MIN_MODEL_BYTES: u64 = 1024;
const DETECTOR_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/face_detection_yunet/face_detection_yunet_2023mar.onnx";
const RECOGNIZER_MODEL_URL: &str =
    "https://github.com/opencv/opencv_zoo/raw/main/models/face_recognition_sface/face_recognition_sface_2021dec.onnx";

#[derive(Debug, Error)]
pub enum FaceEngineError {
    #[error("failed to decode image bytes")]
    DecodeFailed,
    #[error("model initialization failed: {0}")]
    ModelInitFailed(String),
    #[error("model download failed: {0}")]
    ModelDownloadFailed(String),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

#[derive(Debug, Clone)]
pub struct FaceEmbedding {
    pub embedding: Vec<f32>,
    pub area_ratio: f32,
    pub det_confidence: f32,
    pub sharpness: f32,
    pub bbox: BoundingBox,
}

/// Relaxed thresholds used when embedding a reference/selfie image, where
/// the subject may be farther from the camera than in event photos.
#[derive(Debug, Clone, Copy)]
pub struct DetectionProfile {
    pub min_face_ratio: f32,
    pub min_sharpness: f32,
    pub det_size: u32,
}

impl DetectionProfile {
    #[must_use]
    pub fn standard(settings: &Settings) -> Self {
        Self {
            min_face_ratio: settings.face_min_face_ratio,
            min_sharpness: settings.face_min_sharpness,
            det_size: settings.face_det_size,
        }
    }

    /// Reference-image variant (§4.C): looser ratio (~0.35x) and sharpness
    /// (~0.5x), higher detector input size, for selfies taken from distance.
    #[must_use]
    pub fn reference(settings: &Settings) -> Self {
        Self {
            min_face_ratio: settings.face_min_face_ratio * 0.35,
            min_sharpness: settings.face_min_sharpness * 0.5,
            det_size: settings.face_det_size * 2,
        }
    }
}

struct LoadedModels {
    detector: face_id::FaceDetector,
    recognizer: face_id::FaceRecognizer,
}

pub struct FaceEngine {
    settings: Settings,
    cache_dir: PathBuf,
    fallback_enabled: bool,
    models: Mutex<Option<Arc<LoadedModels>>>,
}

impl FaceEngine {
    #[must_use]
    pub fn new(settings: Settings, cache_dir: impl Into<PathBuf>, fallback_enabled: bool) -> Self {
        Self {
            settings,
            cache_dir: cache_dir.into(),
            fallback_enabled,
            models: Mutex::new(None),
        }
    }

    /// Detects up to `max_faces` faces in `image_bytes` under the standard
    /// detection profile, returning embeddings sorted by (area_ratio,
    /// det_confidence) descending.
    ///
    /// # Errors
    /// If the bytes don't decode as an image.
    pub async fn embed_faces(
        &self,
        image_bytes: &[u8],
        max_faces: u32,
    ) -> Result<Vec<FaceEmbedding>, FaceEngineError> {
        self.embed_faces_with_profile(image_bytes, max_faces, DetectionProfile::standard(&self.settings))
            .await
    }

    /// Same as [`Self::embed_faces`] but under the relaxed reference-image
    /// profile used for guest selfies (§4.C).
    ///
    /// # Errors
    /// If the bytes don't decode as an image.
    pub async fn embed_reference_faces(
        &self,
        image_bytes: &[u8],
        max_faces: u32,
    ) -> Result<Vec<FaceEmbedding>, FaceEngineError> {
        self.embed_faces_with_profile(image_bytes, max_faces, DetectionProfile::reference(&self.settings))
            .await
    }

    async fn embed_faces_with_profile(
        &self,
        image_bytes: &[u8],
        max_faces: u32,
        profile: DetectionProfile,
    ) -> Result<Vec<FaceEmbedding>, FaceEngineError> {
        let img = image::load_from_memory(image_bytes).map_err(|_| FaceEngineError::DecodeFailed)?;

        let models = self.ensure_models_loaded().await;
        let cap = max_faces.min(self.settings.face_max_faces_per_image);
        let min_ratio = profile.min_face_ratio;
        let min_sharpness = profile.min_sharpness;
        let resize_max_side = self.settings.face_resize_max_side;
        let det_size = profile.det_size;
        let score_threshold = self.settings.face_det_score_threshold;
        let fallback_enabled = self.fallback_enabled;

        let result = tokio::task::spawn_blocking(move || {
            run_detection_pipeline(
                &img,
                models,
                cap,
                min_ratio,
                min_sharpness,
                resize_max_side,
                det_size,
                score_threshold,
                fallback_enabled,
            )
        })
        .await
        .map_err(|e| FaceEngineError::ModelInitFailed(e.to_string()))?;

        Ok(result)
    }

    /// Convenience wrapper used for selfie/reference matching: embeds up to
    /// 8 faces, returns the best by (area_ratio, det_confidence) descending.
    ///
    /// # Errors
    /// If the bytes don't decode as an image.
    pub async fn embed_single_face(
        &self,
        image_bytes: &[u8],
    ) -> Result<Option<FaceEmbedding>, FaceEngineError> {
        let mut faces = self.embed_reference_faces(image_bytes, 8).await?;
        faces.sort_by(|a, b| {
            (b.area_ratio, b.det_confidence)
                .partial_cmp(&(a.area_ratio, a.det_confidence))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(faces.into_iter().next())
    }

    async fn ensure_models_loaded(&self) -> Option<Arc<LoadedModels>> {
        let mut guard = self.models.lock().await;
        if let Some(models) = guard.as_ref() {
            return Some(Arc::clone(models));
        }
        match self.load_models().await {
            Ok(models) => {
                let arc = Arc::new(models);
                *guard = Some(Arc::clone(&arc));
                Some(arc)
            }
            Err(e) => {
                warn!("face engine model initialization failed: {e}");
                None
            }
        }
    }

    async fn load_models(&self) -> Result<LoadedModels, FaceEngineError> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let detector_path = self.cache_dir.join(DETECTOR_MODEL_FILE);
        let recognizer_path = self.cache_dir.join(RECOGNIZER_MODEL_FILE);
        ensure_model_present(&detector_path, DETECTOR_MODEL_URL).await?;
        ensure_model_present(&recognizer_path, RECOGNIZER_MODEL_URL).await?;

        info!("loading face detector/recognizer models from {}", self.cache_dir.display());
        let detector = face_id::FaceDetector::from_file(&detector_path)
            .map_err(|e| FaceEngineError::ModelInitFailed(e.to_string()))?;
        let recognizer = face_id::FaceRecognizer::from_file(&recognizer_path)
            .map_err(|e| FaceEngineError::ModelInitFailed(e.to_string()))?;
        Ok(LoadedModels { detector, recognizer })
    }
}

static GLOBAL_ENGINE: OnceLock<Arc<FaceEngine>> = OnceLock::new();

/// Process-local Face Engine handle (§9 Design Notes: "Global Face
/// Engine"). Built once per worker process from whichever `Settings` first
/// calls this; later calls reuse the same instance regardless of their
/// `settings` argument.
pub fn global(settings: &Settings, cache_dir: impl Into<PathBuf>, fallback_enabled: bool) -> Arc<FaceEngine> {
    Arc::clone(GLOBAL_ENGINE.get_or_init(|| {
        Arc::new(FaceEngine::new(settings.clone(), cache_dir, fallback_enabled))
    }))
}

async fn ensure_model_present(path: &Path, url: &str) -> Result<(), FaceEngineError> {
    let needs_fetch = match std::fs::metadata(path) {
        Ok(meta) => meta.len() < MIN_MODEL_BYTES,
        Err(_) => true,
    };
    if !needs_fetch {
        return Ok(());
    }
    info!("downloading face model {url}");
    let bytes = reqwest::get(url)
        .await
        .map_err(|e| FaceEngineError::ModelDownloadFailed(e.to_string()))?
        .bytes()
        .await
        .map_err(|e| FaceEngineError::ModelDownloadFailed(e.to_string()))?;
    if (bytes.len() as u64) < MIN_MODEL_BYTES {
        return Err(FaceEngineError::ModelDownloadFailed(format!(
            "downloaded model at {url} is smaller than the minimum expected size"
        )));
    }
    std::fs::write(path, &bytes)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_detection_pipeline(
    img: &DynamicImage,
    models: Option<Arc<LoadedModels>>,
    max_faces: u32,
    min_face_ratio: f32,
    min_sharpness: f32,
    resize_max_side: u32,
    det_size: u32,
    score_threshold: f32,
    fallback_enabled: bool,
) -> Vec<FaceEmbedding> {
    let (img_w, img_h) = img.dimensions();
    let image_area = (img_w as f32 * img_h as f32).max(1.0);
    let resized = resize_longest_side(img, resize_max_side.max(det_size));

    let Some(models) = models else {
        return if fallback_enabled {
            vec![fallback_embedding(img)]
        } else {
            Vec::new()
        };
    };

    let scale_x = img_w as f32 / resized.width() as f32;
    let scale_y = img_h as f32 / resized.height() as f32;

    let raw_detections = match models.detector.detect(&resized, score_threshold) {
        Ok(detections) => detections,
        Err(e) => {
            warn!("face detection failed: {e}");
            return if fallback_enabled {
                vec![fallback_embedding(img)]
            } else {
                Vec::new()
            };
        }
    };

    let mut candidates: Vec<(f32, f32, face_id::DetectedFace)> = raw_detections
        .into_iter()
        .map(|d| {
            let area_ratio = (d.bbox().2 * scale_x * d.bbox().3 * scale_y) / image_area;
            (area_ratio, d.confidence(), d)
        })
        .filter(|(area_ratio, _, _)| *area_ratio >= min_face_ratio)
        .collect();

    candidates.sort_by(|a, b| {
        (b.0, b.1).partial_cmp(&(a.0, a.1)).unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(max_faces as usize);

    let mut out = Vec::with_capacity(candidates.len());
    for (area_ratio, det_confidence, detection) in candidates {
        let (x, y, w, h) = detection.bbox();
        let bbox = BoundingBox {
            x: x * scale_x,
            y: y * scale_y,
            w: w * scale_x,
            h: h * scale_y,
        };
        let crop = crop_bbox(img, &bbox);
        let sharpness = laplacian_variance(&crop);
        if sharpness < min_sharpness {
            continue;
        }
        let Ok(mut raw_embedding) = models.recognizer.embed(&crop) else {
            continue;
        };
        raw_embedding = pad_or_truncate(raw_embedding);
        l2_normalize(&mut raw_embedding);
        let norm: f32 = raw_embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= 0.0 {
            continue;
        }
        out.push(FaceEmbedding {
            embedding: raw_embedding,
            area_ratio,
            det_confidence,
            sharpness,
            bbox,
        });
    }
    out
}

fn resize_longest_side(img: &DynamicImage, max_side: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w.max(h) <= max_side {
        return img.clone();
    }
    let (new_w, new_h) = if w >= h {
        (max_side, (h as f32 * max_side as f32 / w as f32) as u32)
    } else {
        ((w as f32 * max_side as f32 / h as f32) as u32, max_side)
    };
    img.resize(new_w.max(1), new_h.max(1), image::imageops::FilterType::Lanczos3)
}

fn crop_bbox(img: &DynamicImage, bbox: &BoundingBox) -> DynamicImage {
    let (img_w, img_h) = img.dimensions();
    let x = bbox.x.max(0.0) as u32;
    let y = bbox.y.max(0.0) as u32;
    let w = (bbox.w.max(1.0) as u32).min(img_w.saturating_sub(x).max(1));
    let h = (bbox.h.max(1.0) as u32).min(img_h.saturating_sub(y).max(1));
    img.crop_imm(x, y, w, h)
}

/// Variance of the Laplacian of a greyscale crop, used as a blur estimator.
fn laplacian_variance(crop: &DynamicImage) -> f32 {
    let grey = crop.to_luma32f();
    let blurred = gaussian_blur_f32(&grey, 0.6);
    let (w, h) = blurred.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let mut values = Vec::with_capacity((w as usize - 2) * (h as usize - 2));
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let center = blurred.get_pixel(x, y).0[0];
            let up = blurred.get_pixel(x, y - 1).0[0];
            let down = blurred.get_pixel(x, y + 1).0[0];
            let left = blurred.get_pixel(x - 1, y).0[0];
            let right = blurred.get_pixel(x + 1, y).0[0];
            values.push(4.0 * center - up - down - left - right);
        }
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32
}

/// Deterministic fallback used when model initialization fails and fallback
/// mode is enabled: a 32x16 downsampled greyscale flatten, zero-padded or
/// truncated to exactly [`EMBEDDING_DIM`] elements, L2-normalized.
fn fallback_embedding(img: &DynamicImage) -> FaceEmbedding {
    let small = img.resize_exact(32, 16, image::imageops::FilterType::Triangle).to_luma8();
    let mut values: Vec<f32> = small.pixels().map(|p| f32::from(p.0[0]) / 255.0).collect();
    values.resize(EMBEDDING_DIM, 0.0);
    values.truncate(EMBEDDING_DIM);
    let mut embedding = pad_or_truncate(values);
    l2_normalize(&mut embedding);
    FaceEmbedding {
        embedding,
        area_ratio: 1.0,
        det_confidence: 0.0,
        sharpness: 0.0,
        bbox: BoundingBox { x: 0.0, y: 0.0, w: img.width() as f32, h: img.height() as f32 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn solid_image(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn fallback_embedding_has_expected_dimension_and_norm() {
        let img = solid_image(64, 64);
        let face = fallback_embedding(&img);
        assert_eq!(face.embedding.len(), EMBEDDING_DIM);
        let norm: f32 = face.embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(norm <= 1.0 + 1e-3);
    }

    #[test]
    fn detection_profiles_relax_for_reference_images() {
        let settings = Settings::default();
        let standard = DetectionProfile::standard(&settings);
        let reference = DetectionProfile::reference(&settings);
        assert!(reference.min_face_ratio < standard.min_face_ratio);
        assert!(reference.min_sharpness < standard.min_sharpness);
        assert!(reference.det_size > standard.det_size);
    }

    #[test]
    fn resize_longest_side_respects_cap() {
        let img = solid_image(800, 400);
        let resized = resize_longest_side(&img, 200);
        assert_eq!(resized.width(), 200);
        assert_eq!(resized.height(), 100);
    }

    #[test]
    fn resize_longest_side_is_noop_under_cap() {
        let img = solid_image(100, 50);
        let resized = resize_longest_side(&img, 200);
        assert_eq!((resized.width(), resized.height()), (100, 50));
    }
}
