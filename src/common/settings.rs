use loco_rs::app::AppContext;
use serde::{Deserialize, Serialize};

fn default_storage_root() -> String {
    "storage".to_string()
}
fn default_max_sync_images() -> u32 {
    0
}
fn default_thumbnail_max_size() -> u32 {
    1024
}
fn default_selfie_retention_hours() -> i64 {
    24
}
fn default_face_model_cache_dir() -> String {
    "models".to_string()
}
fn default_face_det_size() -> u32 {
    640
}
fn default_face_det_score_threshold() -> f32 {
    0.5
}
fn default_face_min_face_ratio() -> f32 {
    0.01
}
fn default_face_min_sharpness() -> f32 {
    40.0
}
fn default_face_max_faces_per_image() -> u32 {
    32
}
fn default_face_resize_max_side() -> u32 {
    1600
}
fn default_face_fallback_enabled() -> bool {
    true
}
fn default_cluster_eps() -> f32 {
    0.32
}
fn default_cluster_min_samples() -> usize {
    2
}
fn default_face_similarity_threshold_percent() -> f32 {
    90.0
}
fn default_face_top_margin() -> f32 {
    8.0
}
fn default_face_auto_relax_drop() -> f32 {
    8.0
}
fn default_face_auto_relax_min_threshold() -> f32 {
    78.0
}
fn default_job_poll_interval_seconds() -> u64 {
    2
}
fn default_job_idle_sleep_seconds() -> u64 {
    3
}
fn default_worker_concurrency() -> usize {
    2
}
fn default_auto_sync_enabled() -> bool {
    false
}
fn default_auto_sync_interval_minutes() -> i64 {
    60
}
fn default_auto_sync_batch_size() -> usize {
    5
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Settings {
    #[serde(default = "default_storage_root")]
    pub storage_root: String,
    #[serde(default)]
    pub google_drive_api_key: String,
    #[serde(default = "default_max_sync_images")]
    pub max_sync_images: u32,
    #[serde(default = "default_thumbnail_max_size")]
    pub thumbnail_max_size: u32,
    #[serde(default = "default_selfie_retention_hours")]
    pub selfie_retention_hours: i64,

    #[serde(default = "default_face_model_cache_dir")]
    pub face_model_cache_dir: String,
    #[serde(default = "default_face_det_size")]
    pub face_det_size: u32,
    #[serde(default = "default_face_det_score_threshold")]
    pub face_det_score_threshold: f32,
    #[serde(default = "default_face_min_face_ratio")]
    pub face_min_face_ratio: f32,
    #[serde(default = "default_face_min_sharpness")]
    pub face_min_sharpness: f32,
    #[serde(default = "default_face_max_faces_per_image")]
    pub face_max_faces_per_image: u32,
    #[serde(default = "default_face_resize_max_side")]
    pub face_resize_max_side: u32,
    #[serde(default = "default_face_fallback_enabled")]
    pub face_fallback_enabled: bool,

    #[serde(default = "default_cluster_eps")]
    pub cluster_eps: f32,
    #[serde(default = "default_cluster_min_samples")]
    pub cluster_min_samples: usize,

    #[serde(default = "default_face_similarity_threshold_percent")]
    pub face_similarity_threshold_percent: f32,
    #[serde(default = "default_face_top_margin")]
    pub face_top_margin: f32,
    #[serde(default = "default_face_auto_relax_drop")]
    pub face_auto_relax_drop: f32,
    #[serde(default = "default_face_auto_relax_min_threshold")]
    pub face_auto_relax_min_threshold: f32,

    #[serde(default = "default_job_poll_interval_seconds")]
    pub job_poll_interval_seconds: u64,
    #[serde(default = "default_job_idle_sleep_seconds")]
    pub job_idle_sleep_seconds: u64,
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,
    #[serde(default = "default_auto_sync_enabled")]
    pub auto_sync_enabled: bool,
    #[serde(default = "default_auto_sync_interval_minutes")]
    pub auto_sync_interval_minutes: i64,
    #[serde(default = "default_auto_sync_batch_size")]
    pub auto_sync_batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).expect("Settings defaults must deserialize")
    }
}

impl Settings {
    /// Get a settings object from app context
    ///
    /// # Panics
    ///
    /// When the settings field can't be found in config, or when it can't be
    /// deserialized to the expected format.
    #[allow(clippy::must_use_candidate)]
    pub fn from_context(ctx: &AppContext) -> Self {
        let settings_value = ctx
            .config
            .settings
            .clone()
            .expect("No settings found in config.");
        serde_json::from_value(settings_value).expect("Error deserializing settings.")
    }
}
