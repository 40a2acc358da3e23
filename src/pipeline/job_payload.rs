//! Typed job payload records (§9 Design Notes: "Free-form job payload").
//!
//! The `jobs.payload` column stays a JSON blob at the storage layer, but
//! each job type works with a typed struct in memory, re-serializing the
//! whole thing on every commit rather than patching loose keys by hand.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncCounters {
    pub phase: String,
    pub total_listed: u32,
    pub completed: u32,
    pub processed: u32,
    pub matched_faces: u32,
    pub refreshed_files: u32,
    pub reused_files: u32,
    pub failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_queue_total: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl SyncCounters {
    #[must_use]
    pub fn listing() -> Self {
        Self {
            phase: "listing".to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterPayload {
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_count: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPayload {
    pub phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold_percent: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adaptive_threshold_used: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photos: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Parses a job's `payload` JSON column into `T`, tolerating an empty
/// object for jobs that haven't written anything yet.
pub fn parse_payload<T: Default + serde::de::DeserializeOwned>(value: &serde_json::Value) -> T {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_counters_round_trip_through_json() {
        let counters = SyncCounters {
            phase: "processing".into(),
            total_listed: 10,
            completed: 3,
            current_file_id: Some("abc".into()),
            ..SyncCounters::default()
        };
        let json = serde_json::to_value(&counters).unwrap();
        let back: SyncCounters = parse_payload(&json);
        assert_eq!(back.total_listed, 10);
        assert_eq!(back.current_file_id.as_deref(), Some("abc"));
    }

    #[test]
    fn parses_empty_object_as_default() {
        let parsed: SyncCounters = parse_payload(&serde_json::json!({}));
        assert_eq!(parsed.total_listed, 0);
        assert!(parsed.phase.is_empty());
    }
}
