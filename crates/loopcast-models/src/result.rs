//! Assembly results and run manifests.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{RunId, TargetSpec};

/// Outcome of a successful assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssemblyResult {
    pub run_id: RunId,
    /// Final artifact location
    pub output: PathBuf,
    /// Requested duration in seconds
    pub requested_duration: f64,
    /// Probed duration of the final artifact in seconds
    pub realized_duration: f64,
    /// Track names in playlist order
    pub playlist: Vec<String>,
    /// Name of the video source clip
    pub video_source: String,
    /// Duration of the crossfaded audio base segment
    pub base_audio_duration: f64,
    /// Duration of the video ping-pong cycle
    pub video_cycle_duration: f64,
    /// Times the audio base was repeated before trimming
    pub audio_loops: u64,
    /// Times the video cycle was repeated before trimming
    pub video_loops: u64,
}

impl AssemblyResult {
    /// Absolute difference between realized and requested duration.
    pub fn drift(&self) -> f64 {
        (self.realized_duration - self.requested_duration).abs()
    }

    /// Whether the realized duration is within `quantum` seconds of the request.
    pub fn within_quantum(&self, quantum: f64) -> bool {
        self.drift() <= quantum
    }
}

/// Sidecar manifest written next to the final artifact.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunManifest {
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub output: PathBuf,
    pub target_minutes: u32,
    pub requested_seconds: f64,
    pub realized_seconds: f64,
    pub realized_minutes: f64,
    pub crossfade_secs: f64,
    pub slowdown: f64,
    pub randomized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded: Option<String>,
    pub tracks: Vec<String>,
    pub video_source: String,
    pub audio_loops: u64,
    pub video_loops: u64,
}

impl RunManifest {
    pub fn new(result: &AssemblyResult, spec: &TargetSpec) -> Self {
        Self {
            run_id: result.run_id.clone(),
            created_at: Utc::now(),
            output: result.output.clone(),
            target_minutes: spec.duration_minutes,
            requested_seconds: result.requested_duration,
            realized_seconds: result.realized_duration,
            realized_minutes: result.realized_duration / 60.0,
            crossfade_secs: spec.crossfade_secs,
            slowdown: spec.slowdown,
            randomized: spec.randomize,
            excluded: spec.exclude.clone(),
            tracks: result.playlist.clone(),
            video_source: result.video_source.clone(),
            audio_loops: result.audio_loops,
            video_loops: result.video_loops,
        }
    }
}
