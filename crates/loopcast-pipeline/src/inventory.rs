//! Read-only inspection of the input pools: `list` and `check`.
//!
//! Only FFprobe is used here; nothing is transcoded.

use serde::Serialize;
use std::path::Path;

use loopcast_media::TranscodeBackend;
use loopcast_models::{MediaKind, TargetSpec, Track};

use crate::crossfade::check_width;
use crate::error::{AssemblyError, PipelineResult};
use crate::looper::checked_loop_count;
use crate::selector::{discover_tracks, select_playlist, select_video};

/// Probed contents of the audio and video directories.
#[derive(Debug, Clone, Serialize)]
pub struct Inventory {
    pub audio: Vec<Track>,
    pub video: Vec<Track>,
}

impl Inventory {
    pub fn total_audio_duration(&self) -> f64 {
        self.audio.iter().map(|t| t.duration).sum()
    }
}

/// The plan an `assemble` run with `spec` would follow.
#[derive(Debug, Clone, Serialize)]
pub struct AssetPlan {
    pub target_seconds: f64,
    pub playlist: Vec<String>,
    pub video_source: String,
    pub base_audio_duration: f64,
    pub video_cycle_duration: f64,
    pub audio_loops: u64,
    pub video_loops: u64,
}

/// List recognized tracks in name order, with probed durations.
pub async fn list_inventory(
    audio_dir: &Path,
    video_dir: Option<&Path>,
    backend: &dyn TranscodeBackend,
) -> PipelineResult<Inventory> {
    let audio = discover_tracks(audio_dir, MediaKind::Audio, backend).await?;
    let video = match video_dir {
        Some(dir) => discover_tracks(dir, MediaKind::Video, backend).await?,
        None => Vec::new(),
    };
    Ok(Inventory { audio, video })
}

/// Validate the inputs for `spec` and project the run's loop plan.
pub async fn check_assets(
    audio_dir: &Path,
    video_dir: &Path,
    spec: &TargetSpec,
    backend: &dyn TranscodeBackend,
) -> PipelineResult<AssetPlan> {
    spec.check()?;
    let playlist = select_playlist(audio_dir, spec, backend).await?;
    let video = select_video(video_dir, backend).await?;

    if playlist.len() > 1 {
        check_width(
            playlist.tracks().iter().map(|t| (t.name.as_str(), t.duration)),
            spec.crossfade_secs,
        )?;
    }

    let base = playlist.crossfaded_duration(spec.crossfade_secs);
    let cycle = 2.0 * spec.slowdown * video.duration;
    for (segment, duration) in [("base audio", base), ("video cycle", cycle)] {
        if duration.is_nan() || duration <= 0.0 {
            return Err(AssemblyError::InvalidSeedDuration {
                segment: segment.to_string(),
                duration: Some(duration),
            });
        }
    }

    let target = spec.target_seconds() as f64;
    Ok(AssetPlan {
        target_seconds: target,
        playlist: playlist.names(),
        video_source: video.name,
        base_audio_duration: base,
        video_cycle_duration: cycle,
        audio_loops: checked_loop_count("base audio", base, target)?,
        video_loops: checked_loop_count("video cycle", cycle, target)?,
    })
}
