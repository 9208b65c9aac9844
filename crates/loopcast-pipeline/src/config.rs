//! Assembly configuration.

use std::path::PathBuf;
use std::time::Duration;

use loopcast_models::{EncodingConfig, LoudnessTarget};

/// Runtime settings that are not part of a [`loopcast_models::TargetSpec`].
#[derive(Debug, Clone)]
pub struct AssemblyConfig {
    /// Parent directory for per-run scratch areas
    pub work_dir: PathBuf,
    /// Maximum loudness normalizations in flight
    pub max_parallel_normalize: usize,
    /// Per-FFmpeg-invocation timeout
    pub stage_timeout: Option<Duration>,
    /// Final video/audio encoding settings
    pub encoding: EncodingConfig,
    pub loudness: LoudnessTarget,
    /// Write a JSON manifest next to the artifact
    pub write_manifest: bool,
    /// Prometheus text dump written after a CLI run
    pub metrics_file: Option<PathBuf>,
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir(),
            max_parallel_normalize: 4,
            stage_timeout: None,
            encoding: EncodingConfig::default(),
            loudness: LoudnessTarget::default(),
            write_manifest: true,
            metrics_file: None,
        }
    }
}

impl AssemblyConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let encoding_defaults = EncodingConfig::default();

        Self {
            work_dir: std::env::var("LOOPCAST_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            max_parallel_normalize: env_parse("LOOPCAST_MAX_PARALLEL_NORMALIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_parallel_normalize),
            stage_timeout: env_parse("LOOPCAST_STAGE_TIMEOUT_SECS")
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            encoding: EncodingConfig {
                codec: std::env::var("LOOPCAST_VIDEO_CODEC").unwrap_or(encoding_defaults.codec),
                preset: std::env::var("LOOPCAST_VIDEO_PRESET").unwrap_or(encoding_defaults.preset),
                crf: env_parse("LOOPCAST_VIDEO_CRF").unwrap_or(encoding_defaults.crf),
                audio_codec: std::env::var("LOOPCAST_AUDIO_CODEC")
                    .unwrap_or(encoding_defaults.audio_codec),
                audio_bitrate: std::env::var("LOOPCAST_AUDIO_BITRATE")
                    .unwrap_or(encoding_defaults.audio_bitrate),
                extra_args: encoding_defaults.extra_args,
            },
            loudness: defaults.loudness,
            write_manifest: std::env::var("LOOPCAST_WRITE_MANIFEST")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
                .unwrap_or(defaults.write_manifest),
            metrics_file: std::env::var("LOOPCAST_METRICS_FILE").ok().map(PathBuf::from),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_max_parallel_normalize(mut self, n: usize) -> Self {
        self.max_parallel_normalize = n.max(1);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
