//! Encoding and loudness configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 20;
/// Default final audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default final audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "192k";
/// Sample rate of every intermediate audio segment
pub const INTERMEDIATE_SAMPLE_RATE: u32 = 44_100;
/// Codec of every intermediate audio segment (sample-accurate, lossless)
pub const INTERMEDIATE_AUDIO_CODEC: &str = "pcm_s16le";

/// Integrated loudness target in LUFS
pub const TARGET_INTEGRATED_LUFS: f64 = -14.0;
/// True-peak ceiling in dBTP
pub const TARGET_TRUE_PEAK_DBTP: f64 = -1.0;
/// Loudness range target in LU
pub const TARGET_LOUDNESS_RANGE: f64 = 11.0;

/// Video/audio encoding configuration for produced segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Audio codec of the final artifact
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Audio bitrate of the final artifact
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Additional FFmpeg output arguments for video encodes
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            crf: DEFAULT_CRF,
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            extra_args: Vec::new(),
        }
    }
}

impl EncodingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// FFmpeg arguments for a video-only encode.
    pub fn to_video_args(&self) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
        ];

        // NVENC takes -cq instead of -crf
        if self.codec.contains("nvenc") {
            args.extend_from_slice(&["-cq".to_string(), self.crf.to_string()]);
        } else {
            args.extend_from_slice(&["-crf".to_string(), self.crf.to_string()]);
        }

        args.extend_from_slice(&["-pix_fmt".to_string(), "yuv420p".to_string()]);
        args.extend(self.extra_args.clone());
        args
    }

    /// FFmpeg arguments for the final audio stream.
    pub fn to_audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]
    }

    /// FFmpeg arguments for intermediate (PCM) audio segments.
    ///
    /// Long runs exceed the 4 GiB RIFF limit, so the WAV muxer may switch to RF64.
    pub fn intermediate_audio_args() -> Vec<String> {
        let mut args = vec![
            "-c:a".to_string(),
            INTERMEDIATE_AUDIO_CODEC.to_string(),
            "-ar".to_string(),
            INTERMEDIATE_SAMPLE_RATE.to_string(),
            "-ac".to_string(),
            "2".to_string(),
        ];
        args.extend(Self::intermediate_container_args());
        args
    }

    /// WAV muxer options for intermediate audio, also needed when stream-copying.
    pub fn intermediate_container_args() -> Vec<String> {
        vec!["-rf64".to_string(), "auto".to_string()]
    }
}

/// EBU R128 loudness normalization target, fixed for a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LoudnessTarget {
    /// Integrated loudness (LUFS)
    pub integrated: f64,
    /// True-peak ceiling (dBTP)
    pub true_peak: f64,
    /// Loudness range (LU)
    pub range: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated: TARGET_INTEGRATED_LUFS,
            true_peak: TARGET_TRUE_PEAK_DBTP,
            range: TARGET_LOUDNESS_RANGE,
        }
    }
}
