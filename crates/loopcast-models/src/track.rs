//! Source track models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Recognized audio file extensions (lowercase).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac"];

/// Recognized video file extensions (lowercase).
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Kind of media a track or segment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Classify a path by its extension (case-insensitive).
    ///
    /// Returns `None` for files with no recognized extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Audio)
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw source media file with its probed duration.
///
/// Tracks are discovered fresh for every run and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    /// Absolute or caller-relative path to the file
    pub path: PathBuf,
    /// File name, used for ordering and exclusion
    pub name: String,
    /// Audio or video
    pub kind: MediaKind,
    /// Probed duration in seconds
    pub duration: f64,
    /// Primary stream codec, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Container format name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl Track {
    /// Create a track from a path and a measured duration.
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind, duration: f64) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            kind,
            duration,
            codec: None,
            format: None,
        }
    }

    /// Attach codec/format metadata.
    pub fn with_format(mut self, codec: Option<String>, format: Option<String>) -> Self {
        self.codec = codec;
        self.format = format;
        self
    }
}
