//! Pipeline error types.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use loopcast_media::MediaError;
use loopcast_models::TargetSpecError;

pub type PipelineResult<T> = Result<T, AssemblyError>;

/// A pipeline stage, used to tag failures, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Select,
    Probe,
    Normalize,
    Crossfade,
    Stretch,
    Reverse,
    Concatenate,
    Trim,
    Mux,
    Publish,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Select => "select",
            Stage::Probe => "probe",
            Stage::Normalize => "normalize",
            Stage::Crossfade => "crossfade",
            Stage::Stretch => "stretch",
            Stage::Reverse => "reverse",
            Stage::Concatenate => "concatenate",
            Stage::Trim => "trim",
            Stage::Mux => "mux",
            Stage::Publish => "publish",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("No audio tracks found in {}", .dir.display())]
    NoTracksFound { dir: PathBuf },

    #[error("No video found in {}", .dir.display())]
    NoVideoFound { dir: PathBuf },

    #[error(
        "Invalid seed duration for {segment}: {}",
        .duration.map_or_else(|| "probe failed".to_string(), |d| format!("{}s", d))
    )]
    InvalidSeedDuration {
        segment: String,
        duration: Option<f64>,
    },

    #[error("{segment} ({seed}s) would need more than {max} repetitions to cover {target}s")]
    TooManyLoops {
        segment: String,
        seed: f64,
        target: f64,
        max: u64,
    },

    #[error("Stage {stage} failed on {input}: {source}")]
    StageTranscodeFailure {
        stage: Stage,
        input: String,
        source: MediaError,
    },

    #[error("Mux failed: {0}")]
    MuxError(String),

    #[error("Crossfade width {width}s is not shorter than {segment} ({duration}s)")]
    CrossfadeTooWide {
        segment: String,
        duration: f64,
        width: f64,
    },

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssemblyError {
    /// Wrap a backend failure for `stage`; cancellation stays cancellation.
    pub fn stage_failure(stage: Stage, input: impl Into<String>, source: MediaError) -> Self {
        if source.is_cancelled() {
            return Self::Cancelled;
        }
        Self::StageTranscodeFailure {
            stage,
            input: input.into(),
            source,
        }
    }

    pub fn mux(msg: impl Into<String>) -> Self {
        Self::MuxError(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AssemblyError::Cancelled)
    }

    /// The stage a failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AssemblyError::NoTracksFound { .. }
            | AssemblyError::NoVideoFound { .. }
            | AssemblyError::InvalidTarget(_) => Some(Stage::Select),
            AssemblyError::InvalidSeedDuration { .. } | AssemblyError::TooManyLoops { .. } => {
                Some(Stage::Concatenate)
            }
            AssemblyError::StageTranscodeFailure { stage, .. } => Some(*stage),
            AssemblyError::MuxError(_) => Some(Stage::Mux),
            AssemblyError::CrossfadeTooWide { .. } => Some(Stage::Crossfade),
            AssemblyError::Cancelled
            | AssemblyError::Config(_)
            | AssemblyError::Internal(_)
            | AssemblyError::Io(_) => None,
        }
    }

    /// Tail of the tool's stderr behind a transcode failure, if captured.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            AssemblyError::StageTranscodeFailure { source, .. } => source.stderr(),
            _ => None,
        }
    }
}

impl From<TargetSpecError> for AssemblyError {
    fn from(e: TargetSpecError) -> Self {
        Self::InvalidTarget(e.to_string())
    }
}
