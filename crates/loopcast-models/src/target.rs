//! Caller target specification.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::{Validate, ValidationErrors};

/// Default video slow-down factor.
pub const DEFAULT_SLOWDOWN: f64 = 2.0;
/// Default crossfade width in seconds.
pub const DEFAULT_CROSSFADE_SECS: f64 = 3.0;

/// Errors raised when a target specification is rejected.
#[derive(Debug, Error)]
pub enum TargetSpecError {
    #[error("invalid target specification: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
}

/// What the caller asked for: how long, which tracks, how to order them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct TargetSpec {
    /// Target duration in whole minutes
    #[validate(range(min = 1))]
    pub duration_minutes: u32,

    /// File name of a track to leave out (exact, case-sensitive)
    #[serde(default)]
    #[validate(length(min = 1))]
    pub exclude: Option<String>,

    /// Shuffle the playlist instead of ordering by name
    #[serde(default)]
    pub randomize: bool,

    /// Seed for the shuffle; a fresh entropy seed is used when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Video slow-down factor (1.0 keeps the original speed)
    #[serde(default = "default_slowdown")]
    #[validate(range(min = 1.0))]
    pub slowdown: f64,

    /// Crossfade width between adjacent tracks, in seconds
    #[serde(default = "default_crossfade_secs")]
    #[validate(range(exclusive_min = 0.0))]
    pub crossfade_secs: f64,
}

fn default_slowdown() -> f64 {
    DEFAULT_SLOWDOWN
}
fn default_crossfade_secs() -> f64 {
    DEFAULT_CROSSFADE_SECS
}

impl TargetSpec {
    /// Create a spec for the given duration with default settings.
    pub fn new(duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            exclude: None,
            randomize: false,
            seed: None,
            slowdown: DEFAULT_SLOWDOWN,
            crossfade_secs: DEFAULT_CROSSFADE_SECS,
        }
    }

    pub fn with_exclude(mut self, name: impl Into<String>) -> Self {
        self.exclude = Some(name.into());
        self
    }

    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_slowdown(mut self, factor: f64) -> Self {
        self.slowdown = factor;
        self
    }

    pub fn with_crossfade(mut self, secs: f64) -> Self {
        self.crossfade_secs = secs;
        self
    }

    /// Target duration in whole seconds.
    pub fn target_seconds(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    /// Validate field ranges.
    pub fn check(&self) -> Result<(), TargetSpecError> {
        if !self.slowdown.is_finite() {
            return Err(TargetSpecError::NotFinite { field: "slowdown" });
        }
        if !self.crossfade_secs.is_finite() {
            return Err(TargetSpecError::NotFinite {
                field: "crossfade_secs",
            });
        }
        self.validate()?;
        Ok(())
    }
}
