//! Shared data models for the Loopcast assembly pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Source tracks and their media kind
//! - Playlists chosen for an assembly run
//! - The caller's target specification
//! - Encoding and loudness settings
//! - Assembly results and run manifests

pub mod encoding;
pub mod playlist;
pub mod result;
pub mod run;
pub mod target;
pub mod track;

// Re-export common types
pub use encoding::{EncodingConfig, LoudnessTarget};
pub use playlist::Playlist;
pub use result::{AssemblyResult, RunManifest};
pub use run::RunId;
pub use target::{TargetSpec, TargetSpecError, DEFAULT_CROSSFADE_SECS, DEFAULT_SLOWDOWN};
pub use track::{MediaKind, Track, AUDIO_EXTENSIONS, VIDEO_EXTENSIONS};
