#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for duration-matched loop assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeouts via tokio
//! - FFprobe media inspection
//! - The [`TranscodeBackend`] capability trait and its FFmpeg implementation
//! - Owned [`Segment`]s inside a per-run [`ScratchArea`]

pub mod backend;
pub mod command;
pub mod error;
pub mod ffmpeg;
pub mod filters;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod segment;
#[cfg(any(test, feature = "simulated"))]
pub mod simulated;

pub use backend::TranscodeBackend;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use ffmpeg::FfmpegBackend;
pub use fs_utils::{move_file, remove_if_exists};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use segment::{ScratchArea, Segment};
#[cfg(any(test, feature = "simulated"))]
pub use simulated::{SimMedia, SimulatedBackend};
