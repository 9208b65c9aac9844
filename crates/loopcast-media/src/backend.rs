//! The transcode capability the assembly pipeline is written against.

use async_trait::async_trait;
use std::path::Path;

use loopcast_models::{LoudnessTarget, MediaKind};

use crate::error::MediaResult;
use crate::probe::MediaInfo;

/// Bytes-level media operations.
///
/// Every operation reads existing files and writes exactly one new file at
/// `output`; inputs are never modified. Durations are always obtained through
/// [`TranscodeBackend::probe`], never assumed from the requested operation.
#[async_trait]
pub trait TranscodeBackend: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Inspect a media file.
    async fn probe(&self, input: &Path) -> MediaResult<MediaInfo>;

    /// Measured duration in seconds.
    async fn probe_duration(&self, input: &Path) -> MediaResult<f64> {
        Ok(self.probe(input).await?.duration)
    }

    /// Loudness-normalize an audio file to intermediate PCM.
    async fn normalize(&self, input: &Path, target: &LoudnessTarget, output: &Path) -> MediaResult<()>;

    /// Crossfade the last `width` seconds of `first` with the first `width` seconds of `second`.
    async fn crossfade(&self, first: &Path, second: &Path, width: f64, output: &Path) -> MediaResult<()>;

    /// Join `inputs` back-to-back without transitions.
    async fn concat(&self, inputs: &[&Path], kind: MediaKind, output: &Path) -> MediaResult<()>;

    /// Slow a video clip down by `factor`, dropping its audio.
    async fn stretch(&self, input: &Path, factor: f64, output: &Path) -> MediaResult<()>;

    /// Play a video clip backwards.
    async fn reverse(&self, input: &Path, output: &Path) -> MediaResult<()>;

    /// Cut a file hard at `duration` seconds.
    async fn trim(&self, input: &Path, kind: MediaKind, duration: f64, output: &Path) -> MediaResult<()>;

    /// Combine a video stream and an audio stream, stopping at `duration`.
    async fn mux(&self, video: &Path, audio: &Path, duration: f64, output: &Path) -> MediaResult<()>;
}
