//! [`TranscodeBackend`] implemented with the FFmpeg and FFprobe CLIs.

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use loopcast_models::{EncodingConfig, LoudnessTarget, MediaKind};

use crate::backend::TranscodeBackend;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{concat_list, crossfade_filter, loudnorm_filter, stretch_filter, FILTER_REVERSE};
use crate::probe::{probe_media, MediaInfo};

/// Runs every operation as an FFmpeg subprocess.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    encoding: EncodingConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

impl FfmpegBackend {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            encoding,
            cancel_rx: None,
            timeout: None,
        }
    }

    /// Kill in-flight FFmpeg processes once `cancel_rx` turns `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    /// Limit each FFmpeg invocation to `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }

    fn runner(&self) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new();
        if let Some(rx) = &self.cancel_rx {
            runner = runner.with_cancel(rx.clone());
        }
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }
        runner
    }

    async fn run_logged(&self, op: &'static str, cmd: &FfmpegCommand) -> MediaResult<()> {
        let output = cmd.output_path().display().to_string();
        self.runner()
            .run_with_progress(cmd, move |progress| {
                if progress.is_complete {
                    debug!(op, output = %output, "FFmpeg finished at {:.2}s", progress.out_time_secs());
                }
            })
            .await
    }
}

#[async_trait]
impl TranscodeBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    async fn probe(&self, input: &Path) -> MediaResult<MediaInfo> {
        probe_media(input).await
    }

    async fn normalize(&self, input: &Path, target: &LoudnessTarget, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output)
            .no_video()
            .audio_filter(loudnorm_filter(target))
            .output_args(EncodingConfig::intermediate_audio_args());

        self.run_logged("normalize", &cmd).await
    }

    async fn crossfade(&self, first: &Path, second: &Path, width: f64, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(first, output)
            .add_input(second)
            .filter_complex(crossfade_filter(width))
            .map("[out]")
            .output_args(EncodingConfig::intermediate_audio_args());

        self.run_logged("crossfade", &cmd).await
    }

    async fn concat(&self, inputs: &[&Path], kind: MediaKind, output: &Path) -> MediaResult<()> {
        // The demuxer resolves relative entries against the list file, so write absolute paths
        let mut absolute = Vec::with_capacity(inputs.len());
        for input in inputs {
            absolute.push(std::path::absolute(input)?);
        }

        let list_path = output.with_extension("concat.txt");
        tokio::fs::write(&list_path, concat_list(&absolute)).await?;

        debug!(
            kind = %kind,
            parts = inputs.len(),
            list = %list_path.display(),
            "Concatenating with concat demuxer"
        );

        let cmd = concat_command(&list_path, kind, output);
        let result = self.run_logged("concat", &cmd).await;

        let _ = tokio::fs::remove_file(&list_path).await;
        result
    }

    async fn stretch(&self, input: &Path, factor: f64, output: &Path) -> MediaResult<()> {
        let cmd = FfmpegCommand::new(input, output)
            .no_audio()
            .video_filter(stretch_filter(factor))
            .output_args(self.encoding.to_video_args());

        self.run_logged("stretch", &cmd).await
    }

    async fn reverse(&self, input: &Path, output: &Path) -> MediaResult<()> {
        // The reverse filter buffers the whole clip in memory; inputs are short raw clips
        let cmd = FfmpegCommand::new(input, output)
            .no_audio()
            .video_filter(FILTER_REVERSE)
            .output_args(self.encoding.to_video_args());

        self.run_logged("reverse", &cmd).await
    }

    async fn trim(&self, input: &Path, kind: MediaKind, duration: f64, output: &Path) -> MediaResult<()> {
        // Re-encode on trim: stream copy can only cut on packet/keyframe boundaries
        let cmd = FfmpegCommand::new(input, output).limit_duration(duration);
        let cmd = match kind {
            MediaKind::Audio => cmd
                .no_video()
                .output_args(EncodingConfig::intermediate_audio_args()),
            MediaKind::Video => cmd.no_audio().output_args(self.encoding.to_video_args()),
        };

        self.run_logged("trim", &cmd).await
    }

    async fn mux(&self, video: &Path, audio: &Path, duration: f64, output: &Path) -> MediaResult<()> {
        info!(
            video = %video.display(),
            audio = %audio.display(),
            "Muxing {:.3}s into {}", duration, output.display()
        );

        let cmd = FfmpegCommand::new(video, output)
            .add_input(audio)
            .map("0:v:0")
            .map("1:a:0")
            .output_args(["-c:v", "copy"])
            .output_args(self.encoding.to_audio_args())
            .output_args(["-movflags", "+faststart"])
            .limit_duration(duration)
            .output_arg("-shortest");

        self.run_logged("mux", &cmd).await
    }
}

/// Stream-copy the parts named in a concat list file.
fn concat_command(list_path: &Path, kind: MediaKind, output: &Path) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(list_path, output).concat_list().codec_copy();
    match kind {
        MediaKind::Audio => cmd.output_args(EncodingConfig::intermediate_container_args()),
        MediaKind::Video => cmd,
    }
}
