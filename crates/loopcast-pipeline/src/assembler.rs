//! Run orchestration: selection, the two media paths, mux and publish.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, Instrument};

use loopcast_media::{move_file, ScratchArea, Segment, TranscodeBackend};
use loopcast_models::{AssemblyResult, Playlist, RunId, RunManifest, TargetSpec, Track};

use crate::config::AssemblyConfig;
use crate::crossfade::{build_chain, check_width};
use crate::error::{AssemblyError, PipelineResult, Stage};
use crate::logging::RunLogger;
use crate::looper::{extend_to, Extended};
use crate::manifest::write_manifest;
use crate::metrics;
use crate::muxer::mux_streams;
use crate::normalizer::normalize_playlist;
use crate::selector::{select_playlist, select_video};
use crate::stage::StageContext;
use crate::video::build_ping_pong;

/// Everything the media paths produced, before publishing.
struct Produced {
    artifact: Segment,
    base_audio_duration: f64,
    audio_loops: u64,
    video_cycle_duration: f64,
    video_loops: u64,
}

/// Assembles a duration-matched audio/video artifact.
pub struct Assembler {
    backend: Arc<dyn TranscodeBackend>,
    config: AssemblyConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl Assembler {
    pub fn new(backend: Arc<dyn TranscodeBackend>, config: AssemblyConfig) -> Self {
        Self {
            backend,
            config,
            cancel_rx: None,
        }
    }

    /// Abort the run once `cancel_rx` turns `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &AssemblyConfig {
        &self.config
    }

    /// Build the artifact at `output` from the pools in `audio_dir` and `video_dir`.
    ///
    /// On success the file at `output` lasts the requested duration (within
    /// one frame). On failure nothing is written to `output` and all
    /// intermediates are removed.
    pub async fn assemble(
        &self,
        audio_dir: &Path,
        video_dir: &Path,
        output: &Path,
        spec: &TargetSpec,
    ) -> PipelineResult<AssemblyResult> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id);
        let span = logger.create_span();

        let result = self
            .run(&run_id, &logger, audio_dir, video_dir, output, spec)
            .instrument(span)
            .await;

        match &result {
            Ok(r) => {
                metrics::record_run("success");
                metrics::record_output_duration(r.realized_duration);
                logger.log_completion(&format!(
                    "{} ({:.3}s, {} tracks)",
                    r.output.display(),
                    r.realized_duration,
                    r.playlist.len()
                ));
            }
            Err(e) => {
                metrics::record_run(if e.is_cancelled() { "cancelled" } else { "failed" });
                logger.log_error(e.stage(), &e.to_string(), e.stderr());
            }
        }

        result
    }

    async fn run(
        &self,
        run_id: &RunId,
        logger: &RunLogger,
        audio_dir: &Path,
        video_dir: &Path,
        output: &Path,
        spec: &TargetSpec,
    ) -> PipelineResult<AssemblyResult> {
        spec.check()?;
        let target = spec.target_seconds() as f64;
        let backend = self.backend.as_ref();

        logger.log_start(&format!(
            "{} minutes from {} + {} -> {} (backend: {})",
            spec.duration_minutes,
            audio_dir.display(),
            video_dir.display(),
            output.display(),
            backend.name()
        ));

        let playlist = select_playlist(audio_dir, spec, backend).await?;
        let video = select_video(video_dir, backend).await?;
        if playlist.len() > 1 {
            check_width(
                playlist.tracks().iter().map(|t| (t.name.as_str(), t.duration)),
                spec.crossfade_secs,
            )?;
        }
        logger.log_stage(
            Stage::Select,
            &format!(
                "Playlist [{}], video {}",
                playlist.names().join(", "),
                video.name
            ),
        );

        let scratch = ScratchArea::create_in(&self.config.work_dir, &format!("loopcast-{}-", run_id.short()))
            .map_err(|e| {
                AssemblyError::config(format!(
                    "cannot create scratch area in {}: {}",
                    self.config.work_dir.display(),
                    e
                ))
            })?;
        let ctx = StageContext::new(backend, &scratch, logger);

        let produced = until_cancelled(
            self.cancel_rx.clone(),
            self.produce(ctx, &playlist, &video, spec, target),
        )
        .await?;

        // The final probe also tells us the frame length used as tolerance
        let info = backend
            .probe(produced.artifact.path())
            .await
            .map_err(|e| AssemblyError::stage_failure(Stage::Probe, produced.artifact.label(), e))?;
        if let Some(quantum) = info.quantum() {
            if (info.duration - target).abs() > quantum {
                logger.log_warning(
                    Stage::Mux,
                    &format!(
                        "Output is {:.3}s, more than one frame ({:.4}s) away from {:.3}s",
                        info.duration, quantum, target
                    ),
                );
            }
        }

        // Publishing runs to completion even if a cancel arrives now
        move_file(produced.artifact.path(), output)
            .await
            .map_err(|e| AssemblyError::stage_failure(Stage::Publish, output.display().to_string(), e))?;
        let _ = produced.artifact.into_path();
        logger.log_stage(Stage::Publish, &format!("Published {}", output.display()));

        let result = AssemblyResult {
            run_id: run_id.clone(),
            output: output.to_path_buf(),
            requested_duration: target,
            realized_duration: info.duration,
            playlist: playlist.names(),
            video_source: video.name.clone(),
            base_audio_duration: produced.base_audio_duration,
            video_cycle_duration: produced.video_cycle_duration,
            audio_loops: produced.audio_loops,
            video_loops: produced.video_loops,
        };

        if self.config.write_manifest {
            match write_manifest(&RunManifest::new(&result, spec), output).await {
                Ok(path) => info!(manifest = %path.display(), "Wrote run manifest"),
                Err(e) => logger.log_warning(Stage::Publish, &format!("Failed to write manifest: {}", e)),
            }
        }

        drop(scratch);
        Ok(result)
    }

    /// Run both media paths concurrently, then mux.
    async fn produce(
        &self,
        ctx: StageContext<'_>,
        playlist: &Playlist,
        video: &Track,
        spec: &TargetSpec,
        target: f64,
    ) -> PipelineResult<Produced> {
        let audio_path = async {
            let normalized = normalize_playlist(
                ctx,
                playlist,
                &self.config.loudness,
                self.config.max_parallel_normalize,
            )
            .await?;
            let base = build_chain(ctx, normalized, spec.crossfade_secs).await?;
            extend_to(ctx, base, target).await
        };

        let video_path = async {
            let cycle = build_ping_pong(ctx, video, spec.slowdown).await?;
            extend_to(ctx, cycle, target).await
        };

        let (audio, video) = tokio::try_join!(audio_path, video_path)?;
        info!(
            audio_loops = audio.loops,
            video_loops = video.loops,
            "Both paths extended to {:.3}s", target
        );

        let Extended {
            segment: audio_segment,
            seed_duration: base_audio_duration,
            loops: audio_loops,
        } = audio;
        let Extended {
            segment: video_segment,
            seed_duration: video_cycle_duration,
            loops: video_loops,
        } = video;

        let artifact = mux_streams(ctx, video_segment, audio_segment).await?;
        Ok(Produced {
            artifact,
            base_audio_duration,
            audio_loops,
            video_cycle_duration,
            video_loops,
        })
    }
}

/// Resolve `fut`, or fail with [`AssemblyError::Cancelled`] once the signal is set.
///
/// Dropping `fut` kills any FFmpeg child it still owns.
async fn until_cancelled<T>(
    cancel_rx: Option<watch::Receiver<bool>>,
    fut: impl Future<Output = PipelineResult<T>>,
) -> PipelineResult<T> {
    let Some(mut rx) = cancel_rx else {
        return fut.await;
    };
    if *rx.borrow() {
        return Err(AssemblyError::Cancelled);
    }

    tokio::select! {
        result = fut => result,
        _ = cancelled(&mut rx) => Err(AssemblyError::Cancelled),
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
        // Sender gone without cancelling
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::manifest_path;
    use crate::testing::{count_files, media_file};
    use async_trait::async_trait;
    use loopcast_media::{MediaInfo, MediaResult, SimulatedBackend};
    use loopcast_models::{LoudnessTarget, MediaKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const TRANSCODE_OPS: [&str; 7] = ["normalize", "crossfade", "concat", "stretch", "reverse", "trim", "mux"];

    struct Fixture {
        _dir: TempDir,
        backend: Arc<SimulatedBackend>,
        audio_dir: PathBuf,
        video_dir: PathBuf,
        work_dir: PathBuf,
        output: PathBuf,
    }

    impl Fixture {
        fn new(tracks: &[(&str, f64)], video: Option<f64>) -> Self {
            let dir = TempDir::new().unwrap();
            let backend = Arc::new(SimulatedBackend::new());
            let audio_dir = dir.path().join("audio");
            let video_dir = dir.path().join("video");
            std::fs::create_dir_all(&audio_dir).unwrap();
            std::fs::create_dir_all(&video_dir).unwrap();

            for (name, duration) in tracks {
                media_file(&backend, &audio_dir, name, MediaKind::Audio, *duration);
            }
            if let Some(duration) = video {
                media_file(&backend, &video_dir, "clip.mp4", MediaKind::Video, duration);
            }

            Self {
                work_dir: dir.path().join("work"),
                output: dir.path().join("out").join("mix.mp4"),
                _dir: dir,
                backend,
                audio_dir,
                video_dir,
            }
        }

        fn assembler(&self) -> Assembler {
            let config = AssemblyConfig::default()
                .with_work_dir(&self.work_dir)
                .with_max_parallel_normalize(2);
            Assembler::new(self.backend.clone(), config)
        }

        async fn run(&self, spec: &TargetSpec) -> PipelineResult<AssemblyResult> {
            self.assembler()
                .assemble(&self.audio_dir, &self.video_dir, &self.output, spec)
                .await
        }

        fn transcode_calls(&self) -> usize {
            TRANSCODE_OPS.iter().map(|op| self.backend.call_count(op)).sum()
        }

        fn assert_clean_failure(&self) {
            assert!(!self.output.exists(), "no artifact may appear on failure");
            assert_eq!(count_files(&self.work_dir), 0, "scratch area must be removed");
            if self.work_dir.exists() {
                assert_eq!(std::fs::read_dir(&self.work_dir).unwrap().count(), 0);
            }
        }
    }

    #[tokio::test]
    async fn test_reference_example_end_to_end() {
        let fx = Fixture::new(&[("A.mp3", 180.0), ("B.mp3", 200.0)], Some(10.0));
        let spec = TargetSpec::new(60).with_crossfade(3.0).with_slowdown(2.0);

        let result = fx.run(&spec).await.unwrap();

        assert_eq!(result.requested_duration, 3600.0);
        assert_eq!(result.realized_duration, 3600.0);
        assert_eq!(result.base_audio_duration, 377.0);
        assert_eq!(result.audio_loops, 10);
        assert_eq!(result.video_cycle_duration, 40.0);
        assert_eq!(result.video_loops, 91);
        assert_eq!(result.playlist, vec!["A.mp3", "B.mp3"]);
        assert_eq!(result.video_source, "clip.mp4");
        assert!(result.within_quantum(1.0 / 30.0));

        assert!(fx.output.exists());
        assert!(manifest_path(&fx.output).exists());
        assert_eq!(std::fs::read_dir(&fx.work_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_sources_are_never_touched() {
        let fx = Fixture::new(&[("A.mp3", 180.0), ("B.mp3", 200.0)], Some(10.0));
        fx.run(&TargetSpec::new(1)).await.unwrap();

        assert!(fx.audio_dir.join("A.mp3").exists());
        assert!(fx.audio_dir.join("B.mp3").exists());
        assert!(fx.video_dir.join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn test_single_track_after_exclusion() {
        let fx = Fixture::new(&[("keep.mp3", 50.0), ("skip.mp3", 70.0)], Some(7.0));
        let spec = TargetSpec::new(2).with_exclude("skip.mp3");

        let result = fx.run(&spec).await.unwrap();
        assert_eq!(result.playlist, vec!["keep.mp3"]);
        assert_eq!(result.base_audio_duration, 50.0);
        assert_eq!(result.audio_loops, 3);
        assert_eq!(result.realized_duration, 120.0);
        assert_eq!(fx.backend.call_count("crossfade"), 0);
    }

    #[tokio::test]
    async fn test_seeded_randomize_reaches_result() {
        let tracks = [("a.mp3", 60.0), ("b.mp3", 61.0), ("c.mp3", 62.0), ("d.mp3", 63.0)];
        let fx = Fixture::new(&tracks, Some(10.0));
        let spec = TargetSpec::new(5).with_randomize(true).with_seed(99);

        let expected = select_playlist(&fx.audio_dir, &spec, fx.backend.as_ref())
            .await
            .unwrap()
            .names();
        let result = fx.run(&spec).await.unwrap();
        assert_eq!(result.playlist, expected);
        assert_eq!(result.realized_duration, 300.0);
    }

    #[tokio::test]
    async fn test_no_tracks_fails_before_transcoding() {
        let fx = Fixture::new(&[], Some(10.0));
        let err = fx.run(&TargetSpec::new(60)).await.unwrap_err();

        assert!(matches!(err, AssemblyError::NoTracksFound { .. }));
        assert_eq!(fx.transcode_calls(), 0);
        fx.assert_clean_failure();
    }

    #[tokio::test]
    async fn test_no_video_fails_before_transcoding() {
        let fx = Fixture::new(&[("A.mp3", 180.0)], None);
        let err = fx.run(&TargetSpec::new(60)).await.unwrap_err();

        assert!(matches!(err, AssemblyError::NoVideoFound { .. }));
        assert_eq!(fx.transcode_calls(), 0);
        fx.assert_clean_failure();
    }

    #[tokio::test]
    async fn test_crossfade_wider_than_track_fails_early() {
        let fx = Fixture::new(&[("A.mp3", 180.0), ("blip.mp3", 2.0)], Some(10.0));
        let err = fx.run(&TargetSpec::new(60).with_crossfade(3.0)).await.unwrap_err();

        assert!(matches!(err, AssemblyError::CrossfadeTooWide { .. }));
        assert_eq!(fx.transcode_calls(), 0);
        fx.assert_clean_failure();
    }

    #[tokio::test]
    async fn test_invalid_target_rejected() {
        let fx = Fixture::new(&[("A.mp3", 180.0)], Some(10.0));
        let err = fx.run(&TargetSpec::new(60).with_slowdown(0.5)).await.unwrap_err();

        assert!(matches!(err, AssemblyError::InvalidTarget(_)));
        assert!(fx.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_any_stage_failure_leaves_nothing_behind() {
        for op in TRANSCODE_OPS {
            let fx = Fixture::new(&[("A.mp3", 180.0), ("B.mp3", 200.0)], Some(10.0));
            fx.backend.fail_on(op);

            let err = fx.run(&TargetSpec::new(60)).await.unwrap_err();
            assert!(
                matches!(err, AssemblyError::StageTranscodeFailure { .. }),
                "{}: unexpected {:?}",
                op,
                err
            );
            assert!(
                err.stderr().is_some_and(|s| s.contains("injected by SimulatedBackend")),
                "{}: stderr tail lost",
                op
            );
            fx.assert_clean_failure();
            assert!(!manifest_path(&fx.output).exists());
        }
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let fx = Fixture::new(&[("A.mp3", 180.0)], Some(10.0));
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let err = fx
            .assembler()
            .with_cancel(rx)
            .assemble(&fx.audio_dir, &fx.video_dir, &fx.output, &TargetSpec::new(60))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        fx.assert_clean_failure();
    }

    /// Raises the cancel signal when `trigger` starts, then never finishes it.
    struct CancelDuring {
        inner: Arc<SimulatedBackend>,
        trigger: &'static str,
        cancel_tx: watch::Sender<bool>,
    }

    impl CancelDuring {
        async fn step(&self, op: &str) {
            if op == self.trigger {
                let _ = self.cancel_tx.send(true);
                std::future::pending::<()>().await;
            }
        }
    }

    #[async_trait]
    impl TranscodeBackend for CancelDuring {
        fn name(&self) -> &'static str {
            "cancel-during"
        }

        async fn probe(&self, input: &Path) -> MediaResult<MediaInfo> {
            self.inner.probe(input).await
        }

        async fn normalize(&self, input: &Path, target: &LoudnessTarget, output: &Path) -> MediaResult<()> {
            self.step("normalize").await;
            self.inner.normalize(input, target, output).await
        }

        async fn crossfade(&self, first: &Path, second: &Path, width: f64, output: &Path) -> MediaResult<()> {
            self.step("crossfade").await;
            self.inner.crossfade(first, second, width, output).await
        }

        async fn concat(&self, inputs: &[&Path], kind: MediaKind, output: &Path) -> MediaResult<()> {
            self.step("concat").await;
            self.inner.concat(inputs, kind, output).await
        }

        async fn stretch(&self, input: &Path, factor: f64, output: &Path) -> MediaResult<()> {
            self.step("stretch").await;
            self.inner.stretch(input, factor, output).await
        }

        async fn reverse(&self, input: &Path, output: &Path) -> MediaResult<()> {
            self.step("reverse").await;
            self.inner.reverse(input, output).await
        }

        async fn trim(&self, input: &Path, kind: MediaKind, duration: f64, output: &Path) -> MediaResult<()> {
            self.step("trim").await;
            self.inner.trim(input, kind, duration, output).await
        }

        async fn mux(&self, video: &Path, audio: &Path, duration: f64, output: &Path) -> MediaResult<()> {
            self.step("mux").await;
            self.inner.mux(video, audio, duration, output).await
        }
    }

    #[tokio::test]
    async fn test_cancel_mid_pipeline_cleans_up() {
        for trigger in ["reverse", "crossfade", "trim"] {
            let fx = Fixture::new(&[("A.mp3", 180.0), ("B.mp3", 200.0)], Some(10.0));
            let (cancel_tx, rx) = watch::channel(false);
            let backend = Arc::new(CancelDuring {
                inner: fx.backend.clone(),
                trigger,
                cancel_tx,
            });
            let config = AssemblyConfig::default()
                .with_work_dir(&fx.work_dir)
                .with_max_parallel_normalize(2);

            let err = Assembler::new(backend, config)
                .with_cancel(rx)
                .assemble(&fx.audio_dir, &fx.video_dir, &fx.output, &TargetSpec::new(60))
                .await
                .unwrap_err();

            assert!(err.is_cancelled(), "{}: unexpected {:?}", trigger, err);
            assert!(fx.backend.call_count("normalize") > 0, "{}: cancelled too early", trigger);
            assert_eq!(fx.backend.call_count("mux"), 0);
            fx.assert_clean_failure();
            assert!(!manifest_path(&fx.output).exists());
        }
    }

    #[tokio::test]
    async fn test_cancel_sender_dropped_does_not_cancel() {
        let fx = Fixture::new(&[("A.mp3", 180.0)], Some(10.0));
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let result = fx
            .assembler()
            .with_cancel(rx)
            .assemble(&fx.audio_dir, &fx.video_dir, &fx.output, &TargetSpec::new(1))
            .await
            .unwrap();
        assert_eq!(result.realized_duration, 60.0);
    }
}
