//! Shared plumbing for running one backend operation as a pipeline stage.

use std::future::Future;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;

use loopcast_media::{remove_if_exists, MediaResult, ScratchArea, Segment, TranscodeBackend};
use loopcast_models::MediaKind;

use crate::error::{AssemblyError, PipelineResult, Stage};
use crate::logging::RunLogger;
use crate::metrics;

/// Handles every stage needs: the backend, the run's scratch area and its logger.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    backend: &'a dyn TranscodeBackend,
    scratch: &'a ScratchArea,
    logger: &'a RunLogger,
}

impl<'a> StageContext<'a> {
    pub fn new(backend: &'a dyn TranscodeBackend, scratch: &'a ScratchArea, logger: &'a RunLogger) -> Self {
        Self {
            backend,
            scratch,
            logger,
        }
    }

    pub fn backend(&self) -> &'a dyn TranscodeBackend {
        self.backend
    }

    pub fn logger(&self) -> &'a RunLogger {
        self.logger
    }

    /// Run `op` against a freshly allocated scratch path and wrap the result.
    ///
    /// The produced file is probed so the returned [`Segment`] carries its
    /// measured duration. On failure the partial output is removed and the
    /// error is attributed to `stage` and `input`.
    pub async fn produce<F, Fut>(
        &self,
        stage: Stage,
        input: &str,
        kind: MediaKind,
        label: &str,
        op: F,
    ) -> PipelineResult<Segment>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = MediaResult<()>>,
    {
        let output = self.scratch.allocate(label, extension(kind));
        let started = Instant::now();
        let result = op(output.clone()).await;
        metrics::record_stage(stage, started.elapsed().as_secs_f64(), result.is_ok());

        if let Err(e) = result {
            let _ = remove_if_exists(&output).await;
            return Err(AssemblyError::stage_failure(stage, input, e));
        }

        let duration = self
            .backend
            .probe_duration(&output)
            .await
            .map_err(|e| AssemblyError::stage_failure(Stage::Probe, label, e))?;

        debug!(
            run_id = %self.logger.run_id(),
            stage = %stage,
            segment = %label,
            "Produced {:.3}s in {:.2}s", duration, started.elapsed().as_secs_f64()
        );

        Ok(Segment::new(output, kind, duration, label))
    }
}

/// Scratch file extension for intermediates of `kind`.
pub fn extension(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Audio => "wav",
        MediaKind::Video => "mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loopcast_media::SimulatedBackend;
    use loopcast_models::RunId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_produce_probes_output() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let clip = dir.path().join("clip.mp4");
        backend.register_source(&clip, MediaKind::Video, 10.0);

        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let segment = ctx
            .produce(Stage::Stretch, "clip.mp4", MediaKind::Video, "stretched", |out| {
                let backend = &backend;
                let clip = &clip;
                async move { backend.stretch(clip, 2.0, &out).await }
            })
            .await
            .unwrap();

        assert_eq!(segment.duration(), 20.0);
        assert_eq!(segment.label(), "stretched");
        assert!(segment.path().starts_with(scratch.path()));
        assert_eq!(segment.path().extension().unwrap(), "mp4");
    }

    #[tokio::test]
    async fn test_produce_attributes_failure() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let clip = dir.path().join("clip.mp4");
        backend.register_source(&clip, MediaKind::Video, 10.0);
        backend.fail_on("reverse");

        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let err = ctx
            .produce(Stage::Reverse, "clip.mp4", MediaKind::Video, "reversed", |out| {
                let backend = &backend;
                let clip = &clip;
                async move { backend.reverse(clip, &out).await }
            })
            .await
            .unwrap_err();

        match err {
            AssemblyError::StageTranscodeFailure { stage, input, .. } => {
                assert_eq!(stage, Stage::Reverse);
                assert_eq!(input, "clip.mp4");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
