//! Final mux of the extended video and audio streams.

use tracing::warn;

use loopcast_media::Segment;
use loopcast_models::MediaKind;

use crate::error::{AssemblyError, PipelineResult, Stage};
use crate::stage::StageContext;

/// Streams whose lengths differ by more than this are logged.
const MISMATCH_TOLERANCE_SECS: f64 = 0.1;

/// Combine `video` and `audio` into one artifact, cut at the shorter stream.
///
/// Both inputs are consumed. The result lives in the scratch area; publishing
/// it is the caller's job.
pub async fn mux_streams(ctx: StageContext<'_>, video: Segment, audio: Segment) -> PipelineResult<Segment> {
    for segment in [&video, &audio] {
        if !segment.path().exists() {
            return Err(AssemblyError::mux(format!(
                "{} input {} is missing",
                segment.kind(),
                segment.path().display()
            )));
        }
        if segment.duration().is_nan() || segment.duration() <= 0.0 {
            return Err(AssemblyError::mux(format!(
                "{} input {} has no duration",
                segment.kind(),
                segment.label()
            )));
        }
    }

    let duration = video.duration().min(audio.duration());
    if (video.duration() - audio.duration()).abs() > MISMATCH_TOLERANCE_SECS {
        warn!(
            video = video.duration(),
            audio = audio.duration(),
            "Stream durations differ, truncating to {:.3}s", duration
        );
    }

    let backend = ctx.backend();
    let input = format!("{} + {}", video.label(), audio.label());
    let muxed = ctx
        .produce(Stage::Mux, &input, MediaKind::Video, "final", |out| {
            let (v, a) = (video.path(), audio.path());
            async move { backend.mux(v, a, duration, &out).await }
        })
        .await?;

    video.discard().await;
    audio.discard().await;
    Ok(muxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RunLogger;
    use crate::testing::media_file;
    use loopcast_media::{ScratchArea, SimulatedBackend};
    use loopcast_models::RunId;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_mux_takes_shorter_stream() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let v = media_file(&backend, scratch.path(), "v.mp4", MediaKind::Video, 3600.0);
        let a = media_file(&backend, scratch.path(), "a.wav", MediaKind::Audio, 3599.5);

        let muxed = mux_streams(
            ctx,
            Segment::new(&v, MediaKind::Video, 3600.0, "video"),
            Segment::new(&a, MediaKind::Audio, 3599.5, "audio"),
        )
        .await
        .unwrap();

        assert_eq!(muxed.duration(), 3599.5);
        assert_eq!(muxed.kind(), MediaKind::Video);
        assert!(!v.exists());
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn test_missing_input_is_mux_error() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let v = media_file(&backend, scratch.path(), "v.mp4", MediaKind::Video, 60.0);
        let err = mux_streams(
            ctx,
            Segment::new(&v, MediaKind::Video, 60.0, "video"),
            Segment::new(scratch.path().join("gone.wav"), MediaKind::Audio, 60.0, "audio"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AssemblyError::MuxError(_)));
        assert_eq!(backend.call_count("mux"), 0);
    }

    #[tokio::test]
    async fn test_zero_duration_is_mux_error() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let v = media_file(&backend, scratch.path(), "v.mp4", MediaKind::Video, 60.0);
        let a = media_file(&backend, scratch.path(), "a.wav", MediaKind::Audio, 0.0);
        let err = mux_streams(
            ctx,
            Segment::new(&v, MediaKind::Video, 60.0, "video"),
            Segment::new(&a, MediaKind::Audio, 0.0, "audio"),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("no duration"));
    }
}
