//! Crossfade chain: a left fold joining normalized segments with fixed-width overlaps.

use tracing::warn;

use loopcast_media::Segment;
use loopcast_models::MediaKind;

use crate::error::{AssemblyError, PipelineResult, Stage};
use crate::stage::StageContext;

/// Allowed difference between measured and expected chain length.
const DURATION_TOLERANCE_SECS: f64 = 0.05;

/// Fail unless every segment is strictly longer than `width`.
pub fn check_width<'a>(
    items: impl IntoIterator<Item = (&'a str, f64)>,
    width: f64,
) -> PipelineResult<()> {
    for (segment, duration) in items {
        if duration <= width {
            return Err(AssemblyError::CrossfadeTooWide {
                segment: segment.to_string(),
                duration,
                width,
            });
        }
    }
    Ok(())
}

/// Fold `segments` into one continuous audio segment.
///
/// Order is preserved: the accumulator's tail always fades into the next
/// segment's head. Consumed inputs are discarded as the fold advances. A
/// single segment comes back unchanged.
pub async fn build_chain(ctx: StageContext<'_>, segments: Vec<Segment>, width: f64) -> PipelineResult<Segment> {
    if segments.len() > 1 {
        check_width(segments.iter().map(|s| (s.label(), s.duration())), width)?;
    }

    let mut segments = segments.into_iter();
    let Some(mut acc) = segments.next() else {
        return Err(AssemblyError::internal("crossfade chain needs at least one segment"));
    };

    let backend = ctx.backend();
    for (step, next) in segments.enumerate() {
        let expected = acc.duration() + next.duration() - width;
        let label = format!("xfade_{:03}", step + 1);
        let input = format!("{} + {}", acc.label(), next.label());

        let joined = ctx
            .produce(Stage::Crossfade, &input, MediaKind::Audio, &label, |out| {
                let (first, second) = (acc.path(), next.path());
                async move { backend.crossfade(first, second, width, &out).await }
            })
            .await?;

        if (joined.duration() - expected).abs() > DURATION_TOLERANCE_SECS {
            warn!(
                segment = %label,
                "Crossfade produced {:.3}s, expected {:.3}s", joined.duration(), expected
            );
        }

        acc.discard().await;
        next.discard().await;
        acc = joined;
    }

    ctx.logger().log_stage(
        Stage::Crossfade,
        &format!("Base audio is {:.3}s", acc.duration()),
    );
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::RunLogger;
    use crate::testing::media_file;
    use loopcast_media::{ScratchArea, SimulatedBackend};
    use loopcast_models::{Playlist, RunId, Track};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::TempDir;

    fn segments(backend: &SimulatedBackend, scratch: &ScratchArea, tracks: &[(&str, f64)]) -> Vec<Segment> {
        tracks
            .iter()
            .map(|(name, d)| {
                let path = media_file(backend, scratch.path(), name, MediaKind::Audio, *d);
                Segment::new(path, MediaKind::Audio, *d, *name)
            })
            .collect()
    }

    /// `Σd − (n−1)·width` for `tracks`, as the playlist reports it.
    fn expected_length(tracks: &[(&str, f64)], width: f64) -> f64 {
        Playlist::new(
            tracks
                .iter()
                .map(|(name, d)| Track::new(*name, MediaKind::Audio, *d))
                .collect(),
        )
        .crossfaded_duration(width)
    }

    #[test]
    fn test_check_width() {
        assert!(check_width([("a", 4.0), ("b", 3.5)], 3.0).is_ok());
        let err = check_width([("a", 4.0), ("b", 3.0)], 3.0).unwrap_err();
        assert!(matches!(err, AssemblyError::CrossfadeTooWide { ref segment, .. } if segment == "b"));
    }

    #[tokio::test]
    async fn test_two_track_example() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let inputs = segments(&backend, &scratch, &[("A.wav", 180.0), ("B.wav", 200.0)]);
        let input_paths: Vec<_> = inputs.iter().map(|s| s.path().to_path_buf()).collect();

        let chain = build_chain(ctx, inputs, 3.0).await.unwrap();
        assert_eq!(chain.duration(), 377.0);
        assert_eq!(backend.media(chain.path()).unwrap().sources, vec!["A.wav", "B.wav"]);
        for path in input_paths {
            assert!(!path.exists(), "consumed segment {} not discarded", path.display());
        }
    }

    #[tokio::test]
    async fn test_fold_preserves_adjacency_and_duration() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let tracks = [("c.wav", 40.0), ("a.wav", 25.0), ("d.wav", 31.0), ("b.wav", 12.0)];
        let inputs = segments(&backend, &scratch, &tracks);

        let chain = build_chain(ctx, inputs, 2.0).await.unwrap();
        assert_eq!(chain.duration(), expected_length(&tracks, 2.0));
        assert_eq!(
            backend.media(chain.path()).unwrap().sources,
            vec!["c.wav", "a.wav", "d.wav", "b.wav"]
        );
        assert_eq!(backend.call_count("crossfade"), 3);
    }

    #[tokio::test]
    async fn test_random_playlists_match_crossfaded_duration() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for round in 0..64 {
            let width = rng.random_range(1..=4) as f64;
            let count = rng.random_range(1..=8);
            let tracks: Vec<(String, f64)> = (0..count)
                .map(|i| (format!("t{}.wav", i), rng.random_range(5..300) as f64))
                .collect();

            let dir = TempDir::new().unwrap();
            let backend = SimulatedBackend::new();
            let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
            let logger = RunLogger::new(&RunId::new());
            let ctx = StageContext::new(&backend, &scratch, &logger);
            let named: Vec<(&str, f64)> = tracks.iter().map(|(n, d)| (n.as_str(), *d)).collect();
            let inputs = segments(&backend, &scratch, &named);

            let chain = build_chain(ctx, inputs, width).await.unwrap();
            assert_eq!(
                chain.duration(),
                expected_length(&named, width),
                "round {}: {:?} with width {}",
                round,
                named,
                width
            );
            let names: Vec<String> = tracks.into_iter().map(|(n, _)| n).collect();
            assert_eq!(backend.media(chain.path()).unwrap().sources, names);
            assert_eq!(backend.call_count("crossfade"), count - 1);
        }
    }

    #[tokio::test]
    async fn test_single_segment_returned_unchanged() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let inputs = segments(&backend, &scratch, &[("solo.wav", 2.0)]);
        let path = inputs[0].path().to_path_buf();

        let chain = build_chain(ctx, inputs, 3.0).await.unwrap();
        assert_eq!(chain.path(), path);
        assert_eq!(chain.duration(), 2.0);
        assert_eq!(backend.call_count("crossfade"), 0);
    }

    #[tokio::test]
    async fn test_too_wide_fails_before_transcoding() {
        let dir = TempDir::new().unwrap();
        let backend = SimulatedBackend::new();
        let scratch = ScratchArea::create_in(dir.path(), "run-").unwrap();
        let logger = RunLogger::new(&RunId::new());
        let ctx = StageContext::new(&backend, &scratch, &logger);

        let inputs = segments(&backend, &scratch, &[("a.wav", 10.0), ("short.wav", 2.5)]);
        let err = build_chain(ctx, inputs, 3.0).await.unwrap_err();
        assert!(matches!(err, AssemblyError::CrossfadeTooWide { .. }));
        assert_eq!(backend.call_count("crossfade"), 0);
    }
}
