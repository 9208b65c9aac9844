//! Per-track loudness normalization.

use futures::future::try_join_all;
use tokio::sync::Semaphore;

use loopcast_media::Segment;
use loopcast_models::{LoudnessTarget, MediaKind, Playlist, Track};

use crate::error::{AssemblyError, PipelineResult, Stage};
use crate::stage::StageContext;

/// Normalize every playlist track, at most `max_parallel` at a time.
///
/// The output keeps playlist order. The first failure aborts the rest.
pub async fn normalize_playlist(
    ctx: StageContext<'_>,
    playlist: &Playlist,
    target: &LoudnessTarget,
    max_parallel: usize,
) -> PipelineResult<Vec<Segment>> {
    let semaphore = Semaphore::new(max_parallel.max(1));
    ctx.logger().log_stage(
        Stage::Normalize,
        &format!(
            "Normalizing {} tracks to {} LUFS ({} in parallel)",
            playlist.len(),
            target.integrated,
            max_parallel.max(1)
        ),
    );

    let jobs = playlist.tracks().iter().enumerate().map(|(index, track)| {
        let semaphore = &semaphore;
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|_| AssemblyError::internal("normalize semaphore closed"))?;
            normalize_track(ctx, index, track, target).await
        }
    });

    try_join_all(jobs).await
}

async fn normalize_track(
    ctx: StageContext<'_>,
    index: usize,
    track: &Track,
    target: &LoudnessTarget,
) -> PipelineResult<Segment> {
    let label = format!("norm_{:03}_{}", index, track.name);
    let backend = ctx.backend();
    ctx.produce(Stage::Normalize, &track.name, MediaKind::Audio, &label, |out| async move {
        backend.normalize(&track.path, target, &out).await
    })
    .await
}
