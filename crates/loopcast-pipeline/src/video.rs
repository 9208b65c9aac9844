//! Video temporal transform: slow the clip down and join it with its own reverse.

use loopcast_media::Segment;
use loopcast_models::{MediaKind, Track};

use crate::error::{AssemblyError, PipelineResult, Stage};
use crate::stage::StageContext;

/// Build the ping-pong cycle for `video`: forward at `1/factor` speed, then
/// the same footage backwards.
///
/// The cycle lasts `2 · factor · d` and ends on the frame it starts with, so
/// looping it has no visible cut. A factor of 1 still re-encodes the forward
/// half so both halves share codec parameters.
pub async fn build_ping_pong(ctx: StageContext<'_>, video: &Track, factor: f64) -> PipelineResult<Segment> {
    if !factor.is_finite() || factor < 1.0 {
        return Err(AssemblyError::InvalidTarget(format!(
            "slow-down factor must be finite and at least 1, got {}",
            factor
        )));
    }
    if video.duration.is_nan() || video.duration <= 0.0 {
        return Err(AssemblyError::InvalidSeedDuration {
            segment: video.name.clone(),
            duration: Some(video.duration),
        });
    }

    let backend = ctx.backend();
    ctx.logger().log_stage(
        Stage::Stretch,
        &format!(
            "Building ping-pong cycle from {} ({:.3}s, slow-down {}x)",
            video.name, video.duration, factor
        ),
    );

    let forward = ctx
        .produce(Stage::Stretch, &video.name, MediaKind::Video, "forward", |out| async move {
            backend.stretch(&video.path, factor, &out).await
        })
        .await?;

    let backward = ctx
        .produce(Stage::Reverse, forward.label(), MediaKind::Video, "backward", |out| {
            let input = forward.path();
            async move { backend.reverse(input, &out).await }
        })
        .await?;

    let cycle = ctx
        .produce(Stage::Concatenate, "forward + backward", MediaKind::Video, "cycle", |out| {
            let parts = [forward.path(), backward.path()];
            async move { backend.concat(&parts, MediaKind::Video, &out).await }
        })
        .await?;

    forward.discard().await;
    backward.discard().await;

    ctx.logger().log_stage(
        Stage::Concatenate,
        &format!("Ping-pong cycle is {:.3}s", cycle.duration()),
    );
    Ok(cycle)
}
