//! Duration-matched looping: repeat a seed back-to-back, then cut at the target.

use loopcast_media::Segment;

use crate::error::{AssemblyError, PipelineResult, Stage};
use crate::stage::StageContext;

/// Upper bound on seed repetitions in one concat list.
pub const MAX_LOOPS: u64 = 100_000;

/// Repetitions needed to cover `target` seconds with a seed of `seed` seconds.
///
/// `floor(target / seed) + 1`, so `count · seed ≥ target` always holds. When
/// `seed` divides `target` exactly this overshoots by one full seed; the trim
/// removes it. `None` when the count is not finite or exceeds [`MAX_LOOPS`].
pub fn loop_count(seed: f64, target: f64) -> Option<u64> {
    let ratio = (target / seed).floor();
    if !ratio.is_finite() || ratio < 0.0 || ratio >= MAX_LOOPS as f64 {
        return None;
    }
    Some(ratio as u64 + 1)
}

/// [`loop_count`] as a pipeline result, naming `segment` on failure.
pub fn checked_loop_count(segment: &str, seed: f64, target: f64) -> PipelineResult<u64> {
    loop_count(seed, target).ok_or_else(|| AssemblyError::TooManyLoops {
        segment: segment.to_string(),
        seed,
        target,
        max: MAX_LOOPS,
    })
}

/// A seed extended to the target duration.
#[derive(Debug)]
pub struct Extended {
    pub segment: Segment,
    /// Measured duration of the seed
    pub seed_duration: f64,
    /// Number of seed repetitions concatenated before the trim
    pub loops: u64,
}

/// Loop `seed` until it covers `target` seconds and cut it exactly there.
///
/// The seed is re-probed so a seed that cannot be measured, or measures as
/// empty, is rejected before any concatenation.
pub async fn extend_to(ctx: StageContext<'_>, seed: Segment, target: f64) -> PipelineResult<Extended> {
    let backend = ctx.backend();
    let kind = seed.kind();
    let seed_label = seed.label().to_string();

    let seed_duration = match backend.probe_duration(seed.path()).await {
        Ok(d) if d > 0.0 && d.is_finite() => d,
        Ok(d) => {
            return Err(AssemblyError::InvalidSeedDuration {
                segment: seed_label,
                duration: Some(d),
            })
        }
        Err(e) if e.is_cancelled() => return Err(AssemblyError::Cancelled),
        Err(_) => {
            return Err(AssemblyError::InvalidSeedDuration {
                segment: seed_label,
                duration: None,
            })
        }
    };

    let loops = checked_loop_count(&seed_label, seed_duration, target)?;
    ctx.logger().log_stage(
        Stage::Concatenate,
        &format!(
            "Looping {} ({:.3}s) {} times for {:.3}s",
            seed_label, seed_duration, loops, target
        ),
    );

    let looped = ctx
        .produce(
            Stage::Concatenate,
            &seed_label,
            kind,
            &format!("{}_x{}", seed_label, loops),
            |out| {
                let parts = vec![seed.path(); loops as usize];
                async move { backend.concat(&parts, kind, &out).await }
            },
        )
        .await?;
    seed.discard().await;

    let trimmed = ctx
        .produce(
            Stage::Trim,
            looped.label(),
            kind,
            &format!("{}_trim", seed_label),
            |out| {
                let input = looped.path();
                async move { backend.trim(input, kind, target, &out).await }
            },
        )
        .await?;
    looped.discard().await;

    Ok(Extended {
        segment: trimmed,
        seed_duration,
        loops,
    })
}
