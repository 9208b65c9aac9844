//! FFmpeg filter definitions for loop assembly.

use loopcast_models::LoudnessTarget;

/// Fade curve used on both sides of a crossfade.
pub const CROSSFADE_CURVE: &str = "tri";

/// Single-pass EBU R128 loudness normalization.
pub fn loudnorm_filter(target: &LoudnessTarget) -> String {
    format!(
        "loudnorm=I={}:TP={}:LRA={}",
        target.integrated, target.true_peak, target.range
    )
}

/// Crossfade the first input's tail into the second input's head.
///
/// The output pad is labelled `[out]`.
pub fn crossfade_filter(width_secs: f64) -> String {
    format!(
        "[0:a][1:a]acrossfade=d={:.6}:c1={curve}:c2={curve}[out]",
        width_secs,
        curve = CROSSFADE_CURVE
    )
}

/// Slow playback down by `factor` by stretching presentation timestamps.
pub fn stretch_filter(factor: f64) -> String {
    format!("setpts={:.6}*PTS", factor)
}

/// Play the clip backwards.
pub const FILTER_REVERSE: &str = "reverse";

/// Render a concat demuxer list for `paths`.
///
/// Single quotes are escaped the way the demuxer expects (`'\''`).
pub fn concat_list<P: AsRef<std::path::Path>>(paths: &[P]) -> String {
    paths
        .iter()
        .map(|p| {
            let escaped = p.as_ref().to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}
