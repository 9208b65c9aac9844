//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` stream.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number (video encodes only)
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Output position in seconds.
    pub fn out_time_secs(&self) -> f64 {
        self.out_time_ms as f64 / 1000.0
    }
}

/// Classification of one line of FFmpeg stderr.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ProgressLine {
    /// End of a progress block; carries the accumulated snapshot
    Update(FfmpegProgress),
    /// A `key=value` progress field folded into the running snapshot
    Field,
    /// Anything else (diagnostics, errors)
    Other,
}

/// Parse one line of `-progress pipe:2` output into `current`.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> ProgressLine {
    let line = line.trim();

    let Some((key, value)) = line.split_once('=') else {
        return ProgressLine::Other;
    };
    if !is_progress_key(key) {
        return ProgressLine::Other;
    }

    match key {
        // FFmpeg reports out_time_ms in microseconds despite the name
        "out_time_us" | "out_time_ms" => {
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return ProgressLine::Update(current.clone());
        }
        _ => {}
    }

    ProgressLine::Field
}

fn is_progress_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_snapshot_compares_equal() {
        let mut progress = FfmpegProgress::default();
        parse_progress_line("out_time_us=2500000", &mut progress);
        let expected = FfmpegProgress {
            out_time_ms: 2500,
            is_complete: true,
            ..Default::default()
        };
        assert_eq!(parse_progress_line("progress=end", &mut progress), ProgressLine::Update(expected));
        assert!((progress.out_time_secs() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_progress_parsing() {
        let mut progress = FfmpegProgress::default();

        assert_eq!(
            parse_progress_line("out_time_us=5000000", &mut progress),
            ProgressLine::Field
        );
        assert_eq!(progress.out_time_ms, 5000);

        parse_progress_line("speed=1.5x", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        parse_progress_line("speed=N/A", &mut progress);
        assert!((progress.speed - 1.5).abs() < 0.01);

        match parse_progress_line("progress=end", &mut progress) {
            ProgressLine::Update(p) => assert!(p.is_complete),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_diagnostics_are_not_progress() {
        let mut progress = FfmpegProgress::default();
        assert_eq!(
            parse_progress_line("[mp3 @ 0x55] Header missing", &mut progress),
            ProgressLine::Other
        );
        assert_eq!(
            parse_progress_line("Error opening input: frame size=0", &mut progress),
            ProgressLine::Other
        );
    }
}
