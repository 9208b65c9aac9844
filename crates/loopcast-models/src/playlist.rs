//! Ordered playlists of audio tracks.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Track;

/// Ordered, filtered list of audio tracks chosen for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Track file names in playlist order.
    pub fn names(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.name.clone()).collect()
    }

    /// Sum of the track durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(|t| t.duration).sum()
    }

    /// Duration of the crossfaded chain built from this playlist.
    ///
    /// Each boundary between adjacent tracks overlaps by `width` seconds.
    pub fn crossfaded_duration(&self, width: f64) -> f64 {
        if self.tracks.is_empty() {
            return 0.0;
        }
        self.total_duration() - (self.tracks.len() - 1) as f64 * width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MediaKind;

    fn playlist(durations: &[(&str, f64)]) -> Playlist {
        Playlist::new(
            durations
                .iter()
                .map(|(name, d)| Track::new(*name, MediaKind::Audio, *d))
                .collect(),
        )
    }

    #[test]
    fn test_crossfaded_duration() {
        let p = playlist(&[("A.mp3", 180.0), ("B.mp3", 200.0)]);
        assert_eq!(p.crossfaded_duration(3.0), 377.0);

        let p = playlist(&[("a", 10.0), ("b", 10.0), ("c", 10.0), ("d", 10.0)]);
        assert_eq!(p.crossfaded_duration(2.0), 34.0);
    }

    #[test]
    fn test_single_track_has_no_overlap() {
        let p = playlist(&[("A.mp3", 180.0)]);
        assert_eq!(p.crossfaded_duration(3.0), 180.0);
        assert_eq!(Playlist::default().crossfaded_duration(3.0), 0.0);
    }

    #[test]
    fn test_names_keep_order() {
        let p = playlist(&[("A.mp3", 180.0), ("B.mp3", 20.0), ("C.mp3", 90.0)]);
        assert_eq!(p.names(), vec!["A.mp3", "B.mp3", "C.mp3"]);
    }
}
