//! Track discovery and playlist selection.
//!
//! Everything here only lists directories and probes files; no transcoding
//! happens, so input problems surface before any expensive work starts.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use loopcast_media::{MediaError, TranscodeBackend};
use loopcast_models::{MediaKind, Playlist, TargetSpec, Track};

use crate::error::{AssemblyError, PipelineResult, Stage};

/// Recognized media files of `kind` directly inside `dir`, sorted by file name.
///
/// Subdirectories are not descended into and hidden files are ignored.
pub async fn list_media_files(dir: &Path, kind: MediaKind) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || MediaKind::from_path(&path) != Some(kind) {
            continue;
        }
        if tokio::fs::metadata(&path).await?.is_file() {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Drop the file whose name equals `name` exactly.
///
/// Returns whether anything was removed.
pub fn exclude_by_name(files: &mut Vec<PathBuf>, name: &str) -> bool {
    let before = files.len();
    files.retain(|p| p.file_name().map_or(true, |n| n != name));
    files.len() != before
}

/// Fisher–Yates shuffle: for `i` from last down to 1, swap `i` with a uniform `j` in `[0, i]`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Probe one file into a [`Track`].
pub async fn probe_track(backend: &dyn TranscodeBackend, path: &Path, kind: MediaKind) -> PipelineResult<Track> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let info = backend
        .probe(path)
        .await
        .map_err(|e| AssemblyError::stage_failure(Stage::Probe, &name, e))?;

    if !(info.duration.is_finite() && info.duration > 0.0) {
        return Err(AssemblyError::stage_failure(
            Stage::Probe,
            &name,
            MediaError::invalid_media(format!("no usable duration reported for {}", name)),
        ));
    }

    let codec = match kind {
        MediaKind::Audio => info.audio_codec,
        MediaKind::Video => info.video_codec,
    };
    Ok(Track::new(path, kind, info.duration).with_format(codec, info.format_name))
}

/// Discover and probe every track of `kind` in `dir`, in name order.
pub async fn discover_tracks(
    dir: &Path,
    kind: MediaKind,
    backend: &dyn TranscodeBackend,
) -> PipelineResult<Vec<Track>> {
    let files = list_or_empty(dir, kind).await?;
    let mut tracks = Vec::with_capacity(files.len());
    for path in &files {
        tracks.push(probe_track(backend, path, kind).await?);
    }
    Ok(tracks)
}

/// Build the run's playlist from the audio pool in `dir`.
pub async fn select_playlist(
    dir: &Path,
    spec: &TargetSpec,
    backend: &dyn TranscodeBackend,
) -> PipelineResult<Playlist> {
    let mut files = list_or_empty(dir, MediaKind::Audio).await?;
    let pool = files.len();

    if let Some(name) = spec.exclude.as_deref() {
        if exclude_by_name(&mut files, name) {
            info!(excluded = %name, "Excluded track from playlist");
        } else {
            info!(excluded = %name, dir = %dir.display(), "Excluded track not in audio pool");
        }
    }

    if files.is_empty() {
        return Err(AssemblyError::NoTracksFound {
            dir: dir.to_path_buf(),
        });
    }

    if spec.randomize {
        let mut rng = match spec.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        shuffle(&mut files, &mut rng);
    }

    let mut tracks = Vec::with_capacity(files.len());
    for path in &files {
        tracks.push(probe_track(backend, path, MediaKind::Audio).await?);
    }

    let playlist = Playlist::new(tracks);
    debug!(
        pool,
        selected = playlist.len(),
        randomized = spec.randomize,
        "Playlist: {}", playlist.names().join(", ")
    );
    Ok(playlist)
}

/// Pick the video source: the first recognized video file in `dir` by name.
pub async fn select_video(dir: &Path, backend: &dyn TranscodeBackend) -> PipelineResult<Track> {
    let files = list_or_empty(dir, MediaKind::Video).await?;
    let Some(first) = files.first() else {
        return Err(AssemblyError::NoVideoFound {
            dir: dir.to_path_buf(),
        });
    };

    if files.len() > 1 {
        debug!(
            candidates = files.len(),
            chosen = %first.display(),
            "Several videos found, using the first by name"
        );
    }

    probe_track(backend, first, MediaKind::Video).await
}

/// A missing directory is treated as an empty pool.
async fn list_or_empty(dir: &Path, kind: MediaKind) -> PipelineResult<Vec<PathBuf>> {
    match list_media_files(dir, kind).await {
        Ok(files) => Ok(files),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}
