//! Fixtures shared by the pipeline tests.

use std::path::{Path, PathBuf};

use loopcast_media::SimulatedBackend;
use loopcast_models::MediaKind;

/// Create a placeholder file in `dir` and register it with `backend`.
pub(crate) fn media_file(
    backend: &SimulatedBackend,
    dir: &Path,
    name: &str,
    kind: MediaKind,
    duration: f64,
) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, b"source").unwrap();
    backend.register_source(&path, kind, duration);
    path
}

/// Number of files left in `dir` (recursively).
pub(crate) fn count_files(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}
