//! Owned intermediate media artifacts and the per-run scratch area.
//!
//! A [`Segment`] is a file produced by one pipeline stage. It is not `Clone`:
//! whoever holds it owns the file, hands it to the next stage by move, and
//! calls [`Segment::discard`] once the contents are no longer needed. All
//! segments live inside a [`ScratchArea`], whose directory is removed when the
//! area is dropped, so every exit path releases intermediate files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;
use tracing::debug;

use loopcast_models::MediaKind;

use crate::error::MediaResult;

/// A produced media file with a measured duration.
#[derive(Debug)]
pub struct Segment {
    path: PathBuf,
    kind: MediaKind,
    duration: f64,
    label: String,
}

impl Segment {
    pub fn new(path: impl Into<PathBuf>, kind: MediaKind, duration: f64, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            duration,
            label: label.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Measured duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Human-readable identity used in logs and errors.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Delete the backing file.
    ///
    /// Failure is logged, not returned: the scratch area removes leftovers.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            debug!(
                segment = %self.label,
                path = %self.path.display(),
                "Failed to discard segment: {}", e
            );
        }
    }

    /// Release ownership of the file without deleting it.
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Per-run temporary directory that holds every intermediate segment.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
    counter: AtomicUsize,
}

impl ScratchArea {
    /// Create a fresh scratch directory inside `parent`.
    pub fn create_in(parent: impl AsRef<Path>, prefix: &str) -> MediaResult<Self> {
        let parent = parent.as_ref();
        std::fs::create_dir_all(parent)?;
        let dir = tempfile::Builder::new().prefix(prefix).tempdir_in(parent)?;
        debug!(path = %dir.path().display(), "Created scratch area");
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Allocate a unique file path for a new artifact.
    ///
    /// `stem` is sanitized so track names can be embedded safely.
    pub fn allocate(&self, stem: &str, extension: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let stem: String = stem
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .take(48)
            .collect();
        self.dir.path().join(format!("{:04}_{}.{}", n, stem, extension))
    }
}
