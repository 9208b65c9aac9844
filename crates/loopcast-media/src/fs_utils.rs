//! Filesystem helpers for publishing finished artifacts.
//!
//! Artifacts are produced inside the scratch area and only moved to their
//! final location once complete, so a reader of the destination path never
//! observes a partially written file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a finished file from `src` to `dst`, handling cross-device moves.
///
/// A plain rename is tried first. If the scratch area lives on another
/// filesystem (EXDEV), the file is copied to a hidden sibling of `dst` and
/// renamed into place, so `dst` only ever appears complete.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename detected, falling back to copy+rename: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_then_rename(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Remove `path` if it exists; a missing file is not an error.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> MediaResult<bool> {
    match fs::remove_file(path.as_ref()).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Hidden in-progress sibling of `dst` (`dir/.name.partial`).
fn partial_path(dst: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(".partial");
    dst.with_file_name(name)
}

/// Check if an IO error is EXDEV (cross-device link).
fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV is error code 18 on Linux/macOS
    e.raw_os_error() == Some(18)
}

async fn copy_then_rename(src: &Path, dst: &Path) -> MediaResult<()> {
    let partial = partial_path(dst);

    if let Err(e) = fs::copy(src, &partial).await {
        let _ = fs::remove_file(&partial).await;
        tracing::error!("Failed to copy {} -> {}: {}", src.display(), partial.display(), e);
        return Err(e.into());
    }

    if let Err(e) = fs::rename(&partial, dst).await {
        let _ = fs::remove_file(&partial).await;
        tracing::error!("Failed to rename {} -> {}: {}", partial.display(), dst.display(), e);
        return Err(e.into());
    }

    // The source lives in scratch space; losing it is harmless
    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!("Failed to remove {} after copy: {}", src.display(), e);
    }

    Ok(())
}
