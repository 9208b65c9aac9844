//! JSON sidecar describing a finished run.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use loopcast_models::RunManifest;

use crate::error::{AssemblyError, PipelineResult};

/// `<output>.json` next to the artifact, e.g. `mix.mp4` -> `mix.mp4.json`.
pub fn manifest_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.file_name().unwrap_or_default());
    name.push(".json");
    output.with_file_name(name)
}

/// Write `manifest` next to `output` and return the manifest path.
pub async fn write_manifest(manifest: &RunManifest, output: &Path) -> PipelineResult<PathBuf> {
    let path = manifest_path(output);
    let json = serde_json::to_vec_pretty(manifest)
        .map_err(|e| AssemblyError::internal(format!("failed to serialize manifest: {}", e)))?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}
