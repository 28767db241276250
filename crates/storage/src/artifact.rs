use idscan_core::BatchResult;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ARTIFACT_FILE_NAME: &str = "ocr_results.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn artifact_path(output_dir: &Path) -> PathBuf {
    output_dir.join(ARTIFACT_FILE_NAME)
}

/// Write the whole batch as pretty-printed UTF-8 JSON.
///
/// The document goes to a sibling temp file first and is renamed into
/// place, so a reader never sees a half-written artifact.
pub async fn write_artifact(path: &Path, batch: &BatchResult) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut data = serde_json::to_vec_pretty(batch)?;
    data.push(b'\n');

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &data).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    tracing::debug!("Wrote {} results to {}", batch.len(), path.display());
    Ok(())
}

pub async fn read_artifact(path: &Path) -> Result<BatchResult, StorageError> {
    let data = tokio::fs::read(path).await?;
    Ok(serde_json::from_slice(&data)?)
}
