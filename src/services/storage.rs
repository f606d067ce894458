//! Archive of preprocessed drawings on local disk.
//!
//! This is an orchestrator-owned side effect, not part of the quoting
//! contract: filenames are unique per request, and a write failure must not
//! fail the upload (quoting outranks archival).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

#[derive(Debug, Clone)]
pub struct DrawingStore {
    dir: PathBuf,
}

impl DrawingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `bytes` under `filename`, creating the archive directory on
    /// first use. Returns the full path written.
    pub async fn archive(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create archive dir {}", self.dir.display()))?;

        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!(path = %path.display(), bytes = bytes.len(), "Drawing archived");
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
