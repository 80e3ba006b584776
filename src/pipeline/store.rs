//! Snapshot persistence

use async_trait::async_trait;
use log::{debug, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::time::timeout;

use super::state::PipelineState;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// Bound on blocking serialisation and file writes.
const BLOCKING_IO_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait StateStore: Send + Sync {
    /// `Ok(None)` when no snapshot exists.
    async fn load(&self) -> Result<Option<PipelineState>>;

    async fn save(&self, state: &PipelineState) -> Result<()>;

    /// Remove any existing snapshot.
    async fn reset(&self) -> Result<()>;
}

/// Pretty-printed JSON file, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.state_path())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn load(&self) -> Result<Option<PipelineState>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(PipelineError::Persistence(format!(
                    "cannot read {}: {e}",
                    self.path.display()
                )));
            }
        };
        let state = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::Persistence(format!("corrupt snapshot {}: {e}", self.path.display()))
        })?;
        Ok(Some(state))
    }

    async fn save(&self, state: &PipelineState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let path = self.path.clone();

        let task = tokio::task::spawn_blocking(move || write_atomically(&path, &bytes));
        match timeout(BLOCKING_IO_TIMEOUT, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(PipelineError::Persistence(format!(
                    "snapshot write task panicked: {e}"
                )));
            }
            Err(_) => {
                warn!("Snapshot write timeout (timeout: {BLOCKING_IO_TIMEOUT:?})");
                return Err(PipelineError::Persistence(format!(
                    "snapshot write timed out after {BLOCKING_IO_TIMEOUT:?}"
                )));
            }
        }

        debug!("Saved pipeline state to {}", self.path.display());
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
