//! Checkpoint persistence.

use crate::{Checkpoint, CheckpointError};
use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Durable home of the [`Checkpoint`].
pub trait CheckpointStore: Send + Sync {
    /// Load the persisted checkpoint, or the initial one if nothing was saved.
    fn load(&self) -> impl Future<Output = Result<Checkpoint, CheckpointError>> + Send;

    /// Persist `checkpoint`, replacing the previous one atomically.
    fn save(
        &self,
        checkpoint: &Checkpoint,
    ) -> impl Future<Output = Result<(), CheckpointError>> + Send;
}

/// JSON checkpoint file.
///
/// Saves go through `<file>.tmp`, are fsynced and then renamed over the
/// target, so `load` only ever sees a complete previous or complete new
/// checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
    start_block: u64,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>, start_block: u64) -> Self {
        Self {
            path: path.into(),
            start_block,
        }
    }

    /// Whether a checkpoint has been persisted yet.
    pub async fn exists(&self) -> Result<bool, CheckpointError> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| self.io_error(source))
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> CheckpointError {
        CheckpointError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn write_temp(&self, tmp: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }

    #[cfg(unix)]
    async fn sync_parent(&self) -> std::io::Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        tokio::fs::File::open(parent).await?.sync_all().await
    }

    #[cfg(not(unix))]
    async fn sync_parent(&self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CheckpointStore for FileCheckpointStore {
    async fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(
                    path = %self.path.display(),
                    start_block = self.start_block,
                    "No checkpoint found, starting fresh"
                );
                return Ok(Checkpoint::initial(self.start_block));
            }
            Err(source) => return Err(self.io_error(source)),
        };

        let checkpoint: Checkpoint =
            serde_json::from_slice(&bytes).map_err(|source| CheckpointError::Corrupt {
                path: self.path.clone(),
                source,
            })?;

        info!(
            path = %self.path.display(),
            last_processed_block = checkpoint.last_processed_block,
            processed = checkpoint.processed_ids.len(),
            "Loaded checkpoint"
        );

        Ok(checkpoint)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        let tmp = self.temp_path();

        self.write_temp(&tmp, &bytes)
            .await
            .map_err(|source| CheckpointError::Io {
                path: tmp.clone(),
                source,
            })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        self.sync_parent()
            .await
            .map_err(|source| self.io_error(source))?;

        debug!(
            path = %self.path.display(),
            last_processed_block = checkpoint.last_processed_block,
            "Saved checkpoint"
        );

        Ok(())
    }
}

/// In-process store. Clones share the same slot.
#[derive(Debug, Clone)]
pub struct MemoryCheckpointStore {
    slot: Arc<Mutex<Option<Checkpoint>>>,
    start_block: u64,
}

impl MemoryCheckpointStore {
    pub fn new(start_block: u64) -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            start_block,
        }
    }

    /// Store pre-seeded with `checkpoint`, as if it had been saved earlier.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        let start_block = checkpoint.last_processed_block.saturating_add(1);
        Self {
            slot: Arc::new(Mutex::new(Some(checkpoint))),
            start_block,
        }
    }

    /// Last saved checkpoint, if any.
    pub fn saved(&self) -> Option<Checkpoint> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> Result<Checkpoint, CheckpointError> {
        let slot = self
            .slot
            .lock()
            .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;
        Ok(slot
            .clone()
            .unwrap_or_else(|| Checkpoint::initial(self.start_block)))
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|e| CheckpointError::Unavailable(e.to_string()))?;
        *slot = Some(checkpoint.clone());
        Ok(())
    }
}
