//! File-backed checkpoint storage.
//!
//! Each checkpoint is one pretty-printed JSON document named
//! `<checkpoint_id>.json` under the store's directory. Listing scans the
//! directory and reads each document's header fields; suitable for the
//! checkpoint counts a single process produces, not as a shared database.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::checkpointer::{
    Checkpoint, CheckpointError, CheckpointId, CheckpointMeta, CheckpointStorage,
};
use super::persistence::PersistedCheckpoint;

/// Durable checkpoint store rooted at a directory.
#[derive(Clone, Debug)]
pub struct FileCheckpointStorage {
    dir: PathBuf,
}

impl FileCheckpointStorage {
    /// Create a store rooted at `dir`. The directory is created lazily on
    /// the first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &CheckpointId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    async fn read_document(&self, path: &Path, id: &CheckpointId) -> Result<Checkpoint, CheckpointError> {
        let bytes = match fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound { id: id.clone() });
            }
            Err(e) => return Err(CheckpointError::Io(e)),
        };
        let text = String::from_utf8(bytes).map_err(|e| CheckpointError::Corrupt {
            id: id.clone(),
            detail: format!("not valid UTF-8: {e}"),
        })?;
        let persisted =
            PersistedCheckpoint::from_json_str(&text).map_err(|e| CheckpointError::Corrupt {
                id: id.clone(),
                detail: e.to_string(),
            })?;
        Ok(persisted.into())
    }
}

#[async_trait]
impl CheckpointStorage for FileCheckpointStorage {
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId, CheckpointError> {
        fs::create_dir_all(&self.dir).await?;
        let id = checkpoint.checkpoint_id.clone();
        let document = PersistedCheckpoint::from(&checkpoint).to_json_string()?;
        // Write-then-rename so a crash mid-write never leaves a torn document.
        let tmp = self.dir.join(format!("{id}.json.tmp"));
        fs::write(&tmp, document.as_bytes()).await?;
        fs::rename(&tmp, self.path_for(&id)).await?;
        Ok(id)
    }

    async fn load(&self, id: &CheckpointId) -> Result<Checkpoint, CheckpointError> {
        self.read_document(&self.path_for(id), id).await
    }

    async fn list(&self, workflow_name: &str) -> Result<Vec<CheckpointMeta>, CheckpointError> {
        let mut metas = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(metas),
            Err(e) => return Err(CheckpointError::Io(e)),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let Some(stem) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(id) = stem.strip_suffix(".json") else {
                continue;
            };
            let id = CheckpointId::from(id);
            match self.read_document(&path, &id).await {
                Ok(cp) if cp.workflow_name == workflow_name => metas.push(cp.meta()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(checkpoint = %id, error = %e, "skipping unreadable checkpoint");
                }
            }
        }
        metas.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.checkpoint_id.cmp(&b.checkpoint_id))
        });
        Ok(metas)
    }
}
