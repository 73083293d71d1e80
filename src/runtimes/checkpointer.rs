//! Checkpoint model and pluggable storage.
//!
//! A checkpoint is a point-in-time snapshot of one run: identity
//! (workflow name, checkpoint id, timestamp, iteration) plus the complete
//! [`PersistedRunState`]: the ordered pending-message queue, pending
//! requests, fan-in buffers, accumulated outputs, and every executor's
//! private state blob. Restoring a checkpoint resumes the superstep loop
//! as if the interruption never happened.
//!
//! Storage is pluggable through [`CheckpointStorage`]; the crate ships an
//! in-memory store (tests, development) and a file-backed store
//! ([`FileCheckpointStorage`](super::FileCheckpointStorage)). Writes happen
//! on the run's critical path between supersteps and are awaited, never
//! fire-and-forget.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::runtimes::persistence::{PersistedRunState, PersistenceError};
use crate::utils::id_generator::IdGenerator;

/// Identity of a stored checkpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CheckpointId(String);

impl CheckpointId {
    #[must_use]
    pub fn generate() -> Self {
        Self(IdGenerator::new().checkpoint_id())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CheckpointId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CheckpointId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A point-in-time snapshot of a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Checkpoint {
    pub workflow_name: String,
    pub checkpoint_id: CheckpointId,
    pub created_at: DateTime<Utc>,
    pub iteration: u64,
    pub state: PersistedRunState,
}

impl Checkpoint {
    /// Build a checkpoint with a fresh id and the current timestamp.
    #[must_use]
    pub fn capture(workflow_name: impl Into<String>, state: PersistedRunState) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            checkpoint_id: CheckpointId::generate(),
            created_at: Utc::now(),
            iteration: state.iteration,
            state,
        }
    }

    #[must_use]
    pub fn meta(&self) -> CheckpointMeta {
        CheckpointMeta {
            workflow_name: self.workflow_name.clone(),
            checkpoint_id: self.checkpoint_id.clone(),
            created_at: self.created_at,
            iteration: self.iteration,
        }
    }
}

/// Listing entry returned by [`CheckpointStorage::list`].
#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointMeta {
    pub workflow_name: String,
    pub checkpoint_id: CheckpointId,
    pub created_at: DateTime<Utc>,
    pub iteration: u64,
}

/// Errors raised by checkpoint capture, storage, or restore.
///
/// These are runner-fatal: a run that cannot persist or reload its state
/// terminates as failed rather than continuing without durability.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("checkpoint `{id}` not found")]
    #[diagnostic(
        code(treadle::checkpoint::not_found),
        help("List checkpoints for the workflow to see what is available.")
    )]
    NotFound { id: CheckpointId },

    #[error("checkpoint `{id}` is corrupt: {detail}")]
    #[diagnostic(code(treadle::checkpoint::corrupt))]
    Corrupt { id: CheckpointId, detail: String },

    #[error(transparent)]
    #[diagnostic(code(treadle::checkpoint::persistence))]
    Persistence(#[from] PersistenceError),

    #[error("checkpoint storage I/O failed: {0}")]
    #[diagnostic(code(treadle::checkpoint::io))]
    Io(#[from] std::io::Error),

    #[error("checkpoint storage error: {0}")]
    #[diagnostic(code(treadle::checkpoint::storage))]
    Storage(String),
}

/// Pluggable persistence for run snapshots.
#[async_trait]
pub trait CheckpointStorage: Send + Sync {
    /// Persist a checkpoint, returning its id.
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId, CheckpointError>;

    /// Load a checkpoint by id.
    async fn load(&self, id: &CheckpointId) -> Result<Checkpoint, CheckpointError>;

    /// Metadata for every checkpoint of one workflow, oldest first.
    async fn list(&self, workflow_name: &str) -> Result<Vec<CheckpointMeta>, CheckpointError>;

    /// Most recent checkpoint for a workflow, if any.
    async fn load_latest(&self, workflow_name: &str) -> Result<Option<Checkpoint>, CheckpointError> {
        let metas = self.list(workflow_name).await?;
        match metas.last() {
            Some(meta) => Ok(Some(self.load(&meta.checkpoint_id).await?)),
            None => Ok(None),
        }
    }
}

/// Volatile storage for tests and development.
#[derive(Default)]
pub struct InMemoryCheckpointStorage {
    inner: Mutex<FxHashMap<CheckpointId, Checkpoint>>,
}

impl InMemoryCheckpointStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl CheckpointStorage for InMemoryCheckpointStorage {
    async fn save(&self, checkpoint: Checkpoint) -> Result<CheckpointId, CheckpointError> {
        let id = checkpoint.checkpoint_id.clone();
        self.inner.lock().unwrap().insert(id.clone(), checkpoint);
        Ok(id)
    }

    async fn load(&self, id: &CheckpointId) -> Result<Checkpoint, CheckpointError> {
        self.inner
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| CheckpointError::NotFound { id: id.clone() })
    }

    async fn list(&self, workflow_name: &str) -> Result<Vec<CheckpointMeta>, CheckpointError> {
        let mut metas: Vec<CheckpointMeta> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|cp| cp.workflow_name == workflow_name)
            .map(Checkpoint::meta)
            .collect();
        metas.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.checkpoint_id.cmp(&b.checkpoint_id))
        });
        Ok(metas)
    }
}
