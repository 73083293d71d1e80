/*!
Serde-friendly persisted shapes for run state and checkpoints, decoupled
from the in-memory representations used by the runner.

Design goals, shared with every storage backend:
- Explicit structs with `#[serde(default)]` escape hatches so older
  checkpoints keep loading as fields are added.
- Conversion logic localized here (From / TryFrom impls) so storage code
  stays lean and declarative.
- Timestamps stored as RFC3339 strings, keeping `chrono::DateTime` out of
  the serialized shape.

This module performs no I/O; it is pure data transformation.
*/

use chrono::Utc;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{Payload, WorkflowMessage};
use crate::runtimes::checkpointer::Checkpoint;
use crate::runtimes::requests::PendingRequest;
use crate::runtimes::routing::EdgeRunnerState;
use crate::types::{ExecutorId, WorkflowRunState};

/// One executor's private state blob, captured at checkpoint time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutorStateEntry {
    pub executor_id: ExecutorId,
    pub blob: Payload,
}

/// Complete persisted shape of a run at a superstep boundary.
///
/// Restoring this must reproduce byte-identical pending-message ordering
/// and executor state: the pending queue is stored as an ordered vector and
/// the join buffers keep their generation counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedRunState {
    pub run_state: WorkflowRunState,
    pub iteration: u64,
    #[serde(default)]
    pub pending: Vec<WorkflowMessage>,
    #[serde(default)]
    pub requests: Vec<PendingRequest>,
    #[serde(default)]
    pub joins: EdgeRunnerState,
    #[serde(default)]
    pub outputs: Vec<Payload>,
    #[serde(default)]
    pub executor_state: Vec<ExecutorStateEntry>,
}

/// Full persisted checkpoint representation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedCheckpoint {
    pub workflow_name: String,
    pub checkpoint_id: String,
    /// RFC3339 creation time.
    pub created_at: String,
    pub iteration: u64,
    pub state: PersistedRunState,
}

/// Conversion and serialization errors for persistence models.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(treadle::persistence::serde),
        help("Ensure the JSON document matches the Persisted* shapes.")
    )]
    Serde {
        #[source]
        source: serde_json::Error,
    },

    #[error("persistence error: {0}")]
    #[diagnostic(code(treadle::persistence::other))]
    Other(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(source: serde_json::Error) -> Self {
        Self::Serde { source }
    }
}

/* ---------- Checkpoint <-> PersistedCheckpoint ---------- */

impl From<&Checkpoint> for PersistedCheckpoint {
    fn from(cp: &Checkpoint) -> Self {
        PersistedCheckpoint {
            workflow_name: cp.workflow_name.clone(),
            checkpoint_id: cp.checkpoint_id.to_string(),
            created_at: cp.created_at.to_rfc3339(),
            iteration: cp.iteration,
            state: cp.state.clone(),
        }
    }
}

impl From<PersistedCheckpoint> for Checkpoint {
    fn from(p: PersistedCheckpoint) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Checkpoint {
            workflow_name: p.workflow_name,
            checkpoint_id: p.checkpoint_id.into(),
            created_at,
            iteration: p.iteration,
            state: p.state,
        }
    }
}

impl PersistedCheckpoint {
    pub fn to_json_string(&self) -> Result<String, PersistenceError> {
        serde_json::to_string_pretty(self).map_err(Into::into)
    }

    pub fn from_json_str(s: &str) -> Result<Self, PersistenceError> {
        serde_json::from_str(s).map_err(Into::into)
    }
}
