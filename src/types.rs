//! Core identifier types for the treadle workflow engine.
//!
//! This module defines the fundamental identity types used throughout the
//! engine: executor ids, message type tags, request ids, and the run-state
//! enumeration that drives the superstep loop.
//!
//! # Key Types
//!
//! - [`ExecutorId`]: Stable identity of a node in the workflow graph
//! - [`TypeTag`]: Discriminant used for exact-match handler dispatch
//! - [`RequestId`]: Identity of a pending external-input request
//! - [`WorkflowRunState`]: The run-level state machine
//!
//! # Examples
//!
//! ```rust
//! use treadle::types::{ExecutorId, TypeTag, WorkflowRunState};
//!
//! let id: ExecutorId = "triage".into();
//! assert_eq!(id.as_str(), "triage");
//!
//! let tag = TypeTag::new("chat.conversation");
//! assert_eq!(tag.to_string(), "chat.conversation");
//!
//! assert!(!WorkflowRunState::Running.is_terminal());
//! assert!(WorkflowRunState::Idle.is_terminal());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of an executor within a workflow graph.
///
/// Executor ids must be unique within a graph; the builder rejects duplicate
/// registrations. Ids are plain strings so they round-trip through
/// checkpoints and event payloads without an encoding step.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutorId(String);

impl ExecutorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Reserved id used as the source of externally injected messages
    /// (initial inputs and interrupt responses).
    #[must_use]
    pub fn external() -> Self {
        Self("__external__".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// `GraphViolation` (see `graphs::validation`) has variants with a field
// literally named `source` that hold an `ExecutorId`, not an underlying
// error. thiserror's derive treats any field named `source` as the
// `Error::source()` chain regardless of intent, so this impl is required
// for those variants to compile; it never yields an actual source error.
impl std::error::Error for ExecutorId {}

impl From<&str> for ExecutorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ExecutorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Discriminant identifying the runtime type of a message payload.
///
/// Dispatch is exact-tag lookup: an executor handles a message only when the
/// message's tag appears verbatim in the executor's declared input tags.
/// There is no inheritance or fallback matching; an unhandled tag is
/// reported as a diagnostic event and the message is dropped.
///
/// Tags are dotted lowercase by convention (`"chat.conversation"`,
/// `"io.response"`), but any string is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeTag(String);

impl TypeTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeTag {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TypeTag {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Identity of a pending external-input request.
///
/// Generated by the runner context when an executor calls
/// `request_input`; callers echo it back when resuming the run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh, globally unique request id.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("req-{}", uuid::Uuid::new_v4()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Run-level state machine for a workflow execution.
///
/// Transitions: `Starting → Running → {Idle | IdleWithPendingRequests |
/// Cancelled | Failed}`. `Idle` is the successful terminal state;
/// `IdleWithPendingRequests` is terminal-for-now and resumable by supplying
/// responses to the pending requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunState {
    Starting,
    Running,
    Idle,
    IdleWithPendingRequests,
    Cancelled,
    Failed,
}

impl WorkflowRunState {
    /// Whether the run has stopped making progress on its own.
    ///
    /// `IdleWithPendingRequests` counts as terminal here even though the run
    /// can be resumed with responses.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Starting | Self::Running)
    }

    /// Whether the run can be continued by supplying interrupt responses.
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::IdleWithPendingRequests)
    }
}

impl fmt::Display for WorkflowRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Idle => "idle",
            Self::IdleWithPendingRequests => "idle_with_pending_requests",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_terminality() {
        assert!(!WorkflowRunState::Starting.is_terminal());
        assert!(!WorkflowRunState::Running.is_terminal());
        assert!(WorkflowRunState::Idle.is_terminal());
        assert!(WorkflowRunState::IdleWithPendingRequests.is_terminal());
        assert!(WorkflowRunState::IdleWithPendingRequests.is_resumable());
        assert!(!WorkflowRunState::Idle.is_resumable());
    }

    #[test]
    fn executor_id_round_trip() {
        let id = ExecutorId::new("writer");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"writer\"");
        let back: ExecutorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
