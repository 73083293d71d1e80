use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::Payload;
use crate::runtimes::requests::ResponseType;
use crate::types::{ExecutorId, RequestId, TypeTag, WorkflowRunState};

/// Scope label of the diagnostic emitted when a run's event stream ends.
pub const STREAM_END_SCOPE: &str = "__treadle_stream_end__";

/// Scope label for routing diagnostics (dropped messages, unhandled tags).
pub const ROUTING_SCOPE: &str = "routing";

/// Typed events emitted by the superstep runner.
///
/// Events are published to the [`EventBus`](super::EventBus) only once the
/// superstep that produced them has completed, so stream consumers observe
/// whole supersteps atomically. The serialized form uses a `type`
/// discriminant and snake_case payload fields, ready for wire translators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A fresh run began.
    Started { workflow: String, run_id: String },
    /// The run-state machine transitioned.
    Status { state: WorkflowRunState },
    SuperstepStarted {
        iteration: u64,
    },
    SuperstepCompleted {
        iteration: u64,
        delivered: usize,
        emitted: usize,
    },
    ExecutorInvoked {
        executor_id: ExecutorId,
        tag: TypeTag,
    },
    ExecutorCompleted {
        executor_id: ExecutorId,
    },
    /// A single invocation failed; the run itself may still proceed.
    ExecutorFailed {
        executor_id: ExecutorId,
        detail: String,
    },
    /// An executor suspended for external input.
    RequestInfo {
        request_id: RequestId,
        executor_id: ExecutorId,
        expected: ResponseType,
        prompt: Payload,
    },
    /// An executor yielded a run output.
    Output { data: Payload },
    /// Engine-level note: dropped messages, unhandled tags, stream ends.
    Diagnostic { scope: String, message: String },
    /// The run terminated with a runner-fatal error.
    Failed { detail: String },
}

impl WorkflowEvent {
    pub fn diagnostic(scope: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Diagnostic {
            scope: scope.into(),
            message: message.into(),
        }
    }

    /// Diagnostic marking the end of a run's event stream.
    pub fn stream_end(message: impl Into<String>) -> Self {
        Self::diagnostic(STREAM_END_SCOPE, message)
    }

    /// Whether this event marks the end of a run's event stream.
    #[must_use]
    pub fn is_stream_end(&self) -> bool {
        matches!(self, Self::Diagnostic { scope, .. } if scope == STREAM_END_SCOPE)
    }

    /// Compact JSON form, as sent to wire translators.
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl fmt::Display for WorkflowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { workflow, run_id } => {
                write!(f, "started workflow={workflow} run={run_id}")
            }
            Self::Status { state } => write!(f, "status {state}"),
            Self::SuperstepStarted { iteration } => write!(f, "superstep {iteration} started"),
            Self::SuperstepCompleted {
                iteration,
                delivered,
                emitted,
            } => write!(
                f,
                "superstep {iteration} completed delivered={delivered} emitted={emitted}"
            ),
            Self::ExecutorInvoked { executor_id, tag } => {
                write!(f, "[{executor_id}] invoked with {tag}")
            }
            Self::ExecutorCompleted { executor_id } => write!(f, "[{executor_id}] completed"),
            Self::ExecutorFailed {
                executor_id,
                detail,
            } => write!(f, "[{executor_id}] failed: {detail}"),
            Self::RequestInfo {
                request_id,
                executor_id,
                ..
            } => write!(f, "[{executor_id}] awaiting input ({request_id})"),
            Self::Output { data } => write!(f, "output {data}"),
            Self::Diagnostic { scope, message } => write!(f, "[{scope}] {message}"),
            Self::Failed { detail } => write!(f, "run failed: {detail}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_discriminant() {
        let event = WorkflowEvent::SuperstepStarted { iteration: 3 };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"superstep_started\""));
        assert!(json.contains("\"iteration\":3"));
    }

    #[test]
    fn stream_end_round_trip() {
        let event = WorkflowEvent::stream_end("run=abc status=idle");
        assert!(event.is_stream_end());
        assert!(!WorkflowEvent::diagnostic("routing", "x").is_stream_end());
    }
}
