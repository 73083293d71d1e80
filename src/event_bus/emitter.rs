use std::fmt;
use thiserror::Error;

use super::event::WorkflowEvent;

/// Abstract event emitter handed to the runner; cheap to clone.
pub trait EventEmitter: Send + Sync + fmt::Debug {
    /// Emit an event in a synchronous, non-blocking manner.
    fn emit(&self, event: WorkflowEvent) -> Result<(), EmitterError>;
}

/// Errors that can occur when emitting an event.
#[derive(Debug, Error)]
pub enum EmitterError {
    #[error("event bus closed")]
    Closed,
    #[error("event lag exceeded buffer; dropped {0} events")]
    Lagged(usize),
    #[error("event emission failed: {0}")]
    Other(String),
}

impl EmitterError {
    pub fn other(error: impl Into<String>) -> Self {
        Self::Other(error.into())
    }
}

/// Emitter backed by the bus's flume ingest channel.
#[derive(Clone, Debug)]
pub struct BusEmitter {
    pub(super) sender: flume::Sender<WorkflowEvent>,
}

impl EventEmitter for BusEmitter {
    fn emit(&self, event: WorkflowEvent) -> Result<(), EmitterError> {
        self.sender.send(event).map_err(|_| EmitterError::Closed)
    }
}
