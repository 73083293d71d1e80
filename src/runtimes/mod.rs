//! Workflow runtime: the superstep runner, runner context, interrupt
//! protocol, routing state, checkpointing, and configuration.
//!
//! # Architecture
//!
//! - **[`Runner`](runner) (crate-internal)**: drives the superstep loop for
//!   one `run`/`resume` call
//! - **[`WorkflowContext`]**: per-invocation facade executors use for all
//!   side effects
//! - **[`CheckpointStorage`]**: pluggable persistence with in-memory and
//!   file-backed implementations
//! - **[`RuntimeConfig`]**: per-workflow knobs (superstep ceiling,
//!   autosave, event sinks) with environment fallbacks

pub mod checkpointer;
pub mod checkpointer_file;
pub mod context;
pub mod persistence;
pub mod requests;
pub mod routing;
pub mod runner;
pub mod runtime_config;

pub use checkpointer::{
    Checkpoint, CheckpointError, CheckpointId, CheckpointMeta, CheckpointStorage,
    InMemoryCheckpointStorage,
};
pub use checkpointer_file::FileCheckpointStorage;
pub use context::{InvocationEffects, WorkflowContext};
pub use persistence::{ExecutorStateEntry, PersistedCheckpoint, PersistedRunState, PersistenceError};
pub use requests::{CoercionError, InputResponse, PendingRequest, RESPONSE_TAG, ResponseType};
pub use routing::{Delivery, EdgeRunnerState, JoinState};
pub use runner::{CancelHandle, RunnerError};
pub use runtime_config::{
    CHECKPOINT_DIR_ENV, EventBusConfig, MAX_SUPERSTEPS_ENV, RuntimeConfig, SinkConfig,
};
