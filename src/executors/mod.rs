//! Executor abstractions for the treadle workflow engine.
//!
//! An executor is a named unit of computation with one or more typed
//! message handlers. The engine delivers a message to an executor only when
//! the message's [`TypeTag`] appears in the executor's declared input tags;
//! dispatch is exact-match, with no inheritance fallback.
//!
//! # Design Principles
//!
//! - **Explicit handler tables**: accepted input tags are declared up front
//!   and used by build-time validation; nothing is discovered by reflection.
//! - **Serial access**: the runner invokes an executor with `&mut self`, one
//!   message at a time. An executor never observes itself concurrently.
//! - **Explicit durability**: stateful executors opt in to checkpointing by
//!   implementing [`Executor::snapshot_state`] / [`Executor::restore_state`]
//!   with a self-describing tagged payload.
//!
//! # Error Handling
//!
//! Returning `Err(ExecutorError)` from [`Executor::handle`] fails that one
//! invocation: the runner reports it as an `ExecutorFailed` event and the
//! run continues if other executors can still make progress.
//!
//! # Examples
//!
//! ```rust
//! use async_trait::async_trait;
//! use treadle::executors::{Executor, ExecutorError};
//! use treadle::message::{Payload, WorkflowMessage};
//! use treadle::runtimes::WorkflowContext;
//! use treadle::types::{ExecutorId, TypeTag};
//!
//! struct Uppercase {
//!     id: ExecutorId,
//! }
//!
//! #[async_trait]
//! impl Executor for Uppercase {
//!     fn id(&self) -> ExecutorId {
//!         self.id.clone()
//!     }
//!
//!     fn input_tags(&self) -> Vec<TypeTag> {
//!         vec![TypeTag::new("text")]
//!     }
//!
//!     fn output_tags(&self) -> Vec<TypeTag> {
//!         vec![TypeTag::new("text")]
//!     }
//!
//!     async fn handle(
//!         &mut self,
//!         message: WorkflowMessage,
//!         ctx: &mut WorkflowContext,
//!     ) -> Result<(), ExecutorError> {
//!         let text: String = message.payload.decode()?;
//!         ctx.send(Payload::text(text.to_uppercase()));
//!         Ok(())
//!     }
//! }
//! ```

mod func;
mod registry;

pub use func::FnExecutor;
pub use registry::{ExecutorRegistry, RegistryError};

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::message::{Payload, WorkflowMessage};
use crate::runtimes::WorkflowContext;
use crate::types::{ExecutorId, TypeTag};

/// A named processing node in the workflow graph.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Stable identity of this executor, unique within its graph.
    fn id(&self) -> ExecutorId;

    /// The message tags this executor accepts. Keys of the handler table.
    fn input_tags(&self) -> Vec<TypeTag>;

    /// The message tags this executor declares it may emit.
    ///
    /// Used by build-time type-compatibility validation. An empty vector
    /// means "dynamic" and exempts outgoing edges from the static check.
    fn output_tags(&self) -> Vec<TypeTag> {
        Vec::new()
    }

    /// Process one delivered message.
    ///
    /// All side effects (outbound messages, events, interrupt requests,
    /// outputs) go through the context and become visible only when the
    /// surrounding superstep completes.
    async fn handle(
        &mut self,
        message: WorkflowMessage,
        ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError>;

    /// Capture this executor's private state for a checkpoint.
    ///
    /// Stateless executors keep the default `Ok(None)`.
    fn snapshot_state(&self) -> Result<Option<Payload>, ExecutorError> {
        Ok(None)
    }

    /// Restore private state from a checkpoint blob.
    fn restore_state(&mut self, _blob: Payload) -> Result<(), ExecutorError> {
        Ok(())
    }
}

/// Errors raised inside a single executor invocation.
///
/// These are executor-local: the runner catches them, emits an
/// `ExecutorFailed` event, and keeps the run alive. Runner-fatal conditions
/// live in `runtimes::RunnerError` instead.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// The payload body did not decode into the handler's expected shape.
    #[error(transparent)]
    #[diagnostic(code(treadle::executor::serde))]
    Serde(#[from] serde_json::Error),

    /// Expected data is missing from the delivered message.
    #[error("missing expected input: {what}")]
    #[diagnostic(
        code(treadle::executor::missing_input),
        help("Check that the upstream executor produced the required field.")
    )]
    MissingInput { what: &'static str },

    /// An external agent or provider call failed.
    #[error("agent error ({agent}): {message}")]
    #[diagnostic(code(treadle::executor::agent))]
    Agent { agent: String, message: String },

    /// No handler registered for the delivered tag.
    ///
    /// Raised by table-driven executors such as [`FnExecutor`] when the
    /// engine-level tag check was bypassed (direct invocation in tests).
    #[error("no handler registered for message tag `{tag}`")]
    #[diagnostic(code(treadle::executor::unhandled_tag))]
    UnhandledTag { tag: TypeTag },

    /// Input validation failed.
    #[error("validation failed: {0}")]
    #[diagnostic(code(treadle::executor::validation))]
    ValidationFailed(String),

    /// A restored state blob carried an unexpected tag or shape.
    #[error("cannot restore state from blob tagged `{tag}`")]
    #[diagnostic(
        code(treadle::executor::state_restore),
        help("The checkpoint was written by an incompatible executor version.")
    )]
    StateRestore { tag: TypeTag },
}
