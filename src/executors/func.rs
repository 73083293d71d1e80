//! Closure-table executor for lightweight nodes.
//!
//! [`FnExecutor`] is the explicit (type-tag → handler) registration style:
//! handlers are plain closures keyed by the tag they accept, registered at
//! construction, and dispatched by exact tag match. It keeps small graph
//! nodes (filters, fan-out sources, test fixtures) from needing a dedicated
//! struct per node.

use async_trait::async_trait;

use super::{Executor, ExecutorError};
use crate::message::WorkflowMessage;
use crate::runtimes::WorkflowContext;
use crate::types::{ExecutorId, TypeTag};

type Handler =
    Box<dyn FnMut(WorkflowMessage, &mut WorkflowContext) -> Result<(), ExecutorError> + Send + Sync>;

/// An executor assembled from per-tag closures.
///
/// # Examples
///
/// ```rust
/// use treadle::executors::FnExecutor;
/// use treadle::message::Payload;
///
/// let shout = FnExecutor::new("shout")
///     .emits("text")
///     .on("text", |message, ctx| {
///         let text: String = message.payload.decode()?;
///         ctx.send(Payload::text(format!("{text}!")));
///         Ok(())
///     });
/// ```
pub struct FnExecutor {
    id: ExecutorId,
    handlers: Vec<(TypeTag, Handler)>,
    outputs: Vec<TypeTag>,
}

impl FnExecutor {
    pub fn new(id: impl Into<ExecutorId>) -> Self {
        Self {
            id: id.into(),
            handlers: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Register a handler for one input tag. Registration order is the
    /// order reported by [`Executor::input_tags`].
    #[must_use]
    pub fn on(
        mut self,
        tag: impl Into<TypeTag>,
        handler: impl FnMut(WorkflowMessage, &mut WorkflowContext) -> Result<(), ExecutorError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.handlers.push((tag.into(), Box::new(handler)));
        self
    }

    /// Declare an output tag for build-time edge validation.
    #[must_use]
    pub fn emits(mut self, tag: impl Into<TypeTag>) -> Self {
        self.outputs.push(tag.into());
        self
    }
}

#[async_trait]
impl Executor for FnExecutor {
    fn id(&self) -> ExecutorId {
        self.id.clone()
    }

    fn input_tags(&self) -> Vec<TypeTag> {
        self.handlers.iter().map(|(tag, _)| tag.clone()).collect()
    }

    fn output_tags(&self) -> Vec<TypeTag> {
        self.outputs.clone()
    }

    async fn handle(
        &mut self,
        message: WorkflowMessage,
        ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError> {
        let tag = message.payload.tag.clone();
        match self.handlers.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, handler)) => handler(message, ctx),
            None => Err(ExecutorError::UnhandledTag { tag }),
        }
    }
}

impl std::fmt::Debug for FnExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnExecutor")
            .field("id", &self.id)
            .field("inputs", &self.handlers.iter().map(|(t, _)| t).collect::<Vec<_>>())
            .field("outputs", &self.outputs)
            .finish()
    }
}
