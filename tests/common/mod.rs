#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use treadle::event_bus::{EventStream, WorkflowEvent};
use treadle::executors::{Executor, ExecutorError, FnExecutor};
use treadle::message::{Payload, WorkflowMessage};
use treadle::runtimes::requests::{InputResponse, RESPONSE_TAG, ResponseType};
use treadle::runtimes::{RuntimeConfig, WorkflowContext};
use treadle::types::{ExecutorId, TypeTag};

/// Runtime config for tests: no stdout sink, no autosave.
pub fn quiet() -> RuntimeConfig {
    RuntimeConfig::default().quiet().with_autosave(false)
}

/// Forwards every `text` message along the executor's edge groups.
pub fn forwarder(id: &str) -> FnExecutor {
    FnExecutor::new(id).emits("text").on("text", |message, ctx| {
        ctx.send(message.payload);
        Ok(())
    })
}

/// Terminal executor that yields each delivered payload as a run output,
/// prefixed with its own id so tests can tell recipients apart.
pub fn sink(id: &str) -> FnExecutor {
    let marker = id.to_string();
    FnExecutor::new(id).on("text", move |message, ctx| {
        let text: String = message.payload.decode().unwrap_or_default();
        ctx.yield_output(Payload::text(format!("{marker}:{text}")));
        Ok(())
    })
}

/// Sink that accepts the fan-in tuple tag and yields it unchanged.
pub fn pair_sink(id: &str, tag: &str) -> FnExecutor {
    FnExecutor::new(id).on(tag.to_string(), |message, ctx| {
        ctx.yield_output(message.payload);
        Ok(())
    })
}

/// Collect events until the stream-end marker (or a quiet timeout).
pub async fn drain_events(stream: &mut EventStream) -> Vec<WorkflowEvent> {
    let mut events = Vec::new();
    while let Some(event) = stream.next_timeout(Duration::from_millis(500)).await {
        let done = event.is_stream_end();
        events.push(event);
        if done {
            break;
        }
    }
    events
}

/// Stateful accumulator used by interrupt and checkpoint tests.
///
/// On a `number` message it adds the value and asks for another integer;
/// each response below zero ends the exchange by yielding the total.
pub struct AccumulatorExecutor {
    id: ExecutorId,
    total: i64,
}

impl AccumulatorExecutor {
    pub const STATE_TAG: &'static str = "test.accumulator";

    pub fn new(id: &str) -> Self {
        Self {
            id: id.into(),
            total: 0,
        }
    }

    fn ask(&self, ctx: &mut WorkflowContext) {
        ctx.request_input(
            ResponseType::Integer,
            Payload::new("prompt", serde_json::json!({"total": self.total})),
        );
    }
}

#[async_trait]
impl Executor for AccumulatorExecutor {
    fn id(&self) -> ExecutorId {
        self.id.clone()
    }

    fn input_tags(&self) -> Vec<TypeTag> {
        vec![TypeTag::new("number"), TypeTag::new(RESPONSE_TAG)]
    }

    async fn handle(
        &mut self,
        message: WorkflowMessage,
        ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError> {
        if message.payload.has_tag(RESPONSE_TAG) {
            let response = InputResponse::from_payload(&message.payload)?;
            let value = response.value.as_i64().unwrap_or(0);
            if value < 0 {
                ctx.yield_output(Payload::new("total", serde_json::json!(self.total)));
            } else {
                self.total += value;
                self.ask(ctx);
            }
            return Ok(());
        }
        let value: i64 = message.payload.decode()?;
        self.total += value;
        self.ask(ctx);
        Ok(())
    }

    fn snapshot_state(&self) -> Result<Option<Payload>, ExecutorError> {
        Ok(Some(Payload::new(
            Self::STATE_TAG,
            serde_json::json!({"total": self.total}),
        )))
    }

    fn restore_state(&mut self, blob: Payload) -> Result<(), ExecutorError> {
        if !blob.has_tag(Self::STATE_TAG) {
            return Err(ExecutorError::StateRestore { tag: blob.tag });
        }
        self.total = blob.value["total"].as_i64().unwrap_or(0);
        Ok(())
    }
}

/// Always fails; for executor-local error reporting tests.
pub struct FailingExecutor {
    id: ExecutorId,
}

impl FailingExecutor {
    pub fn new(id: &str) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Executor for FailingExecutor {
    fn id(&self) -> ExecutorId {
        self.id.clone()
    }

    fn input_tags(&self) -> Vec<TypeTag> {
        vec![TypeTag::new("text")]
    }

    async fn handle(
        &mut self,
        _message: WorkflowMessage,
        _ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError> {
        Err(ExecutorError::ValidationFailed("intentional".to_string()))
    }
}
