//! Per-invocation runner context.
//!
//! A [`WorkflowContext`] is handed to an executor for exactly one message
//! delivery. Everything the executor does through it (outbound messages,
//! events, interrupt requests, outputs) is buffered locally and collected
//! by the runner when the invocation returns. Nothing becomes visible to
//! observers until the surrounding superstep completes, which gives stream
//! consumers whole-superstep atomicity.

use serde_json::Value;

use crate::event_bus::WorkflowEvent;
use crate::message::{Payload, WorkflowMessage};
use crate::runtimes::requests::{PendingRequest, ResponseType};
use crate::types::{ExecutorId, RequestId};

/// Execution façade passed to [`Executor::handle`](crate::executors::Executor::handle).
#[derive(Debug)]
pub struct WorkflowContext {
    executor_id: ExecutorId,
    iteration: u64,
    effects: InvocationEffects,
}

/// Side effects of one executor invocation, drained by the runner.
#[derive(Debug, Default)]
pub struct InvocationEffects {
    pub messages: Vec<WorkflowMessage>,
    pub events: Vec<WorkflowEvent>,
    pub requests: Vec<PendingRequest>,
    pub outputs: Vec<Payload>,
}

impl WorkflowContext {
    pub(crate) fn new(executor_id: ExecutorId, iteration: u64) -> Self {
        Self {
            executor_id,
            iteration,
            effects: InvocationEffects::default(),
        }
    }

    /// Id of the executor this context belongs to.
    #[must_use]
    pub fn executor_id(&self) -> &ExecutorId {
        &self.executor_id
    }

    /// The superstep currently executing (1-based).
    #[must_use]
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Enqueue a message routed through this executor's edge groups.
    pub fn send(&mut self, payload: Payload) {
        self.effects
            .messages
            .push(WorkflowMessage::routed(self.executor_id.clone(), payload));
    }

    /// Enqueue a message addressed directly to `target`, bypassing static
    /// edges. The dynamic-routing primitive used by handoff orchestration.
    pub fn send_to(&mut self, target: impl Into<ExecutorId>, payload: Payload) {
        self.effects
            .messages
            .push(WorkflowMessage::to(self.executor_id.clone(), target, payload));
    }

    /// Enqueue a message for every executor that handles its tag.
    pub fn broadcast(&mut self, payload: Payload) {
        self.effects
            .messages
            .push(WorkflowMessage::broadcast(self.executor_id.clone(), payload));
    }

    /// Emit a diagnostic event scoped to this executor.
    pub fn emit(&mut self, message: impl Into<String>) {
        self.effects.events.push(WorkflowEvent::diagnostic(
            self.executor_id.to_string(),
            message,
        ));
    }

    /// Suspend for external input.
    ///
    /// Registers a pending request and returns its id. Only this executor's
    /// continuation is suspended: the rest of the superstep still runs, and
    /// the run settles in `IdleWithPendingRequests` once the pending set
    /// drains. The eventual response arrives as an
    /// [`io.response`](crate::runtimes::requests::RESPONSE_TAG) message.
    pub fn request_input(&mut self, expected: ResponseType, prompt: Payload) -> RequestId {
        let request_id = RequestId::generate();
        self.effects.requests.push(PendingRequest {
            request_id: request_id.clone(),
            executor_id: self.executor_id.clone(),
            expected,
            prompt,
        });
        request_id
    }

    /// Yield a run output. Emitted as an `Output` event and accumulated in
    /// the final run report.
    pub fn yield_output(&mut self, data: Payload) {
        self.effects.outputs.push(data);
    }

    /// Convenience: yield a bare JSON value as output, tagged `output`.
    pub fn yield_value(&mut self, value: Value) {
        self.yield_output(Payload::new("output", value));
    }

    pub(crate) fn into_effects(self) -> InvocationEffects {
        self.effects
    }
}
