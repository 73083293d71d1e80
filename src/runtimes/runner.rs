//! The superstep loop.
//!
//! One superstep: drain the pending-message set, route every message
//! through its edge groups, invoke the destination executors, and collect
//! everything they emitted. The loop repeats until the pending set drains
//! with no open requests (`Idle`), an executor suspends for input
//! (`IdleWithPendingRequests`), the run is cancelled, or the superstep
//! ceiling is hit (`RunnerError::Convergence`).
//!
//! Events produced inside a superstep are buffered and flushed only after
//! the superstep completes; observers never see a half-finished round.
//! Scheduling is single-threaded and cooperative: each (message, executor)
//! dispatch runs to completion before the next begins, so no locking
//! guards the run state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::event_bus::{BusEmitter, EventEmitter, ROUTING_SCOPE, WorkflowEvent};
use crate::executors::ExecutorRegistry;
use crate::graphs::WorkflowGraph;
use crate::message::{MessageTarget, Payload, WorkflowMessage};
use crate::runtimes::checkpointer::{Checkpoint, CheckpointError, CheckpointStorage};
use crate::runtimes::persistence::{ExecutorStateEntry, PersistedRunState};
use crate::runtimes::requests::{self, InputResponse, PendingRequest};
use crate::runtimes::routing::{self, Delivery, EdgeRunnerState};
use crate::runtimes::runtime_config::RuntimeConfig;
use crate::types::{ExecutorId, RequestId, WorkflowRunState};

/// Cooperative cancellation flag for a run.
///
/// Cancellation is honored between supersteps: an in-progress executor
/// invocation always finishes before the run transitions to `Cancelled`.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::Relaxed);
    }
}

/// Mutable per-run state: the runner's own globals plus everything needed
/// to persist and resume.
#[derive(Debug)]
pub(crate) struct RunState {
    pub run_state: WorkflowRunState,
    pub iteration: u64,
    pub pending: VecDeque<WorkflowMessage>,
    pub requests: Vec<PendingRequest>,
    pub joins: EdgeRunnerState,
    pub outputs: Vec<Payload>,
}

impl RunState {
    pub(crate) fn fresh() -> Self {
        Self {
            run_state: WorkflowRunState::Starting,
            iteration: 0,
            pending: VecDeque::new(),
            requests: Vec::new(),
            joins: EdgeRunnerState::default(),
            outputs: Vec::new(),
        }
    }
}

/// Runner-fatal errors. Executor-local failures are events, not errors.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("workflow did not converge within {limit} supersteps")]
    #[diagnostic(
        code(treadle::runner::convergence),
        help("Raise `max_supersteps` in the runtime config, or break the cycle in the graph.")
    )]
    Convergence { limit: u64 },

    #[error(transparent)]
    #[diagnostic(code(treadle::runner::checkpoint))]
    Checkpoint(#[from] CheckpointError),

    #[error("capturing state of executor `{executor_id}` failed: {detail}")]
    #[diagnostic(code(treadle::runner::state_capture))]
    StateCapture {
        executor_id: ExecutorId,
        detail: String,
    },

    #[error("restoring state of executor `{executor_id}` failed: {detail}")]
    #[diagnostic(
        code(treadle::runner::state_restore),
        help("The checkpoint was written against a different graph or executor version.")
    )]
    StateRestore {
        executor_id: ExecutorId,
        detail: String,
    },
}

/// Borrowed execution engine for one `run`/`resume` call.
pub(crate) struct Runner<'w> {
    pub graph: &'w WorkflowGraph,
    pub registry: &'w mut ExecutorRegistry,
    pub state: &'w mut RunState,
    pub emitter: BusEmitter,
    pub config: &'w RuntimeConfig,
    pub storage: Option<Arc<dyn CheckpointStorage>>,
    pub cancel: CancelHandle,
}

impl Runner<'_> {
    /// Drive the superstep loop until the run settles.
    #[instrument(skip(self), fields(workflow = %self.graph.name()), err)]
    pub(crate) async fn drive(&mut self) -> Result<WorkflowRunState, RunnerError> {
        self.transition(WorkflowRunState::Running);

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("run cancelled between supersteps");
                self.transition(WorkflowRunState::Cancelled);
                break;
            }

            if self.state.pending.is_empty() {
                let settled = if self.state.requests.is_empty() {
                    WorkflowRunState::Idle
                } else {
                    WorkflowRunState::IdleWithPendingRequests
                };
                self.transition(settled);
                break;
            }

            if self.state.iteration >= self.config.max_supersteps {
                let err = RunnerError::Convergence {
                    limit: self.config.max_supersteps,
                };
                self.fail(&err);
                return Err(err);
            }

            self.state.iteration += 1;
            let iteration = self.state.iteration;
            self.publish(WorkflowEvent::SuperstepStarted { iteration });

            let (delivered, emitted, events) = self.run_superstep().await;

            // Flush only once the whole round is done: observers get
            // at-least-one-superstep atomicity.
            for event in events {
                self.publish(event);
            }
            self.publish(WorkflowEvent::SuperstepCompleted {
                iteration,
                delivered,
                emitted,
            });

            if let Err(err) = self.maybe_checkpoint().await {
                self.fail(&err);
                return Err(err);
            }
        }

        Ok(self.state.run_state)
    }

    /// Execute exactly one superstep: returns (deliveries, new messages,
    /// buffered events).
    async fn run_superstep(&mut self) -> (usize, usize, Vec<WorkflowEvent>) {
        let drained: Vec<WorkflowMessage> = self.state.pending.drain(..).collect();
        let mut events: Vec<WorkflowEvent> = Vec::new();
        let mut next: Vec<WorkflowMessage> = Vec::new();
        let mut delivered = 0usize;

        for message in drained {
            let deliveries = self.resolve_deliveries(&message, &mut events);

            for delivery in deliveries {
                delivered += 1;
                let Delivery { target, payload } = delivery;

                if !self.registry.contains(&target) {
                    events.push(WorkflowEvent::diagnostic(
                        ROUTING_SCOPE,
                        format!("target `{target}` is not a registered executor; message dropped"),
                    ));
                    continue;
                }
                if !self.registry.accepts(&target, &payload.tag) {
                    // Unhandled message type: non-fatal, reported per message.
                    events.push(WorkflowEvent::diagnostic(
                        ROUTING_SCOPE,
                        format!("executor `{target}` has no handler for `{}`; message dropped", payload.tag),
                    ));
                    continue;
                }

                events.push(WorkflowEvent::ExecutorInvoked {
                    executor_id: target.clone(),
                    tag: payload.tag.clone(),
                });

                let delivered_message = WorkflowMessage {
                    payload,
                    source: message.source.clone(),
                    target: MessageTarget::Executor { id: target.clone() },
                };
                let mut ctx =
                    crate::runtimes::context::WorkflowContext::new(target.clone(), self.state.iteration);
                let executor = self
                    .registry
                    .get_mut(&target)
                    .expect("registration checked above");

                match executor.handle(delivered_message, &mut ctx).await {
                    Ok(()) => {
                        events.push(WorkflowEvent::ExecutorCompleted {
                            executor_id: target.clone(),
                        });
                        let effects = ctx.into_effects();
                        for request in effects.requests {
                            events.push(WorkflowEvent::RequestInfo {
                                request_id: request.request_id.clone(),
                                executor_id: request.executor_id.clone(),
                                expected: request.expected.clone(),
                                prompt: request.prompt.clone(),
                            });
                            self.state.requests.push(request);
                        }
                        for output in effects.outputs {
                            events.push(WorkflowEvent::Output {
                                data: output.clone(),
                            });
                            self.state.outputs.push(output);
                        }
                        events.extend(effects.events);
                        next.extend(effects.messages);
                    }
                    Err(e) => {
                        // Executor-local failure: report and move on. Any
                        // effects of the failed invocation are discarded.
                        tracing::warn!(executor = %target, error = %e, "executor invocation failed");
                        events.push(WorkflowEvent::ExecutorFailed {
                            executor_id: target.clone(),
                            detail: e.to_string(),
                        });
                    }
                }
            }
        }

        let emitted = next.len();
        self.state.pending = next.into();
        (delivered, emitted, events)
    }

    /// Turn one queued message into concrete (target, payload) deliveries.
    fn resolve_deliveries(
        &mut self,
        message: &WorkflowMessage,
        events: &mut Vec<WorkflowEvent>,
    ) -> Vec<Delivery> {
        match &message.target {
            MessageTarget::Executor { id } => vec![Delivery {
                target: id.clone(),
                payload: message.payload.clone(),
            }],
            MessageTarget::Broadcast => self
                .registry
                .ids()
                .iter()
                .filter(|id| **id != message.source && self.registry.accepts(id, &message.payload.tag))
                .map(|id| Delivery {
                    target: id.clone(),
                    payload: message.payload.clone(),
                })
                .collect(),
            MessageTarget::Routed => {
                let outcome = routing::route(self.graph, &mut self.state.joins, message);
                for note in outcome.diagnostics {
                    events.push(WorkflowEvent::diagnostic(ROUTING_SCOPE, note));
                }
                outcome.deliveries
            }
        }
    }

    fn transition(&mut self, next: WorkflowRunState) {
        self.state.run_state = next;
        self.publish(WorkflowEvent::Status { state: next });
    }

    fn fail(&mut self, err: &RunnerError) {
        self.publish(WorkflowEvent::Failed {
            detail: err.to_string(),
        });
        self.transition(WorkflowRunState::Failed);
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Err(e) = self.emitter.emit(event) {
            tracing::debug!(error = %e, "event bus unavailable; event dropped");
        }
    }

    async fn maybe_checkpoint(&mut self) -> Result<(), RunnerError> {
        if !self.config.autosave {
            return Ok(());
        }
        let Some(storage) = self.storage.clone() else {
            return Ok(());
        };
        let persisted = capture_run_state(self.state, self.registry)?;
        let checkpoint = Checkpoint::capture(self.graph.name(), persisted);
        let id = storage.save(checkpoint).await?;
        tracing::debug!(checkpoint = %id, iteration = self.state.iteration, "checkpoint saved");
        Ok(())
    }
}

/// Capture the full persistable run state, including executor privates.
pub(crate) fn capture_run_state(
    state: &RunState,
    registry: &ExecutorRegistry,
) -> Result<PersistedRunState, RunnerError> {
    let mut executor_state = Vec::new();
    for id in registry.ids() {
        let executor = registry.get(id).expect("ids() only lists registered executors");
        match executor.snapshot_state() {
            Ok(Some(blob)) => executor_state.push(ExecutorStateEntry {
                executor_id: id.clone(),
                blob,
            }),
            Ok(None) => {}
            Err(e) => {
                return Err(RunnerError::StateCapture {
                    executor_id: id.clone(),
                    detail: e.to_string(),
                });
            }
        }
    }
    Ok(PersistedRunState {
        run_state: state.run_state,
        iteration: state.iteration,
        pending: state.pending.iter().cloned().collect(),
        requests: state.requests.clone(),
        joins: state.joins.clone(),
        outputs: state.outputs.clone(),
        executor_state,
    })
}

/// Re-establish run state and executor privates from a persisted snapshot.
pub(crate) fn restore_run_state(
    persisted: PersistedRunState,
    state: &mut RunState,
    registry: &mut ExecutorRegistry,
) -> Result<(), RunnerError> {
    for entry in persisted.executor_state {
        let Some(executor) = registry.get_mut(&entry.executor_id) else {
            return Err(RunnerError::StateRestore {
                executor_id: entry.executor_id,
                detail: "executor is not part of this graph".to_string(),
            });
        };
        executor
            .restore_state(entry.blob)
            .map_err(|e| RunnerError::StateRestore {
                executor_id: entry.executor_id.clone(),
                detail: e.to_string(),
            })?;
    }
    state.run_state = persisted.run_state;
    state.iteration = persisted.iteration;
    state.pending = persisted.pending.into();
    state.requests = persisted.requests;
    state.joins = persisted.joins;
    state.outputs = persisted.outputs;
    Ok(())
}

/// Apply interrupt responses to the pending-request set.
///
/// Matching responses are coerced and re-enter the graph as `io.response`
/// messages addressed to the suspended executor. Values that fail coercion
/// leave their request pending; response ids with no matching request are
/// ignored. When exactly one request is pending and exactly one unmatched
/// value was supplied, the value is applied to that request.
pub(crate) fn apply_responses(state: &mut RunState, responses: FxHashMap<String, Value>) {
    let mut entries: Vec<(String, Value)> = responses.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut unmatched: Vec<(String, Value)> = Vec::new();
    for (key, value) in entries {
        if state
            .requests
            .iter()
            .any(|r| r.request_id.as_str() == key)
        {
            apply_one(state, &RequestId::from(key.as_str()), value);
        } else {
            unmatched.push((key, value));
        }
    }

    if state.requests.len() == 1 && unmatched.len() == 1 {
        // Single-interrupt ergonomics: the lone value answers the lone request.
        let request_id = state.requests[0].request_id.clone();
        let (supplied_key, value) = unmatched.pop().expect("len checked");
        tracing::debug!(
            supplied = %supplied_key,
            request = %request_id,
            "applying sole response to sole pending request"
        );
        apply_one(state, &request_id, value);
    } else {
        for (key, _) in unmatched {
            tracing::warn!(request_id = %key, "response for unknown request id ignored");
        }
    }
}

fn apply_one(state: &mut RunState, request_id: &RequestId, value: Value) {
    let Some(position) = state
        .requests
        .iter()
        .position(|r| &r.request_id == request_id)
    else {
        tracing::warn!(request_id = %request_id, "response for unknown request id ignored");
        return;
    };

    let expected = state.requests[position].expected.clone();
    match requests::coerce(&expected, value) {
        Ok(coerced) => {
            let request = state.requests.remove(position);
            let response = InputResponse {
                request_id: request.request_id.clone(),
                value: coerced,
            };
            state.pending.push_back(WorkflowMessage::to(
                ExecutorId::external(),
                request.executor_id,
                response.into_payload(),
            ));
        }
        Err(e) => {
            // Request stays pending; the caller can retry with a fixed value.
            tracing::warn!(request_id = %request_id, error = %e, "interrupt response failed coercion");
        }
    }
}
