//! The compiled, runnable workflow artifact.
//!
//! A [`Workflow`] owns the validated graph, the executor registry, the
//! event bus, and the state of its current run. Entry points:
//!
//! - [`run`](Workflow::run): start a fresh run from an initial payload
//! - [`resume`](Workflow::resume): answer pending interrupt requests
//! - [`resume_from_checkpoint`](Workflow::resume_from_checkpoint): restore
//!   a durable snapshot and continue the superstep loop
//!
//! # Streaming
//!
//! Subscribe with [`event_stream`](Workflow::event_stream) *before* calling
//! an entry point, consume the stream from a separate task, and watch for
//! the stream-end diagnostic:
//!
//! ```rust,no_run
//! # use treadle::graphs::WorkflowBuilder;
//! # use treadle::message::Payload;
//! # async fn example(mut workflow: treadle::workflow::Workflow) {
//! let mut stream = workflow.event_stream();
//! tokio::spawn(async move {
//!     while let Ok(event) = stream.recv().await {
//!         if event.is_stream_end() {
//!             break;
//!         }
//!         println!("{event}");
//!     }
//! });
//! let report = workflow.run(Payload::text("go")).await.unwrap();
//! # }
//! ```
//!
//! Each `Workflow` value drives one run at a time; run several workflows
//! concurrently by compiling one value per run (separate scheduling
//! contexts share no mutable state).

use std::sync::Arc;

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;

use crate::event_bus::{EventBus, EventEmitter, EventStream, WorkflowEvent};
use crate::executors::ExecutorRegistry;
use crate::graphs::WorkflowGraph;
use crate::message::{Payload, WorkflowMessage};
use crate::runtimes::checkpointer::{CheckpointError, CheckpointId, CheckpointStorage};
use crate::runtimes::checkpointer_file::FileCheckpointStorage;
use crate::runtimes::requests::PendingRequest;
use crate::runtimes::runner::{
    self, CancelHandle, RunState, Runner, RunnerError, capture_run_state, restore_run_state,
};
use crate::runtimes::runtime_config::RuntimeConfig;
use crate::runtimes::Checkpoint;
use crate::types::{ExecutorId, WorkflowRunState};
use crate::utils::id_generator::IdGenerator;

/// Final accumulated result of a (possibly partial) run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub run_id: String,
    pub state: WorkflowRunState,
    /// Everything executors yielded via `yield_output`, in emission order.
    pub outputs: Vec<Payload>,
    /// Requests still awaiting responses when the run settled.
    pub pending_requests: Vec<PendingRequest>,
    /// Supersteps executed so far in this run.
    pub supersteps: u64,
}

#[derive(Debug, Error, Diagnostic)]
pub enum WorkflowError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Runner(#[from] RunnerError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("workflow has no checkpoint storage attached")]
    #[diagnostic(
        code(treadle::workflow::no_storage),
        help("Attach storage with `with_checkpoint_storage` or set a checkpoint directory.")
    )]
    NoStorage,
}

/// A validated, runnable workflow.
pub struct Workflow {
    graph: WorkflowGraph,
    registry: ExecutorRegistry,
    config: RuntimeConfig,
    bus: EventBus,
    storage: Option<Arc<dyn CheckpointStorage>>,
    state: RunState,
    cancel: CancelHandle,
    run_id: String,
}

impl Workflow {
    pub(crate) fn from_parts(
        graph: WorkflowGraph,
        registry: ExecutorRegistry,
        config: RuntimeConfig,
    ) -> Self {
        let bus = config.event_bus.build();
        let storage = config.checkpoint_dir.as_ref().map(|dir| {
            Arc::new(FileCheckpointStorage::new(dir)) as Arc<dyn CheckpointStorage>
        });
        let run_id = config
            .run_id
            .clone()
            .unwrap_or_else(|| IdGenerator::new().run_id());
        Self {
            graph,
            registry,
            config,
            bus,
            storage,
            state: RunState::fresh(),
            cancel: CancelHandle::new(),
            run_id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.graph.name()
    }

    #[must_use]
    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn run_state(&self) -> WorkflowRunState {
        self.state.run_state
    }

    /// Requests currently awaiting responses.
    #[must_use]
    pub fn pending_requests(&self) -> &[PendingRequest] {
        &self.state.requests
    }

    /// Attach (or replace) the checkpoint storage backend.
    #[must_use]
    pub fn with_checkpoint_storage(mut self, storage: Arc<dyn CheckpointStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    #[must_use]
    pub fn checkpoint_storage(&self) -> Option<Arc<dyn CheckpointStorage>> {
        self.storage.clone()
    }

    /// Subscribe to this workflow's event stream. Events published before
    /// the subscription are not replayed, so subscribe before running.
    #[must_use]
    pub fn event_stream(&self) -> EventStream {
        self.bus.subscribe()
    }

    /// The underlying bus, for attaching custom sinks.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Cloneable handle for cancelling the run between supersteps.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Start a fresh run by injecting `input` to the start executor and
    /// driving the superstep loop until the run settles.
    #[instrument(skip(self, input), fields(workflow = %self.graph.name()), err)]
    pub async fn run(&mut self, input: Payload) -> Result<RunReport, WorkflowError> {
        self.cancel.reset();
        self.state = RunState::fresh();
        self.run_id = self
            .config
            .run_id
            .clone()
            .unwrap_or_else(|| IdGenerator::new().run_id());

        self.state.pending.push_back(WorkflowMessage::to(
            ExecutorId::external(),
            self.graph.start().clone(),
            input,
        ));

        self.publish(WorkflowEvent::Started {
            workflow: self.graph.name().to_string(),
            run_id: self.run_id.clone(),
        });

        self.drive().await
    }

    /// Resume a run idling on pending requests by supplying
    /// `request id → response value` mappings.
    ///
    /// Unmatched ids are ignored; uncoercible values leave their request
    /// pending. If not every request is answered the run settles back in
    /// `IdleWithPendingRequests`.
    #[instrument(skip(self, responses), fields(workflow = %self.graph.name()), err)]
    pub async fn resume(
        &mut self,
        responses: FxHashMap<String, Value>,
    ) -> Result<RunReport, WorkflowError> {
        runner::apply_responses(&mut self.state, responses);
        self.drive().await
    }

    /// Answer the single pending request without naming its id.
    pub async fn resume_with(&mut self, value: Value) -> Result<RunReport, WorkflowError> {
        let mut responses = FxHashMap::default();
        responses.insert(String::new(), value);
        self.resume(responses).await
    }

    /// Restore a durable snapshot and continue the superstep loop as if no
    /// interruption occurred: same pending-message ordering, same executor
    /// state, no re-delivery of already-processed messages.
    #[instrument(skip(self), fields(workflow = %self.graph.name()), err)]
    pub async fn resume_from_checkpoint(
        &mut self,
        checkpoint_id: &CheckpointId,
    ) -> Result<RunReport, WorkflowError> {
        let storage = self.storage.clone().ok_or(WorkflowError::NoStorage)?;
        let checkpoint = storage.load(checkpoint_id).await?;
        restore_run_state(checkpoint.state, &mut self.state, &mut self.registry)
            .map_err(WorkflowError::Runner)?;
        tracing::info!(
            checkpoint = %checkpoint_id,
            iteration = self.state.iteration,
            "run restored from checkpoint"
        );
        self.drive().await
    }

    /// Capture and persist a checkpoint of the current run state on demand,
    /// outside the autosave cadence.
    pub async fn checkpoint(&self) -> Result<CheckpointId, WorkflowError> {
        let storage = self.storage.clone().ok_or(WorkflowError::NoStorage)?;
        let persisted = capture_run_state(&self.state, &self.registry)
            .map_err(WorkflowError::Runner)?;
        let checkpoint = Checkpoint::capture(self.graph.name(), persisted);
        Ok(storage.save(checkpoint).await?)
    }

    async fn drive(&mut self) -> Result<RunReport, WorkflowError> {
        // Lazy so that workflows can be compiled outside a tokio runtime.
        self.bus.listen_for_events();
        let mut runner = Runner {
            graph: &self.graph,
            registry: &mut self.registry,
            state: &mut self.state,
            emitter: self.bus.emitter(),
            config: &self.config,
            storage: self.storage.clone(),
            cancel: self.cancel.clone(),
        };
        let outcome = runner.drive().await;
        self.finalize(&outcome);
        outcome?;
        Ok(self.report())
    }

    fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id.clone(),
            state: self.state.run_state,
            outputs: self.state.outputs.clone(),
            pending_requests: self.state.requests.clone(),
            supersteps: self.state.iteration,
        }
    }

    fn finalize(&self, outcome: &Result<WorkflowRunState, RunnerError>) {
        let message = match outcome {
            Ok(state) => format!(
                "run={} status={state} iteration={}",
                self.run_id, self.state.iteration
            ),
            Err(err) => format!(
                "run={} status=error iteration={} error={err}",
                self.run_id, self.state.iteration
            ),
        };
        self.publish(WorkflowEvent::stream_end(message));
    }

    fn publish(&self, event: WorkflowEvent) {
        if let Err(e) = self.bus.emitter().emit(event) {
            tracing::debug!(error = %e, "event bus unavailable; event dropped");
        }
    }
}

impl std::fmt::Debug for Workflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.graph.name())
            .field("run_id", &self.run_id)
            .field("run_state", &self.state.run_state)
            .field("executors", &self.registry.ids())
            .finish()
    }
}
