//! HandoffBuilder: compile a set of chat agents into a workflow.
//!
//! Agents are wired all-to-all: any agent can transfer the conversation to
//! any other by calling its reserved handoff tool. The static edges exist
//! for validation and reachability; actual routing decisions are made at
//! runtime from intercepted tool calls.

use crate::executors::Executor;
use crate::graphs::{GraphValidationError, WorkflowBuilder};
use crate::handoff::agent::ChatAgent;
use crate::handoff::executor::{AgentExecutor, HandoffMode, TerminationPredicate};
use crate::handoff::replay::ReplayDedup;
use crate::runtimes::RuntimeConfig;
use crate::types::ExecutorId;
use crate::workflow::Workflow;

/// Builder for handoff-orchestrated multi-agent workflows.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use treadle::handoff::{AgentError, AgentReply, ChatAgent, ChatMessage, HandoffBuilder};
///
/// struct CannedAgent(&'static str);
///
/// #[async_trait]
/// impl ChatAgent for CannedAgent {
///     fn name(&self) -> &str {
///         self.0
///     }
///
///     async fn reply(&mut self, _: &[ChatMessage]) -> Result<AgentReply, AgentError> {
///         Ok(AgentReply::say(self.0, "on it"))
///     }
/// }
///
/// let workflow = HandoffBuilder::new("support")
///     .add_agent(CannedAgent("triage"))
///     .add_agent(CannedAgent("billing"))
///     .with_start("triage")
///     .autonomous(3)
///     .terminate_when(Arc::new(|conversation| {
///         conversation
///             .last()
///             .is_some_and(|m| m.content.contains("RESOLVED"))
///     }))
///     .build()
///     .unwrap();
/// ```
pub struct HandoffBuilder {
    name: String,
    agents: Vec<AgentExecutor>,
    start: Option<ExecutorId>,
    mode: HandoffMode,
    terminate: Option<TerminationPredicate>,
    dedup: ReplayDedup,
    runtime_config: RuntimeConfig,
}

impl HandoffBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agents: Vec::new(),
            start: None,
            mode: HandoffMode::Interactive,
            terminate: None,
            dedup: ReplayDedup::default(),
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Add an agent under its own name. The first agent added becomes the
    /// start agent unless [`with_start`](Self::with_start) overrides it.
    #[must_use]
    pub fn add_agent(mut self, agent: impl ChatAgent + 'static) -> Self {
        let executor = AgentExecutor::new(agent);
        if self.start.is_none() {
            self.start = Some(executor.id());
        }
        self.agents.push(executor);
        self
    }

    #[must_use]
    pub fn with_start(mut self, id: impl Into<ExecutorId>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Every agent turn suspends for user input (the default).
    #[must_use]
    pub fn interactive(mut self) -> Self {
        self.mode = HandoffMode::Interactive;
        self
    }

    /// Agents may take up to `turn_budget` consecutive internal turns
    /// before a suspension is forced.
    #[must_use]
    pub fn autonomous(mut self, turn_budget: u32) -> Self {
        self.mode = HandoffMode::Autonomous { turn_budget };
        self
    }

    /// End the run with an output event once the predicate holds on the
    /// full conversation. Checked after each agent turn.
    #[must_use]
    pub fn terminate_when(mut self, predicate: TerminationPredicate) -> Self {
        self.terminate = Some(predicate);
        self
    }

    /// Replay-dedup policy applied when conversations are re-sent.
    #[must_use]
    pub fn with_dedup(mut self, dedup: ReplayDedup) -> Self {
        self.dedup = dedup;
        self
    }

    #[must_use]
    pub fn with_runtime_config(mut self, runtime_config: RuntimeConfig) -> Self {
        self.runtime_config = runtime_config;
        self
    }

    /// Wire agents all-to-all and compile through the standard builder and
    /// its validation pass.
    pub fn build(self) -> Result<Workflow, GraphValidationError> {
        let ids: Vec<ExecutorId> = self.agents.iter().map(AgentExecutor::id).collect();
        let mode = self.mode;
        let terminate = self.terminate;
        let dedup = self.dedup;

        let mut builder = WorkflowBuilder::new(self.name)
            .with_runtime_config(self.runtime_config);
        for agent in self.agents {
            let mut agent = agent.with_mode(mode).with_dedup(dedup);
            if let Some(predicate) = &terminate {
                agent = agent.with_termination(predicate.clone());
            }
            builder = builder.add_executor(agent);
        }

        for from in &ids {
            for to in &ids {
                if from != to {
                    builder = builder.add_edge(from.clone(), to.clone());
                }
            }
        }

        if let Some(start) = self.start {
            builder = builder.with_start(start);
        }
        builder.build()
    }
}
