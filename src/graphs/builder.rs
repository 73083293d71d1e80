//! WorkflowBuilder: fluent construction and static validation of graphs.
//!
//! The builder accumulates executors and edge groups, then [`build`]s the
//! compiled [`Workflow`]. `build` runs the exhaustive validation pass from
//! [`super::validation`] and refuses to produce a runnable workflow while
//! any violation remains.
//!
//! [`build`]: WorkflowBuilder::build

use crate::executors::{Executor, ExecutorRegistry};
use crate::graphs::edges::{Branch, EdgeGroup, SwitchArm};
use crate::graphs::graph::WorkflowGraph;
use crate::graphs::validation::{self, GraphValidationError, GraphViolation};
use crate::runtimes::RuntimeConfig;
use crate::types::{ExecutorId, TypeTag};
use crate::workflow::Workflow;

/// Builder for workflow graphs.
///
/// # Required configuration
///
/// Every graph needs at least one registered executor and a start executor
/// declared via [`with_start`](Self::with_start). Edges are optional only
/// for single-executor graphs.
///
/// # Examples
///
/// ## Linear pipeline
///
/// ```rust
/// use treadle::executors::FnExecutor;
/// use treadle::graphs::WorkflowBuilder;
/// use treadle::message::Payload;
///
/// let intake = FnExecutor::new("intake").emits("text").on("text", |msg, ctx| {
///     ctx.send(msg.payload);
///     Ok(())
/// });
/// let archive = FnExecutor::new("archive").on("text", |_msg, _ctx| Ok(()));
///
/// let workflow = WorkflowBuilder::new("pipeline")
///     .add_executor(intake)
///     .add_executor(archive)
///     .with_start("intake")
///     .add_edge("intake", "archive")
///     .build()
///     .unwrap();
/// ```
///
/// ## Switch-case routing
///
/// ```rust
/// use treadle::graphs::{Case, SwitchArm, WorkflowBuilder};
/// # use treadle::executors::FnExecutor;
/// # let sort = FnExecutor::new("sort").on("text", |_m, _c| Ok(()));
/// # let urgent = FnExecutor::new("urgent").on("text", |_m, _c| Ok(()));
/// # let routine = FnExecutor::new("routine").on("text", |_m, _c| Ok(()));
///
/// let workflow = WorkflowBuilder::new("triage")
///     .add_executor(sort)
///     .add_executor(urgent)
///     .add_executor(routine)
///     .with_start("sort")
///     .add_switch(
///         "sort",
///         vec![SwitchArm::new(
///             Case::new("is_urgent", |p| p.value["urgent"] == true),
///             "urgent",
///         )],
///         Some("routine".into()),
///     )
///     .build()
///     .unwrap();
/// ```
pub struct WorkflowBuilder {
    name: String,
    registry: ExecutorRegistry,
    groups: Vec<EdgeGroup>,
    start: Option<ExecutorId>,
    runtime_config: RuntimeConfig,
    registration_violations: Vec<GraphViolation>,
}

impl WorkflowBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: ExecutorRegistry::new(),
            groups: Vec::new(),
            start: None,
            runtime_config: RuntimeConfig::default(),
            registration_violations: Vec::new(),
        }
    }

    /// Start from a pre-populated registry instead of registering executors
    /// one by one.
    #[must_use]
    pub fn with_registry(name: impl Into<String>, registry: ExecutorRegistry) -> Self {
        Self {
            name: name.into(),
            registry,
            groups: Vec::new(),
            start: None,
            runtime_config: RuntimeConfig::default(),
            registration_violations: Vec::new(),
        }
    }

    /// Register an executor under its own id.
    ///
    /// A duplicate id is recorded as a validation violation and reported by
    /// [`build`](Self::build) together with everything else.
    #[must_use]
    pub fn add_executor(mut self, executor: impl Executor + 'static) -> Self {
        let id = executor.id();
        if self.registry.register(executor).is_err() {
            self.registration_violations
                .push(GraphViolation::DuplicateExecutor { id });
        }
        self
    }

    /// Declare the executor that receives the run's initial message(s).
    #[must_use]
    pub fn with_start(mut self, id: impl Into<ExecutorId>) -> Self {
        self.start = Some(id.into());
        self
    }

    /// Add a 1:1 edge.
    #[must_use]
    pub fn add_edge(mut self, from: impl Into<ExecutorId>, to: impl Into<ExecutorId>) -> Self {
        self.groups.push(EdgeGroup::Single {
            source: from.into(),
            target: to.into(),
        });
        self
    }

    /// Add a fan-out group: every matching branch fires; the default target
    /// fires only when no gated branch matched.
    #[must_use]
    pub fn add_fan_out(
        mut self,
        from: impl Into<ExecutorId>,
        branches: Vec<Branch>,
        default: Option<ExecutorId>,
    ) -> Self {
        self.groups.push(EdgeGroup::FanOut {
            source: from.into(),
            branches,
            default,
        });
        self
    }

    /// Add a fan-in join: the target fires once per generation, after every
    /// listed source has delivered, with the assembled tuple tagged
    /// `output_tag`.
    #[must_use]
    pub fn add_fan_in(
        mut self,
        sources: Vec<ExecutorId>,
        target: impl Into<ExecutorId>,
        output_tag: impl Into<TypeTag>,
    ) -> Self {
        self.groups.push(EdgeGroup::FanIn {
            sources,
            target: target.into(),
            output_tag: output_tag.into(),
        });
        self
    }

    /// Add a switch-case group: arms are evaluated in declaration order and
    /// the first match wins; unmatched messages fall to the default target.
    #[must_use]
    pub fn add_switch(
        mut self,
        from: impl Into<ExecutorId>,
        arms: Vec<SwitchArm>,
        default: Option<ExecutorId>,
    ) -> Self {
        self.groups.push(EdgeGroup::SwitchCase {
            source: from.into(),
            arms,
            default,
        });
        self
    }

    /// Override the default runtime configuration of the compiled workflow.
    #[must_use]
    pub fn with_runtime_config(mut self, runtime_config: RuntimeConfig) -> Self {
        self.runtime_config = runtime_config;
        self
    }

    /// Validate and compile.
    ///
    /// Runs the full static validation pass; on failure the error carries
    /// **all** violations found, not just the first.
    pub fn build(self) -> Result<Workflow, GraphValidationError> {
        let mut violations = self.registration_violations;
        violations.extend(validation::validate(
            &self.registry,
            &self.groups,
            self.start.as_ref(),
        ));
        if !violations.is_empty() {
            return Err(GraphValidationError { violations });
        }

        let start = self
            .start
            .expect("start presence enforced by validation");
        let graph = WorkflowGraph::new(
            self.name,
            start,
            self.groups,
            self.registry.ids().to_vec(),
        );
        Ok(Workflow::from_parts(graph, self.registry, self.runtime_config))
    }
}
