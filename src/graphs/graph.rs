//! Immutable compiled graph description.

use crate::graphs::edges::EdgeGroup;
use crate::types::ExecutorId;

/// The validated, immutable shape of a workflow: executors, edge groups,
/// and the declared start executor.
///
/// Built by [`WorkflowBuilder::build`](crate::graphs::WorkflowBuilder::build)
/// after static validation has passed; never mutated afterwards. The graph
/// does not own executor instances (the registry does), only their ids.
#[derive(Clone, Debug)]
pub struct WorkflowGraph {
    name: String,
    start: ExecutorId,
    groups: Vec<EdgeGroup>,
    executor_ids: Vec<ExecutorId>,
}

impl WorkflowGraph {
    pub(crate) fn new(
        name: String,
        start: ExecutorId,
        groups: Vec<EdgeGroup>,
        executor_ids: Vec<ExecutorId>,
    ) -> Self {
        Self {
            name,
            start,
            groups,
            executor_ids,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn start(&self) -> &ExecutorId {
        &self.start
    }

    #[must_use]
    pub fn groups(&self) -> &[EdgeGroup] {
        &self.groups
    }

    #[must_use]
    pub fn executor_ids(&self) -> &[ExecutorId] {
        &self.executor_ids
    }

    /// Edge groups a message emitted by `source` enters, in declaration
    /// order, paired with their stable group index (the key for persisted
    /// fan-in buffers).
    pub fn groups_for_source<'a>(
        &'a self,
        source: &'a ExecutorId,
    ) -> impl Iterator<Item = (usize, &'a EdgeGroup)> + 'a {
        self.groups
            .iter()
            .enumerate()
            .filter(move |(_, g)| g.accepts_source(source))
    }
}
