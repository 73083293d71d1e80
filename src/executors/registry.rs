//! Explicit executor registry passed into the graph builder.
//!
//! Nothing in the engine is process-global: the registry owns the executor
//! instances for one workflow and preserves registration order so that
//! broadcast delivery and validation output are deterministic.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::Executor;
use crate::types::{ExecutorId, TypeTag};

/// Owning collection of the executors that make up one workflow graph.
#[derive(Default)]
pub struct ExecutorRegistry {
    order: Vec<ExecutorId>,
    executors: FxHashMap<ExecutorId, Box<dyn Executor>>,
}

#[derive(Debug, Error, Diagnostic)]
pub enum RegistryError {
    #[error("executor id `{id}` registered twice")]
    #[diagnostic(
        code(treadle::registry::duplicate),
        help("Executor ids must be unique within a workflow graph.")
    )]
    Duplicate { id: ExecutorId },
}

impl ExecutorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor under its own id.
    pub fn register(&mut self, executor: impl Executor + 'static) -> Result<(), RegistryError> {
        self.register_boxed(Box::new(executor))
    }

    pub fn register_boxed(&mut self, executor: Box<dyn Executor>) -> Result<(), RegistryError> {
        let id = executor.id();
        if self.executors.contains_key(&id) {
            return Err(RegistryError::Duplicate { id });
        }
        self.order.push(id.clone());
        self.executors.insert(id, executor);
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, id: &ExecutorId) -> bool {
        self.executors.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &ExecutorId) -> Option<&dyn Executor> {
        self.executors.get(id).map(|e| e.as_ref())
    }

    pub fn get_mut(&mut self, id: &ExecutorId) -> Option<&mut Box<dyn Executor>> {
        self.executors.get_mut(id)
    }

    /// Registration order; the deterministic iteration order for broadcast
    /// delivery and checkpoint capture.
    #[must_use]
    pub fn ids(&self) -> &[ExecutorId] {
        &self.order
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Declared input tags for one executor, or `None` if unregistered.
    #[must_use]
    pub fn input_tags(&self, id: &ExecutorId) -> Option<Vec<TypeTag>> {
        self.get(id).map(|e| e.input_tags())
    }

    /// Whether the executor accepts the given tag (exact match).
    #[must_use]
    pub fn accepts(&self, id: &ExecutorId, tag: &TypeTag) -> bool {
        self.get(id)
            .map(|e| e.input_tags().contains(tag))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("executors", &self.order)
            .finish()
    }
}
