//! Edge groups and routing predicates.
//!
//! Executors are connected by *edge groups*, each owning one routing
//! decision:
//!
//! - [`EdgeGroup::Single`]: 1:1 forward, payload unchanged.
//! - [`EdgeGroup::FanOut`]: 1:N broadcast; every matching [`Case`] fires
//!   (not first-match), a default target fires only when no case matched.
//! - [`EdgeGroup::FanIn`]: N:1 join; buffers one payload per source per
//!   generation and fires the ordered tuple exactly once when every
//!   required source has delivered.
//! - [`EdgeGroup::SwitchCase`]: first matching case in declaration order
//!   wins, falling back to the default target.
//!
//! Case predicates are opaque closures, so every case carries a stable
//! `name` used for duplicate-edge detection and routing diagnostics.

use std::fmt;
use std::sync::Arc;

use crate::message::Payload;
use crate::types::{ExecutorId, TypeTag};

/// Predicate evaluated against a payload to gate a conditional edge.
pub type CasePredicate = Arc<dyn Fn(&Payload) -> bool + Send + Sync + 'static>;

/// A named routing condition.
///
/// The name is the case's identity: two edges between the same endpoints
/// with the same case name are rejected as duplicates at build time, and
/// routing diagnostics report the name rather than an anonymous closure.
#[derive(Clone)]
pub struct Case {
    name: String,
    predicate: CasePredicate,
}

impl Case {
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Payload) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn matches(&self, payload: &Payload) -> bool {
        (self.predicate)(payload)
    }
}

impl fmt::Debug for Case {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Case").field("name", &self.name).finish()
    }
}

/// One downstream branch of a fan-out group.
#[derive(Clone, Debug)]
pub struct Branch {
    pub target: ExecutorId,
    pub case: Option<Case>,
}

impl Branch {
    /// An ungated branch that fires for every message.
    pub fn to(target: impl Into<ExecutorId>) -> Self {
        Self {
            target: target.into(),
            case: None,
        }
    }

    /// A branch gated by a case predicate.
    pub fn when(target: impl Into<ExecutorId>, case: Case) -> Self {
        Self {
            target: target.into(),
            case: Some(case),
        }
    }
}

/// One arm of a switch-case group. Unlike fan-out branches the case is
/// mandatory; the optional fallback lives on the group itself.
#[derive(Clone, Debug)]
pub struct SwitchArm {
    pub case: Case,
    pub target: ExecutorId,
}

impl SwitchArm {
    pub fn new(case: Case, target: impl Into<ExecutorId>) -> Self {
        Self {
            case,
            target: target.into(),
        }
    }
}

/// A routing group connecting executors. Immutable after build.
#[derive(Clone, Debug)]
pub enum EdgeGroup {
    Single {
        source: ExecutorId,
        target: ExecutorId,
    },
    FanOut {
        source: ExecutorId,
        branches: Vec<Branch>,
        default: Option<ExecutorId>,
    },
    /// N:1 join. The assembled tuple is delivered as a payload tagged
    /// `output_tag` whose value is an array ordered by `sources`, each item
    /// `{"source": id, "tag": ..., "value": ...}`.
    FanIn {
        sources: Vec<ExecutorId>,
        target: ExecutorId,
        output_tag: TypeTag,
    },
    SwitchCase {
        source: ExecutorId,
        arms: Vec<SwitchArm>,
        default: Option<ExecutorId>,
    },
}

impl EdgeGroup {
    /// Whether messages emitted by `source` enter this group.
    #[must_use]
    pub fn accepts_source(&self, source: &ExecutorId) -> bool {
        match self {
            EdgeGroup::Single { source: s, .. }
            | EdgeGroup::FanOut { source: s, .. }
            | EdgeGroup::SwitchCase { source: s, .. } => s == source,
            EdgeGroup::FanIn { sources, .. } => sources.contains(source),
        }
    }

    /// Every (source, target) pair implied by this group, with the case
    /// name when the edge is gated. Drives duplicate detection and
    /// reachability analysis.
    #[must_use]
    pub fn edge_keys(&self) -> Vec<(ExecutorId, ExecutorId, Option<String>)> {
        match self {
            EdgeGroup::Single { source, target } => {
                vec![(source.clone(), target.clone(), None)]
            }
            EdgeGroup::FanOut {
                source,
                branches,
                default,
            } => {
                let mut keys: Vec<_> = branches
                    .iter()
                    .map(|b| {
                        (
                            source.clone(),
                            b.target.clone(),
                            b.case.as_ref().map(|c| c.name().to_string()),
                        )
                    })
                    .collect();
                if let Some(d) = default {
                    keys.push((source.clone(), d.clone(), Some("default".to_string())));
                }
                keys
            }
            EdgeGroup::FanIn {
                sources, target, ..
            } => sources
                .iter()
                .map(|s| (s.clone(), target.clone(), Some("join".to_string())))
                .collect(),
            EdgeGroup::SwitchCase {
                source,
                arms,
                default,
            } => {
                let mut keys: Vec<_> = arms
                    .iter()
                    .map(|a| {
                        (
                            source.clone(),
                            a.target.clone(),
                            Some(a.case.name().to_string()),
                        )
                    })
                    .collect();
                if let Some(d) = default {
                    keys.push((source.clone(), d.clone(), Some("default".to_string())));
                }
                keys
            }
        }
    }

    /// Short human-readable description for diagnostics.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            EdgeGroup::Single { source, target } => format!("{source} -> {target}"),
            EdgeGroup::FanOut { source, branches, .. } => {
                format!("{source} -> fan-out({})", branches.len())
            }
            EdgeGroup::FanIn { sources, target, .. } => {
                format!("fan-in({}) -> {target}", sources.len())
            }
            EdgeGroup::SwitchCase { source, arms, .. } => {
                format!("{source} -> switch({})", arms.len())
            }
        }
    }
}
