//! Static graph validation.
//!
//! Validation runs once at build time, before any message is processed.
//! It is exhaustive: every violation found is collected and returned
//! together in a single [`GraphValidationError`] instead of failing fast on
//! the first, so a misconfigured graph surfaces its whole problem set in
//! one pass.

use miette::Diagnostic;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

use crate::executors::ExecutorRegistry;
use crate::graphs::edges::EdgeGroup;
use crate::types::{ExecutorId, TypeTag};

/// One static defect found in a workflow graph.
#[derive(Debug, Error, Diagnostic)]
pub enum GraphViolation {
    #[error("duplicate edge {source} -> {target} (case: {})", case.as_deref().unwrap_or("none"))]
    #[diagnostic(
        code(treadle::graph::duplicate_edge),
        help("Remove the repeated edge or give its case a distinct name.")
    )]
    EdgeDuplication {
        source: ExecutorId,
        target: ExecutorId,
        case: Option<String>,
    },

    #[error("executor id `{id}` registered twice")]
    #[diagnostic(
        code(treadle::graph::duplicate_executor),
        help("Executor ids must be unique within a workflow graph.")
    )]
    DuplicateExecutor { id: ExecutorId },

    #[error("no start executor declared")]
    #[diagnostic(
        code(treadle::graph::missing_start),
        help("Call `with_start` on the builder before `build`.")
    )]
    MissingStart,

    #[error("`{id}` is referenced by {referenced_by} but never registered")]
    #[diagnostic(
        code(treadle::graph::unknown_endpoint),
        help("Register the executor or fix the edge endpoint.")
    )]
    UnknownEndpoint {
        id: ExecutorId,
        referenced_by: String,
    },

    #[error("executor `{id}` is unreachable from the start executor")]
    #[diagnostic(
        code(treadle::graph::unreachable),
        help("Connect the executor with an edge, or remove it from the registry.")
    )]
    Unreachable { id: ExecutorId },

    #[error("edge {source} -> {target} carries no type the target handles")]
    #[diagnostic(
        code(treadle::graph::type_incompatible),
        help("The source's declared output tags must intersect the target's input tags.")
    )]
    TypeIncompatible {
        source: ExecutorId,
        target: ExecutorId,
        outputs: Vec<TypeTag>,
    },

    #[error("fan-in into `{target}` produces `{output_tag}`, which the target does not handle")]
    #[diagnostic(code(treadle::graph::join_type_incompatible))]
    JoinTypeIncompatible {
        target: ExecutorId,
        output_tag: TypeTag,
    },

    #[error("fan-in into `{target}` declares no sources")]
    #[diagnostic(code(treadle::graph::empty_join))]
    EmptyJoin { target: ExecutorId },
}

/// Aggregate of every violation found during one validation pass.
#[derive(Debug, Error, Diagnostic)]
#[error("workflow graph validation failed with {} violation(s)", violations.len())]
#[diagnostic(code(treadle::graph::invalid))]
pub struct GraphValidationError {
    #[related]
    pub violations: Vec<GraphViolation>,
}

/// Validate the graph statically. Returns every violation found; an empty
/// vector means the graph is well-formed.
pub(crate) fn validate(
    registry: &ExecutorRegistry,
    groups: &[EdgeGroup],
    start: Option<&ExecutorId>,
) -> Vec<GraphViolation> {
    let mut violations = Vec::new();

    check_endpoints(registry, groups, start, &mut violations);
    check_duplicates(groups, &mut violations);
    check_connectivity(registry, groups, start, &mut violations);
    check_type_compatibility(registry, groups, &mut violations);

    violations
}

fn check_endpoints(
    registry: &ExecutorRegistry,
    groups: &[EdgeGroup],
    start: Option<&ExecutorId>,
    violations: &mut Vec<GraphViolation>,
) {
    match start {
        None => violations.push(GraphViolation::MissingStart),
        Some(id) if !registry.contains(id) => violations.push(GraphViolation::UnknownEndpoint {
            id: id.clone(),
            referenced_by: "the start declaration".to_string(),
        }),
        Some(_) => {}
    }

    let mut reported: FxHashSet<ExecutorId> = FxHashSet::default();
    for group in groups {
        for (source, target, _) in group.edge_keys() {
            for id in [source, target] {
                if !registry.contains(&id) && reported.insert(id.clone()) {
                    violations.push(GraphViolation::UnknownEndpoint {
                        id,
                        referenced_by: format!("edge group `{}`", group.describe()),
                    });
                }
            }
        }
        if let EdgeGroup::FanIn { sources, target, .. } = group
            && sources.is_empty()
        {
            violations.push(GraphViolation::EmptyJoin {
                target: target.clone(),
            });
        }
    }
}

fn check_duplicates(groups: &[EdgeGroup], violations: &mut Vec<GraphViolation>) {
    let mut seen: FxHashSet<(ExecutorId, ExecutorId, Option<String>)> = FxHashSet::default();
    for group in groups {
        for key in group.edge_keys() {
            if !seen.insert(key.clone()) {
                let (source, target, case) = key;
                violations.push(GraphViolation::EdgeDuplication {
                    source,
                    target,
                    case,
                });
            }
        }
    }
}

/// Breadth-first reachability from the start executor.
///
/// Fan-in targets are considered reachable as soon as any of their sources
/// is: a static over-approximation, since the join only fires once every
/// source has delivered at runtime.
fn check_connectivity(
    registry: &ExecutorRegistry,
    groups: &[EdgeGroup],
    start: Option<&ExecutorId>,
    violations: &mut Vec<GraphViolation>,
) {
    let Some(start) = start else {
        return;
    };
    if !registry.contains(start) {
        return;
    }

    let mut adjacency: FxHashMap<ExecutorId, Vec<ExecutorId>> = FxHashMap::default();
    for group in groups {
        for (source, target, _) in group.edge_keys() {
            adjacency.entry(source).or_default().push(target);
        }
    }

    let mut visited: FxHashSet<ExecutorId> = FxHashSet::default();
    let mut frontier = vec![start.clone()];
    visited.insert(start.clone());
    while let Some(current) = frontier.pop() {
        if let Some(next) = adjacency.get(&current) {
            for target in next {
                if visited.insert(target.clone()) {
                    frontier.push(target.clone());
                }
            }
        }
    }

    for id in registry.ids() {
        if !visited.contains(id) {
            violations.push(GraphViolation::Unreachable { id: id.clone() });
        }
    }
}

fn check_type_compatibility(
    registry: &ExecutorRegistry,
    groups: &[EdgeGroup],
    violations: &mut Vec<GraphViolation>,
) {
    let mut checked: FxHashSet<(ExecutorId, ExecutorId)> = FxHashSet::default();

    for group in groups {
        if let EdgeGroup::FanIn {
            target, output_tag, ..
        } = group
        {
            if registry.contains(target) && !registry.accepts(target, output_tag) {
                violations.push(GraphViolation::JoinTypeIncompatible {
                    target: target.clone(),
                    output_tag: output_tag.clone(),
                });
            }
            // Join inputs buffer any payload; only the assembled tuple is typed.
            continue;
        }

        for (source, target, _) in group.edge_keys() {
            if !checked.insert((source.clone(), target.clone())) {
                continue;
            }
            let (Some(src), Some(_)) = (registry.get(&source), registry.get(&target)) else {
                continue;
            };
            let outputs = src.output_tags();
            if outputs.is_empty() {
                // Dynamic source; nothing to check statically.
                continue;
            }
            if !outputs.iter().any(|tag| registry.accepts(&target, tag)) {
                violations.push(GraphViolation::TypeIncompatible {
                    source,
                    target,
                    outputs,
                });
            }
        }
    }
}
