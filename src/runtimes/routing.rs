//! Edge-group routing: turning an emitted message into concrete deliveries.
//!
//! Routing is pure with respect to the graph and mutates only the fan-in
//! join buffers, which live in [`EdgeRunnerState`] so they persist across
//! checkpoints. All decisions are deterministic: groups are evaluated in
//! declaration order, and fan-in tuples are ordered by the group's declared
//! source order regardless of arrival order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::graphs::WorkflowGraph;
use crate::graphs::edges::EdgeGroup;
use crate::message::{Payload, WorkflowMessage};
use crate::types::ExecutorId;

/// One concrete (target, payload) pair produced by routing.
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    pub target: ExecutorId,
    pub payload: Payload,
}

/// Join bookkeeping for a single fan-in group.
///
/// `generation` is the monotonically increasing join epoch; the buffer
/// holds at most one payload per source for the current generation
/// (last-write-wins on repeat arrivals).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinState {
    pub generation: u64,
    pub buffer: BTreeMap<ExecutorId, Payload>,
}

/// Mutable routing state, keyed by each fan-in group's stable index in the
/// graph. Serialized into every checkpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeRunnerState {
    pub joins: BTreeMap<usize, JoinState>,
}

/// Result of routing one message.
#[derive(Debug, Default)]
pub struct RoutingOutcome {
    pub deliveries: Vec<Delivery>,
    /// Human-readable notes for dropped messages; surfaced as diagnostic
    /// events by the runner.
    pub diagnostics: Vec<String>,
}

/// Route a `Routed`-target message through its source's edge groups.
///
/// A message whose source matches no group, or that falls through a
/// fan-out/switch with no match and no default, produces zero deliveries
/// and a diagnostic instead.
pub(crate) fn route(
    graph: &WorkflowGraph,
    state: &mut EdgeRunnerState,
    message: &WorkflowMessage,
) -> RoutingOutcome {
    let mut outcome = RoutingOutcome::default();
    let mut matched_any_group = false;

    for (index, group) in graph.groups_for_source(&message.source) {
        matched_any_group = true;
        match group {
            EdgeGroup::Single { target, .. } => {
                outcome.deliveries.push(Delivery {
                    target: target.clone(),
                    payload: message.payload.clone(),
                });
            }
            EdgeGroup::FanOut {
                source,
                branches,
                default,
            } => route_fan_out(source, branches, default.as_ref(), message, &mut outcome),
            EdgeGroup::FanIn {
                sources,
                target,
                output_tag,
            } => {
                let join = state.joins.entry(index).or_default();
                record_join_arrival(join, sources, target, output_tag, message, &mut outcome);
            }
            EdgeGroup::SwitchCase {
                source,
                arms,
                default,
            } => route_switch(source, arms, default.as_ref(), message, &mut outcome),
        }
    }

    if !matched_any_group {
        outcome.diagnostics.push(format!(
            "message `{}` from `{}` matched no edge group; dropped",
            message.payload.tag, message.source
        ));
    }

    outcome
}

fn route_fan_out(
    source: &ExecutorId,
    branches: &[crate::graphs::edges::Branch],
    default: Option<&ExecutorId>,
    message: &WorkflowMessage,
    outcome: &mut RoutingOutcome,
) {
    let mut any_case_matched = false;
    let mut fired = false;

    // Every matching branch fires; this is a broadcast, not first-match.
    for branch in branches {
        match &branch.case {
            None => {
                fired = true;
                outcome.deliveries.push(Delivery {
                    target: branch.target.clone(),
                    payload: message.payload.clone(),
                });
            }
            Some(case) if case.matches(&message.payload) => {
                any_case_matched = true;
                fired = true;
                outcome.deliveries.push(Delivery {
                    target: branch.target.clone(),
                    payload: message.payload.clone(),
                });
            }
            Some(_) => {}
        }
    }

    if !any_case_matched
        && let Some(default) = default
    {
        fired = true;
        outcome.deliveries.push(Delivery {
            target: default.clone(),
            payload: message.payload.clone(),
        });
    }

    if !fired {
        outcome.diagnostics.push(format!(
            "fan-out from `{source}` matched no branch for `{}` and has no default; dropped",
            message.payload.tag
        ));
    }
}

fn route_switch(
    source: &ExecutorId,
    arms: &[crate::graphs::edges::SwitchArm],
    default: Option<&ExecutorId>,
    message: &WorkflowMessage,
    outcome: &mut RoutingOutcome,
) {
    // First match in declaration order wins.
    for arm in arms {
        if arm.case.matches(&message.payload) {
            outcome.deliveries.push(Delivery {
                target: arm.target.clone(),
                payload: message.payload.clone(),
            });
            return;
        }
    }
    if let Some(default) = default {
        outcome.deliveries.push(Delivery {
            target: default.clone(),
            payload: message.payload.clone(),
        });
        return;
    }
    outcome.diagnostics.push(format!(
        "switch from `{source}` matched no case for `{}` and has no default; dropped",
        message.payload.tag
    ));
}

fn record_join_arrival(
    join: &mut JoinState,
    sources: &[ExecutorId],
    target: &ExecutorId,
    output_tag: &crate::types::TypeTag,
    message: &WorkflowMessage,
    outcome: &mut RoutingOutcome,
) {
    // Last-write-wins within a generation keeps the buffer bounded when a
    // source delivers more than once before the join fires.
    if join.buffer.insert(message.source.clone(), message.payload.clone()).is_some() {
        outcome.diagnostics.push(format!(
            "fan-in into `{target}`: `{}` delivered again in generation {}; overwrote buffered value",
            message.source, join.generation
        ));
    }

    if sources.iter().all(|s| join.buffer.contains_key(s)) {
        let items: Vec<_> = sources
            .iter()
            .map(|s| {
                let payload = &join.buffer[s];
                json!({
                    "source": s,
                    "tag": payload.tag,
                    "value": payload.value,
                })
            })
            .collect();
        outcome.deliveries.push(Delivery {
            target: target.clone(),
            payload: Payload::new(output_tag.clone(), serde_json::Value::Array(items)),
        });
        join.generation += 1;
        join.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphs::edges::EdgeGroup;

    fn join_graph() -> WorkflowGraph {
        WorkflowGraph::new(
            "join".to_string(),
            "a".into(),
            vec![EdgeGroup::FanIn {
                sources: vec!["a".into(), "b".into()],
                target: "sum".into(),
                output_tag: "pair".into(),
            }],
            vec!["a".into(), "b".into(), "sum".into()],
        )
    }

    #[test]
    fn join_fires_once_per_generation() {
        let graph = join_graph();
        let mut state = EdgeRunnerState::default();

        let first = route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("a", Payload::text("left")),
        );
        assert!(first.deliveries.is_empty());

        let second = route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("b", Payload::text("right")),
        );
        assert_eq!(second.deliveries.len(), 1);
        assert_eq!(second.deliveries[0].target, "sum".into());
        assert_eq!(state.joins[&0].generation, 1);
        assert!(state.joins[&0].buffer.is_empty());
    }

    #[test]
    fn repeat_arrival_overwrites_without_firing() {
        let graph = join_graph();
        let mut state = EdgeRunnerState::default();

        route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("a", Payload::text("v1")),
        );
        let repeat = route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("a", Payload::text("v2")),
        );
        assert!(repeat.deliveries.is_empty());
        assert_eq!(repeat.diagnostics.len(), 1);

        let fire = route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("b", Payload::text("right")),
        );
        let tuple = &fire.deliveries[0].payload.value;
        assert_eq!(tuple[0]["value"], "v2");
    }

    #[test]
    fn tuple_ordered_by_declared_sources() {
        let graph = join_graph();
        let mut state = EdgeRunnerState::default();

        // Arrival order b-then-a must still yield [a, b].
        route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("b", Payload::text("right")),
        );
        let fire = route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("a", Payload::text("left")),
        );
        let tuple = &fire.deliveries[0].payload.value;
        assert_eq!(tuple[0]["source"], "a");
        assert_eq!(tuple[1]["source"], "b");
    }

    #[test]
    fn unrouted_message_is_dropped_with_diagnostic() {
        let graph = join_graph();
        let mut state = EdgeRunnerState::default();
        let outcome = route(
            &graph,
            &mut state,
            &WorkflowMessage::routed("sum", Payload::text("end of line")),
        );
        assert!(outcome.deliveries.is_empty());
        assert_eq!(outcome.diagnostics.len(), 1);
    }
}
