use treadle::executors::FnExecutor;
use treadle::graphs::{Case, GraphViolation, SwitchArm, WorkflowBuilder};

mod common;
use common::*;

#[test]
fn valid_linear_graph_builds() {
    let result = WorkflowBuilder::new("linear")
        .add_executor(forwarder("a"))
        .add_executor(sink("b"))
        .with_start("a")
        .add_edge("a", "b")
        .with_runtime_config(quiet())
        .build();
    assert!(result.is_ok());
}

#[test]
fn duplicate_edges_are_rejected() {
    let err = WorkflowBuilder::new("dup")
        .add_executor(forwarder("a"))
        .add_executor(sink("b"))
        .with_start("a")
        .add_edge("a", "b")
        .add_edge("a", "b")
        .build()
        .unwrap_err();
    assert!(err.violations.iter().any(|v| matches!(
        v,
        GraphViolation::EdgeDuplication { source, target, case: None }
            if source.as_str() == "a" && target.as_str() == "b"
    )));
}

#[test]
fn missing_start_is_rejected() {
    let err = WorkflowBuilder::new("no-start")
        .add_executor(sink("a"))
        .build()
        .unwrap_err();
    assert!(err
        .violations
        .iter()
        .any(|v| matches!(v, GraphViolation::MissingStart)));
}

#[test]
fn unknown_endpoints_are_rejected() {
    let err = WorkflowBuilder::new("ghost")
        .add_executor(forwarder("a"))
        .with_start("a")
        .add_edge("a", "ghost")
        .build()
        .unwrap_err();
    assert!(err.violations.iter().any(|v| matches!(
        v,
        GraphViolation::UnknownEndpoint { id, .. } if id.as_str() == "ghost"
    )));
}

#[test]
fn unreachable_executor_is_rejected() {
    let err = WorkflowBuilder::new("island")
        .add_executor(forwarder("a"))
        .add_executor(sink("b"))
        .add_executor(sink("island"))
        .with_start("a")
        .add_edge("a", "b")
        .build()
        .unwrap_err();
    assert!(err.violations.iter().any(|v| matches!(
        v,
        GraphViolation::Unreachable { id } if id.as_str() == "island"
    )));
}

#[test]
fn type_incompatible_edge_is_rejected() {
    // `numbers` emits a tag the sink has no handler for.
    let numbers = FnExecutor::new("numbers")
        .emits("number")
        .on("number", |message, ctx| {
            ctx.send(message.payload);
            Ok(())
        });
    let err = WorkflowBuilder::new("mismatch")
        .add_executor(numbers)
        .add_executor(sink("words"))
        .with_start("numbers")
        .add_edge("numbers", "words")
        .build()
        .unwrap_err();
    assert!(err.violations.iter().any(|v| matches!(
        v,
        GraphViolation::TypeIncompatible { source, target, .. }
            if source.as_str() == "numbers" && target.as_str() == "words"
    )));
}

#[test]
fn fan_in_output_tag_must_be_handled() {
    let err = WorkflowBuilder::new("join-mismatch")
        .add_executor(forwarder("a"))
        .add_executor(forwarder("b"))
        .add_executor(sink("join"))
        .with_start("a")
        .add_edge("a", "b")
        .add_fan_in(vec!["a".into(), "b".into()], "join", "pair")
        .build()
        .unwrap_err();
    assert!(err.violations.iter().any(|v| matches!(
        v,
        GraphViolation::JoinTypeIncompatible { target, .. } if target.as_str() == "join"
    )));
}

#[test]
fn all_violations_are_reported_together() {
    // One build with three distinct problems: no start, duplicate edge,
    // unknown endpoint.
    let err = WorkflowBuilder::new("many")
        .add_executor(forwarder("a"))
        .add_edge("a", "ghost")
        .add_edge("a", "ghost")
        .build()
        .unwrap_err();
    assert!(err.violations.len() >= 3, "got: {:?}", err.violations);
    assert!(err
        .violations
        .iter()
        .any(|v| matches!(v, GraphViolation::MissingStart)));
    assert!(err
        .violations
        .iter()
        .any(|v| matches!(v, GraphViolation::EdgeDuplication { .. })));
    assert!(err
        .violations
        .iter()
        .any(|v| matches!(v, GraphViolation::UnknownEndpoint { .. })));
}

#[test]
fn duplicate_executor_ids_are_rejected() {
    let err = WorkflowBuilder::new("twins")
        .add_executor(sink("a"))
        .add_executor(sink("a"))
        .with_start("a")
        .build()
        .unwrap_err();
    assert!(err.violations.iter().any(|v| matches!(
        v,
        GraphViolation::DuplicateExecutor { id } if id.as_str() == "a"
    )));
}

#[test]
fn switch_arms_with_distinct_names_are_not_duplicates() {
    let result = WorkflowBuilder::new("switch")
        .add_executor(forwarder("router"))
        .add_executor(sink("x"))
        .with_start("router")
        .add_switch(
            "router",
            vec![
                SwitchArm::new(Case::new("short", |p| p.value.as_str().is_some_and(|s| s.len() < 5)), "x"),
                SwitchArm::new(Case::new("long", |p| p.value.as_str().is_some_and(|s| s.len() >= 5)), "x"),
            ],
            None,
        )
        .build();
    assert!(result.is_ok());
}
