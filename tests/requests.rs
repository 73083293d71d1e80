use proptest::prelude::*;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use treadle::event_bus::WorkflowEvent;
use treadle::graphs::{Branch, WorkflowBuilder};
use treadle::message::Payload;
use treadle::runtimes::requests::{ResponseType, coerce};
use treadle::types::WorkflowRunState;

mod common;
use common::*;

fn responses(pairs: &[(&str, Value)]) -> FxHashMap<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Requesting input settles the run in IdleWithPendingRequests and emits a
/// request_info event.
#[tokio::test]
async fn request_input_suspends_the_run() {
    let mut workflow = WorkflowBuilder::new("ask")
        .add_executor(AccumulatorExecutor::new("acc"))
        .with_start("acc")
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let mut stream = workflow.event_stream();
    let report = workflow
        .run(Payload::new("number", json!(5)))
        .await
        .unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(report.pending_requests.len(), 1);
    assert_eq!(
        report.pending_requests[0].expected,
        ResponseType::Integer
    );

    let events = drain_events(&mut stream).await;
    assert!(events
        .iter()
        .any(|e| matches!(e, WorkflowEvent::RequestInfo { .. })));
}

/// Resuming with a matching id re-invokes the suspended executor with the
/// coerced value and the loop continues from there.
#[tokio::test]
async fn resume_by_request_id() {
    let mut workflow = WorkflowBuilder::new("ask")
        .add_executor(AccumulatorExecutor::new("acc"))
        .with_start("acc")
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow
        .run(Payload::new("number", json!(5)))
        .await
        .unwrap();
    let request_id = report.pending_requests[0].request_id.clone();

    // String "3" coerces to integer 3.
    let report = workflow
        .resume(responses(&[(request_id.as_str(), json!("3"))]))
        .await
        .unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);

    let report = workflow.resume_with(json!(-1)).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::Idle);
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].value, json!(8));
}

/// The single pending request accepts a single unmatched value.
#[tokio::test]
async fn sole_response_answers_sole_request() {
    let mut workflow = WorkflowBuilder::new("ask")
        .add_executor(AccumulatorExecutor::new("acc"))
        .with_start("acc")
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    workflow.run(Payload::new("number", json!(1))).await.unwrap();
    let report = workflow
        .resume(responses(&[("not-a-real-id", json!(-1))]))
        .await
        .unwrap();
    assert_eq!(report.state, WorkflowRunState::Idle);
    assert_eq!(report.outputs[0].value, json!(1));
}

/// A response for an unknown id is ignored: no error, unrelated requests
/// untouched, run remains IdleWithPendingRequests for the others.
#[tokio::test]
async fn unmatched_resume_is_safe() {
    let splitter = treadle::executors::FnExecutor::new("split")
        .emits("number")
        .on("number", |message, ctx| {
            ctx.send(message.payload);
            Ok(())
        });
    let mut workflow = WorkflowBuilder::new("two-asks")
        .add_executor(splitter)
        .add_executor(AccumulatorExecutor::new("left"))
        .add_executor(AccumulatorExecutor::new("right"))
        .with_start("split")
        .add_fan_out(
            "split",
            vec![Branch::to("left"), Branch::to("right")],
            None,
        )
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow.run(Payload::new("number", json!(4))).await.unwrap();
    assert_eq!(report.pending_requests.len(), 2);
    let before: Vec<_> = report
        .pending_requests
        .iter()
        .map(|r| r.request_id.clone())
        .collect();

    let report = workflow
        .resume(responses(&[("no-such-request", json!(1))]))
        .await
        .unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    let after: Vec<_> = report
        .pending_requests
        .iter()
        .map(|r| r.request_id.clone())
        .collect();
    assert_eq!(before, after);
}

/// Two pending requests answered independently by id; answering one leaves
/// the other pending.
#[tokio::test]
async fn partial_resume_keeps_remaining_requests() {
    let splitter = treadle::executors::FnExecutor::new("split")
        .emits("number")
        .on("number", |message, ctx| {
            ctx.send(message.payload);
            Ok(())
        });
    let mut workflow = WorkflowBuilder::new("two-asks")
        .add_executor(splitter)
        .add_executor(AccumulatorExecutor::new("left"))
        .add_executor(AccumulatorExecutor::new("right"))
        .with_start("split")
        .add_fan_out(
            "split",
            vec![Branch::to("left"), Branch::to("right")],
            None,
        )
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow.run(Payload::new("number", json!(10))).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(report.pending_requests.len(), 2);

    let left_request = report
        .pending_requests
        .iter()
        .find(|r| r.executor_id.as_str() == "left")
        .unwrap()
        .request_id
        .clone();

    // Answer left with a terminator; right stays pending.
    let report = workflow
        .resume(responses(&[(left_request.as_str(), json!(-1))]))
        .await
        .unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(report.pending_requests.len(), 1);
    assert_eq!(report.pending_requests[0].executor_id.as_str(), "right");
    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].value, json!(10));
}

/// A value that cannot be coerced leaves the request pending.
#[tokio::test]
async fn uncoercible_response_leaves_request_pending() {
    let mut workflow = WorkflowBuilder::new("ask")
        .add_executor(AccumulatorExecutor::new("acc"))
        .with_start("acc")
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow.run(Payload::new("number", json!(2))).await.unwrap();
    let request_id = report.pending_requests[0].request_id.clone();

    let report = workflow
        .resume(responses(&[(request_id.as_str(), json!("not a number"))]))
        .await
        .unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(report.pending_requests.len(), 1);
    assert_eq!(report.pending_requests[0].request_id, request_id);
}

proptest! {
    /// Integer coercion accepts every i64, native or stringified.
    #[test]
    fn integer_coercion_round_trips(n in any::<i64>()) {
        prop_assert_eq!(coerce(&ResponseType::Integer, json!(n)).unwrap(), json!(n));
        prop_assert_eq!(
            coerce(&ResponseType::Integer, json!(n.to_string())).unwrap(),
            json!(n)
        );
    }

    /// Text coercion is the identity on strings.
    #[test]
    fn text_coercion_preserves_strings(s in ".*") {
        prop_assert_eq!(
            coerce(&ResponseType::Text, json!(s.clone())).unwrap(),
            json!(s)
        );
    }
}
