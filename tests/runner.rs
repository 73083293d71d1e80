use treadle::event_bus::WorkflowEvent;
use treadle::executors::FnExecutor;
use treadle::graphs::{Branch, WorkflowBuilder};
use treadle::message::Payload;
use treadle::runtimes::RunnerError;
use treadle::types::WorkflowRunState;
use treadle::workflow::WorkflowError;

mod common;
use common::*;

/// A start executor that emits nothing and requests nothing completes in
/// exactly one superstep, final state Idle.
#[tokio::test]
async fn noop_run_completes_in_one_superstep() {
    let noop = FnExecutor::new("noop").on("text", |_message, _ctx| Ok(()));
    let mut workflow = WorkflowBuilder::new("noop")
        .add_executor(noop)
        .with_start("noop")
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow.run(Payload::text("nothing to do")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::Idle);
    assert_eq!(report.supersteps, 1);
    assert!(report.outputs.is_empty());
    assert!(report.pending_requests.is_empty());
}

/// Linear chain of `length` executors ending in a sink; delivering through
/// it takes exactly `length` supersteps.
fn chain_workflow(length: usize, max_supersteps: u64) -> treadle::workflow::Workflow {
    let mut builder = WorkflowBuilder::new("chain")
        .with_runtime_config(quiet().with_max_supersteps(max_supersteps));
    for i in 0..length - 1 {
        builder = builder.add_executor(forwarder(&format!("n{i}")));
    }
    builder = builder.add_executor(sink(&format!("n{}", length - 1)));
    for i in 0..length - 1 {
        builder = builder.add_edge(format!("n{i}").as_str(), format!("n{}", i + 1).as_str());
    }
    builder.with_start("n0").build().unwrap()
}

/// A graph requiring exactly N supersteps completes with `max = N`; one
/// requiring N+1 fails with the convergence error on the (N+1)-th.
#[tokio::test]
async fn convergence_boundary() {
    // Delivering through a chain of length L takes L supersteps.
    let mut exact = chain_workflow(4, 4);
    let report = exact.run(Payload::text("go")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::Idle);
    assert_eq!(report.supersteps, 4);

    let mut over = chain_workflow(5, 4);
    let err = over.run(Payload::text("go")).await.unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Runner(RunnerError::Convergence { limit: 4 })
    ));
    assert_eq!(over.run_state(), WorkflowRunState::Failed);
}

/// An exception inside one executor is reported as an event and does not
/// abort independent downstream work.
#[tokio::test]
async fn executor_failure_is_contained() {
    let mut workflow = WorkflowBuilder::new("partial-failure")
        .add_executor(forwarder("spread"))
        .add_executor(FailingExecutor::new("bad"))
        .add_executor(sink("good"))
        .with_start("spread")
        .add_fan_out(
            "spread",
            vec![Branch::to("bad"), Branch::to("good")],
            None,
        )
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let mut stream = workflow.event_stream();
    let report = workflow.run(Payload::text("go")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::Idle);
    // The healthy branch still produced its output.
    assert_eq!(report.outputs.len(), 1);

    let events = drain_events(&mut stream).await;
    assert!(events.iter().any(|e| matches!(
        e,
        WorkflowEvent::ExecutorFailed { executor_id, detail }
            if executor_id.as_str() == "bad" && detail.contains("intentional")
    )));
    assert!(!events
        .iter()
        .any(|e| matches!(e, WorkflowEvent::Failed { .. })));
}

/// Cancellation takes effect between supersteps; the in-flight invocation
/// finishes before the run transitions.
#[tokio::test]
async fn cancellation_between_supersteps() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let slot: Arc<std::sync::OnceLock<treadle::runtimes::CancelHandle>> =
        Arc::new(std::sync::OnceLock::new());
    let handle_slot = slot.clone();
    let turns = Arc::new(AtomicUsize::new(0));
    let turns_inner = turns.clone();

    // Self-perpetuating executor that cancels its own run on the third turn.
    let looper = FnExecutor::new("looper").emits("text").on("text", move |message, ctx| {
        let turn = turns_inner.fetch_add(1, Ordering::SeqCst) + 1;
        if turn >= 3
            && let Some(handle) = handle_slot.get()
        {
            handle.cancel();
        }
        ctx.send_to("looper", message.payload);
        Ok(())
    });

    let mut workflow = WorkflowBuilder::new("cancel")
        .add_executor(looper)
        .with_start("looper")
        .with_runtime_config(quiet().with_max_supersteps(1000))
        .build()
        .unwrap();
    slot.set(workflow.cancel_handle()).expect("slot unset");

    let report = workflow.run(Payload::text("spin")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::Cancelled);
    // Turn three ran to completion; no fourth superstep started.
    assert_eq!(report.supersteps, 3);
    assert_eq!(turns.load(Ordering::SeqCst), 3);
}

/// The event stream carries the run lifecycle in order.
#[tokio::test]
async fn event_stream_carries_run_lifecycle() {
    let mut workflow = WorkflowBuilder::new("lifecycle")
        .add_executor(forwarder("a"))
        .add_executor(sink("b"))
        .with_start("a")
        .add_edge("a", "b")
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let mut stream = workflow.event_stream();
    workflow.run(Payload::text("go")).await.unwrap();
    let events = drain_events(&mut stream).await;

    assert!(matches!(events.first(), Some(WorkflowEvent::Started { .. })));
    assert!(events.last().is_some_and(WorkflowEvent::is_stream_end));

    let position = |pred: &dyn Fn(&WorkflowEvent) -> bool| events.iter().position(|e| pred(e));
    let started_1 =
        position(&|e| matches!(e, WorkflowEvent::SuperstepStarted { iteration: 1 })).unwrap();
    let completed_1 =
        position(&|e| matches!(e, WorkflowEvent::SuperstepCompleted { iteration: 1, .. }))
            .unwrap();
    let invoked_a = position(&|e| {
        matches!(e, WorkflowEvent::ExecutorInvoked { executor_id, .. } if executor_id.as_str() == "a")
    })
    .unwrap();
    let idle = position(&|e| {
        matches!(e, WorkflowEvent::Status { state: WorkflowRunState::Idle })
    })
    .unwrap();

    // Executor events flush after the superstep begins and before it ends.
    assert!(started_1 < invoked_a && invoked_a < completed_1);
    assert!(completed_1 < idle);

    let outputs: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, WorkflowEvent::Output { .. }))
        .collect();
    assert_eq!(outputs.len(), 1);
}

/// A message delivered to an executor with no handler for its tag is a
/// per-message diagnostic, not a run failure.
#[tokio::test]
async fn unhandled_tag_is_nonfatal() {
    // `mixed` emits both tags but the sink only handles `text`.
    let mixed = FnExecutor::new("mixed")
        .emits("text")
        .emits("number")
        .on("text", |_message, ctx| {
            ctx.send(Payload::text("fine"));
            ctx.send(Payload::new("number", serde_json::json!(7)));
            Ok(())
        });
    let mut workflow = WorkflowBuilder::new("unhandled")
        .add_executor(mixed)
        .add_executor(sink("only_text"))
        .with_start("mixed")
        .add_edge("mixed", "only_text")
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let mut stream = workflow.event_stream();
    let report = workflow.run(Payload::text("go")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::Idle);
    assert_eq!(report.outputs.len(), 1);

    let events = drain_events(&mut stream).await;
    assert!(events.iter().any(|e| matches!(
        e,
        WorkflowEvent::Diagnostic { message, .. } if message.contains("no handler for `number`")
    )));
}
