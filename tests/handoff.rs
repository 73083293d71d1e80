use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;
use treadle::handoff::{
    AgentError, AgentReply, ChatAgent, ChatMessage, ChatRole, HandoffBuilder, ToolCall,
    handoff_tool_name, initial_conversation,
};
use treadle::runtimes::InMemoryCheckpointStorage;
use treadle::types::WorkflowRunState;

mod common;
use common::*;

/// Replies with a fixed text, counting invocations.
struct CountingAgent {
    name: String,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ChatAgent for CountingAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&mut self, conversation: &[ChatMessage]) -> Result<AgentReply, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AgentReply::say(
            &self.name,
            format!("thinking ({} messages so far)", conversation.len()),
        ))
    }
}

/// Echoes the last user message back.
struct EchoAgent;

#[async_trait]
impl ChatAgent for EchoAgent {
    fn name(&self) -> &str {
        "echo"
    }

    async fn reply(&mut self, conversation: &[ChatMessage]) -> Result<AgentReply, AgentError> {
        let last_user = conversation
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(AgentReply::say("echo", format!("you said: {last_user}")))
    }
}

/// Always transfers the conversation to `target`.
struct TransferAgent {
    name: String,
    target: String,
}

#[async_trait]
impl ChatAgent for TransferAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&mut self, _conversation: &[ChatMessage]) -> Result<AgentReply, AgentError> {
        let message = ChatMessage::assistant(&self.name, "routing you to a specialist")
            .with_tool_calls(vec![ToolCall {
                id: "call-1".to_string(),
                name: handoff_tool_name(&self.target.as_str().into()),
                arguments: json!({}),
            }]);
        Ok(AgentReply {
            messages: vec![message],
        })
    }
}

/// Answers and marks the conversation resolved.
struct ResolverAgent {
    name: String,
}

#[async_trait]
impl ChatAgent for ResolverAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn reply(&mut self, _conversation: &[ChatMessage]) -> Result<AgentReply, AgentError> {
        Ok(AgentReply::say(
            &self.name,
            "Your invoice has been corrected. RESOLVED",
        ))
    }
}

/// A handoff tool call re-routes the conversation at runtime; the
/// termination predicate ends the run with an output event.
#[tokio::test]
async fn handoff_tool_call_reroutes_to_target_agent() {
    let mut workflow = HandoffBuilder::new("support")
        .add_agent(TransferAgent {
            name: "triage".to_string(),
            target: "billing".to_string(),
        })
        .add_agent(ResolverAgent {
            name: "billing".to_string(),
        })
        .with_start("triage")
        .autonomous(5)
        .terminate_when(Arc::new(|conversation| {
            conversation
                .last()
                .is_some_and(|m| m.content.contains("RESOLVED"))
        }))
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow
        .run(initial_conversation("my invoice is wrong"))
        .await
        .unwrap();
    assert_eq!(report.state, WorkflowRunState::Idle);
    assert_eq!(report.outputs.len(), 1);
    assert!(report.pending_requests.is_empty());

    let conversation: Vec<ChatMessage> = report.outputs[0].decode().unwrap();
    // The reserved tool call was short-circuited with a synthetic result.
    assert!(conversation.iter().any(|m| {
        m.role == ChatRole::Tool && m.content == "transferred to billing"
    }));
    // Both agents spoke; the resolver's answer ends the transcript.
    assert!(conversation.iter().any(|m| m.author.as_deref() == Some("triage")));
    assert!(conversation.last().unwrap().content.contains("RESOLVED"));
}

/// Autonomous mode with a per-agent turn budget of 2: the third consecutive
/// internal turn is replaced by a forced suspension.
#[tokio::test]
async fn turn_budget_forces_suspension() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut workflow = HandoffBuilder::new("solo")
        .add_agent(CountingAgent {
            name: "worker".to_string(),
            calls: calls.clone(),
        })
        .autonomous(2)
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow.run(initial_conversation("go")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(report.pending_requests.len(), 1);
    // Exactly two turns ran before the forced request_info.
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.supersteps, 2);

    // User input opens a fresh turn window of the same size.
    let report = workflow.resume_with(json!("carry on")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

/// Interactive mode suspends after every agent turn.
#[tokio::test]
async fn interactive_mode_suspends_each_turn() {
    let mut workflow = HandoffBuilder::new("chat")
        .add_agent(EchoAgent)
        .interactive()
        .with_runtime_config(quiet())
        .build()
        .unwrap();

    let report = workflow.run(initial_conversation("hi")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(report.supersteps, 1);
    assert_eq!(
        report.pending_requests[0].prompt.value["message"],
        json!("you said: hi")
    );

    let report = workflow.resume_with(json!("bye")).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);
    assert_eq!(
        report.pending_requests[0].prompt.value["message"],
        json!("you said: bye")
    );
}

/// The agent executor's conversation survives checkpoint/restore through
/// the standard snapshot hooks.
#[tokio::test]
async fn conversation_survives_checkpoint_restore() {
    let storage: Arc<InMemoryCheckpointStorage> = Arc::new(InMemoryCheckpointStorage::new());
    let build = |storage: Arc<InMemoryCheckpointStorage>, calls: Arc<AtomicUsize>| {
        HandoffBuilder::new("durable-chat")
            .add_agent(CountingAgent {
                name: "worker".to_string(),
                calls,
            })
            .interactive()
            .with_runtime_config(quiet())
            .build()
            .unwrap()
            .with_checkpoint_storage(storage)
    };

    let mut original = build(storage.clone(), Arc::new(AtomicUsize::new(0)));
    // Conversation after the run: [user "hi", assistant "thinking (1 ...)"].
    original.run(initial_conversation("hi")).await.unwrap();
    let checkpoint_id = original.checkpoint().await.unwrap();

    let mut restored = build(storage.clone(), Arc::new(AtomicUsize::new(0)));
    let report = restored.resume_from_checkpoint(&checkpoint_id).await.unwrap();
    assert_eq!(report.state, WorkflowRunState::IdleWithPendingRequests);

    // The next turn sees the restored transcript plus the new user message.
    let report = restored.resume_with(json!("more")).await.unwrap();
    assert_eq!(
        report.pending_requests[0].prompt.value["message"],
        json!("thinking (3 messages so far)")
    );
}
