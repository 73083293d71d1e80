//! Agent executor: wraps a [`ChatAgent`] as a workflow executor.
//!
//! Each delivery of a conversation is one agent *turn*: the agent replies,
//! reserved handoff tool calls are intercepted and short-circuited with a
//! synthetic tool result, and the executor decides what happens next:
//! transfer the conversation, continue itself, or suspend for user input.
//!
//! The conversation and the consecutive-turn counter are the executor's
//! private state, captured into checkpoints through the standard
//! snapshot/restore hooks.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::agent::{
    AgentReply, CONVERSATION_TAG, ChatAgent, ChatMessage, conversation_payload,
    parse_handoff_target,
};
use super::replay::{ReplayDedup, merge_conversation};
use crate::executors::{Executor, ExecutorError};
use crate::message::{Payload, WorkflowMessage};
use crate::runtimes::requests::{InputResponse, RESPONSE_TAG, ResponseType};
use crate::runtimes::WorkflowContext;
use crate::types::{ExecutorId, TypeTag};

/// Tag of the agent executor's persisted private state.
pub const AGENT_STATE_TAG: &str = "handoff.agent_state";

/// How an agent interacts with the outside world between turns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandoffMode {
    /// Every agent turn suspends for a request/response cycle.
    Interactive,
    /// The agent may take up to `turn_budget` consecutive internal turns
    /// before a suspension is forced.
    Autonomous { turn_budget: u32 },
}

/// Predicate over the full running conversation, checked after each turn.
pub type TerminationPredicate = Arc<dyn Fn(&[ChatMessage]) -> bool + Send + Sync + 'static>;

#[derive(Debug, Serialize, Deserialize)]
struct AgentExecutorState {
    conversation: Vec<ChatMessage>,
    consecutive_turns: u32,
}

/// Executor wrapping one chat agent.
pub struct AgentExecutor {
    id: ExecutorId,
    agent: Box<dyn ChatAgent>,
    mode: HandoffMode,
    terminate: Option<TerminationPredicate>,
    dedup: ReplayDedup,
    conversation: Vec<ChatMessage>,
    consecutive_turns: u32,
}

impl AgentExecutor {
    /// Wrap an agent under its own name.
    pub fn new(agent: impl ChatAgent + 'static) -> Self {
        let id = ExecutorId::new(agent.name());
        Self {
            id,
            agent: Box::new(agent),
            mode: HandoffMode::Interactive,
            terminate: None,
            dedup: ReplayDedup::default(),
            conversation: Vec::new(),
            consecutive_turns: 0,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: HandoffMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_termination(mut self, predicate: TerminationPredicate) -> Self {
        self.terminate = Some(predicate);
        self
    }

    #[must_use]
    pub fn with_dedup(mut self, dedup: ReplayDedup) -> Self {
        self.dedup = dedup;
        self
    }

    #[must_use]
    pub fn conversation(&self) -> &[ChatMessage] {
        &self.conversation
    }

    /// Run one agent turn against the cached conversation.
    async fn take_turn(&mut self, ctx: &mut WorkflowContext) -> Result<(), ExecutorError> {
        self.consecutive_turns += 1;
        let reply = self
            .agent
            .reply(&self.conversation)
            .await
            .map_err(|e| ExecutorError::Agent {
                agent: self.agent.name().to_string(),
                message: e.to_string(),
            })?;

        let handoff_target = self.absorb_reply(reply, ctx);

        if let Some(predicate) = &self.terminate
            && predicate(&self.conversation)
        {
            ctx.yield_output(conversation_payload(&self.conversation));
            return Ok(());
        }

        if let Some(target) = handoff_target {
            self.consecutive_turns = 0;
            ctx.send_to(target, conversation_payload(&self.conversation));
            return Ok(());
        }

        match self.mode {
            HandoffMode::Interactive => self.request_user_input(ctx),
            HandoffMode::Autonomous { turn_budget } => {
                if self.consecutive_turns >= turn_budget {
                    ctx.emit(format!(
                        "turn budget of {turn_budget} exhausted; suspending for input"
                    ));
                    self.request_user_input(ctx);
                } else {
                    ctx.send_to(self.id.clone(), conversation_payload(&self.conversation));
                }
            }
        }
        Ok(())
    }

    /// Append the reply to the conversation, intercepting reserved handoff
    /// tool calls before any real tool execution. The first handoff call
    /// wins; each call is answered with a synthetic tool result so the
    /// transcript stays well-formed for the provider.
    fn absorb_reply(&mut self, reply: AgentReply, ctx: &mut WorkflowContext) -> Option<ExecutorId> {
        let mut handoff_target: Option<ExecutorId> = None;
        for message in reply.messages {
            let mut synthetic_results = Vec::new();
            for call in &message.tool_calls {
                let Some(target) = parse_handoff_target(&call.name) else {
                    continue;
                };
                let result = match &handoff_target {
                    None => {
                        handoff_target = Some(target.clone());
                        format!("transferred to {target}")
                    }
                    Some(first) => {
                        ctx.emit(format!(
                            "ignoring handoff to {target}: already transferring to {first}"
                        ));
                        format!("ignored: already transferring to {first}")
                    }
                };
                synthetic_results.push(ChatMessage::tool_result(call.id.clone(), result));
            }
            self.conversation.push(message);
            self.conversation.extend(synthetic_results);
        }
        handoff_target
    }

    fn request_user_input(&self, ctx: &mut WorkflowContext) {
        let last_assistant = self
            .conversation
            .iter()
            .rev()
            .find(|m| m.author.as_deref() == Some(self.agent.name()))
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let prompt = Payload::new(
            "chat.prompt",
            serde_json::json!({
                "agent": self.agent.name(),
                "message": last_assistant,
            }),
        );
        ctx.request_input(ResponseType::Text, prompt);
    }

    fn user_text(value: Value) -> String {
        match value {
            Value::String(s) => s,
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl Executor for AgentExecutor {
    fn id(&self) -> ExecutorId {
        self.id.clone()
    }

    fn input_tags(&self) -> Vec<TypeTag> {
        vec![TypeTag::new(CONVERSATION_TAG), TypeTag::new(RESPONSE_TAG)]
    }

    fn output_tags(&self) -> Vec<TypeTag> {
        vec![TypeTag::new(CONVERSATION_TAG)]
    }

    async fn handle(
        &mut self,
        message: WorkflowMessage,
        ctx: &mut WorkflowContext,
    ) -> Result<(), ExecutorError> {
        if message.payload.has_tag(RESPONSE_TAG) {
            let response = InputResponse::from_payload(&message.payload)?;
            self.conversation
                .push(ChatMessage::user(Self::user_text(response.value)));
            self.consecutive_turns = 0;
            return self.take_turn(ctx).await;
        }

        let incoming: Vec<ChatMessage> = message.payload.decode()?;
        let from_self = message.source == self.id;
        merge_conversation(&mut self.conversation, incoming, self.dedup);
        if !from_self {
            // A transfer or fresh input starts a new consecutive-turn window.
            self.consecutive_turns = 0;
        }
        self.take_turn(ctx).await
    }

    fn snapshot_state(&self) -> Result<Option<Payload>, ExecutorError> {
        let state = AgentExecutorState {
            conversation: self.conversation.clone(),
            consecutive_turns: self.consecutive_turns,
        };
        Ok(Some(Payload::from_serialize(AGENT_STATE_TAG, &state)?))
    }

    fn restore_state(&mut self, blob: Payload) -> Result<(), ExecutorError> {
        if !blob.has_tag(AGENT_STATE_TAG) {
            return Err(ExecutorError::StateRestore { tag: blob.tag });
        }
        let state: AgentExecutorState = blob.decode()?;
        self.conversation = state.conversation;
        self.consecutive_turns = state.consecutive_turns;
        Ok(())
    }
}

impl std::fmt::Debug for AgentExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentExecutor")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("turns", &self.consecutive_turns)
            .field("conversation_len", &self.conversation.len())
            .finish()
    }
}
