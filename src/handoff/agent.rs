//! Chat primitives and the external agent seam.
//!
//! The engine never talks to an LLM provider itself. Providers are adapted
//! behind the [`ChatAgent`] trait: given the running conversation, produce
//! the agent's next reply (assistant messages, possibly carrying tool
//! calls). Everything else (routing, turn budgets, suspension) is the
//! orchestration layer's job.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::Payload;
use crate::types::ExecutorId;

/// Payload tag of a conversation travelling between agent executors.
pub const CONVERSATION_TAG: &str = "chat.conversation";

/// Name prefix of the reserved handoff tool. An agent calling
/// `handoff_to_<agent_id>` asks the orchestrator to transfer the
/// conversation to that agent.
pub const HANDOFF_TOOL_PREFIX: &str = "handoff_to_";

/// Reserved tool name encoding a transfer to `target`.
#[must_use]
pub fn handoff_tool_name(target: &ExecutorId) -> String {
    format!("{HANDOFF_TOOL_PREFIX}{target}")
}

/// Extract the target agent id from a reserved handoff tool name.
#[must_use]
pub fn parse_handoff_target(tool_name: &str) -> Option<ExecutorId> {
    tool_name
        .strip_prefix(HANDOFF_TOOL_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(ExecutorId::from)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// One message of a running conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    /// Agent name for assistant messages in multi-agent conversations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on `Tool` messages: the call this result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            author: None,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            author: None,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            author: Some(author.into()),
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            author: None,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    #[must_use]
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

/// An agent's reply for one turn.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub messages: Vec<ChatMessage>,
}

impl AgentReply {
    pub fn say(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::assistant(author, content)],
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum AgentError {
    #[error("provider error ({provider}): {message}")]
    #[diagnostic(code(treadle::handoff::provider))]
    Provider { provider: String, message: String },

    #[error("agent error: {0}")]
    #[diagnostic(code(treadle::handoff::agent))]
    Other(String),
}

/// The external LLM adapter seam.
///
/// Implementations own provider specifics (clients, prompts, tool schemas).
/// The orchestration layer calls [`reply`](Self::reply) once per turn with
/// the full conversation so far.
#[async_trait]
pub trait ChatAgent: Send + Sync {
    fn name(&self) -> &str;

    async fn reply(&mut self, conversation: &[ChatMessage]) -> Result<AgentReply, AgentError>;
}

/// Wrap a conversation for transport between agent executors.
pub fn conversation_payload(conversation: &[ChatMessage]) -> Payload {
    Payload::from_serialize(CONVERSATION_TAG, &conversation)
        .expect("conversation serialization is infallible")
}

/// Initial conversation payload from a single user utterance.
#[must_use]
pub fn initial_conversation(user_text: impl Into<String>) -> Payload {
    conversation_payload(&[ChatMessage::user(user_text)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handoff_tool_names_round_trip() {
        let target: ExecutorId = "billing".into();
        let name = handoff_tool_name(&target);
        assert_eq!(name, "handoff_to_billing");
        assert_eq!(parse_handoff_target(&name), Some(target));
        assert_eq!(parse_handoff_target("handoff_to_"), None);
        assert_eq!(parse_handoff_target("search_web"), None);
    }
}
