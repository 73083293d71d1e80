//! Handoff orchestration: multi-agent conversations on top of the engine.
//!
//! Agents are executors; the active agent changes at runtime when an agent
//! invokes its reserved `handoff_to_<agent_id>` tool. The call is
//! intercepted before any real tool execution, answered with a synthetic
//! tool result, and translated into a direct routing decision instead of a
//! static edge traversal.
//!
//! Two interaction modes:
//!
//! - **Interactive**: every agent turn suspends for a request/response
//!   external-input cycle.
//! - **Autonomous**: a per-agent consecutive-turn budget allows several
//!   internal supersteps before a suspension is forced.
//!
//! A termination predicate over the full conversation is checked after each
//! turn and ends the run with an output event instead of a new request.

pub mod agent;
pub mod builder;
pub mod executor;
pub mod replay;

pub use agent::{
    AgentError, AgentReply, CONVERSATION_TAG, ChatAgent, ChatMessage, ChatRole,
    HANDOFF_TOOL_PREFIX, ToolCall, conversation_payload, handoff_tool_name, initial_conversation,
    parse_handoff_target,
};
pub use builder::HandoffBuilder;
pub use executor::{AGENT_STATE_TAG, AgentExecutor, HandoffMode, TerminationPredicate};
pub use replay::{ReplayDedup, merge_conversation};
