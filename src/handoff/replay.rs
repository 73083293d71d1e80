//! Conversation replay deduplication.
//!
//! When a suspended handoff run resumes, callers may re-send conversation
//! history the agent executor has already seen, anything from the full
//! transcript down to just the new tail. Merging is governed by an explicit
//! policy rather than an implicit heuristic, and messages are compared
//! structurally: role, author, and content, ignoring volatile tool-call
//! ids.

use super::agent::{ChatMessage, ToolCall};
use serde::{Deserialize, Serialize};

/// How an incoming conversation is merged into the cached one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayDedup {
    /// Detect full-transcript replays and already-seen tails by structural
    /// comparison; append only genuinely new messages.
    #[default]
    Structural,
    /// Append everything verbatim. For callers that guarantee they only
    /// ever send deltas.
    AppendAll,
}

/// Structural equality: role, author, content, and tool-call names and
/// arguments. Tool-call ids are provider-volatile and excluded, so a
/// full-text replay compares equal to the previously streamed original.
fn structurally_equal(a: &ChatMessage, b: &ChatMessage) -> bool {
    fn calls_equal(a: &[ToolCall], b: &[ToolCall]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b)
                .all(|(x, y)| x.name == y.name && x.arguments == y.arguments)
    }
    a.role == b.role
        && a.author == b.author
        && a.content == b.content
        && calls_equal(&a.tool_calls, &b.tool_calls)
}

/// Merge `incoming` into `existing` under the given policy. Returns the
/// number of messages actually appended.
pub fn merge_conversation(
    existing: &mut Vec<ChatMessage>,
    incoming: Vec<ChatMessage>,
    policy: ReplayDedup,
) -> usize {
    match policy {
        ReplayDedup::AppendAll => {
            let appended = incoming.len();
            existing.extend(incoming);
            appended
        }
        ReplayDedup::Structural => merge_structural(existing, incoming),
    }
}

fn merge_structural(existing: &mut Vec<ChatMessage>, incoming: Vec<ChatMessage>) -> usize {
    // Full replay: incoming repeats the whole cached transcript as a prefix.
    if incoming.len() >= existing.len()
        && existing
            .iter()
            .zip(&incoming)
            .all(|(a, b)| structurally_equal(a, b))
    {
        let appended = incoming.len() - existing.len();
        existing.extend(incoming.into_iter().skip(existing.len()));
        return appended;
    }

    // Already-seen tail: the cached transcript ends with exactly `incoming`.
    if incoming.len() < existing.len() {
        let offset = existing.len() - incoming.len();
        if existing[offset..]
            .iter()
            .zip(&incoming)
            .all(|(a, b)| structurally_equal(a, b))
        {
            return 0;
        }
    }

    // Divergent delta: treat as genuinely new messages.
    let appended = incoming.len();
    existing.extend(incoming);
    appended
}
