//! Message types transported through workflow edges.
//!
//! A [`Payload`] is a self-describing tagged value: a [`TypeTag`]
//! discriminant plus an arbitrary JSON body. Executors dispatch on the tag
//! alone; the body is decoded by the handler that accepted it. A
//! [`WorkflowMessage`] wraps a payload with its source executor and a
//! delivery target.
//!
//! # Examples
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use treadle::message::{Payload, WorkflowMessage};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Ticket {
//!     subject: String,
//!     severity: u8,
//! }
//!
//! let ticket = Ticket { subject: "login broken".into(), severity: 2 };
//! let payload = Payload::from_serialize("ticket.opened", &ticket).unwrap();
//!
//! let decoded: Ticket = payload.decode().unwrap();
//! assert_eq!(decoded.severity, 2);
//!
//! // Routed through the source's edge groups at drain time.
//! let msg = WorkflowMessage::routed("intake", payload);
//! assert_eq!(msg.source.as_str(), "intake");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::types::{ExecutorId, TypeTag};

/// A tagged, self-describing message body.
///
/// The tag is the dispatch discriminant (see [`TypeTag`]); the value is an
/// opaque JSON document. Payloads are the unit persisted in checkpoints,
/// carried in events, and handed to handlers, so they are always
/// serializable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub tag: TypeTag,
    pub value: Value,
}

impl Payload {
    pub fn new(tag: impl Into<TypeTag>, value: Value) -> Self {
        Self {
            tag: tag.into(),
            value,
        }
    }

    /// Build a payload by serializing a typed body.
    pub fn from_serialize<T: Serialize>(
        tag: impl Into<TypeTag>,
        body: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            tag: tag.into(),
            value: serde_json::to_value(body)?,
        })
    }

    /// Convenience constructor for plain-text payloads, tagged `"text"`.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            tag: TypeTag::new("text"),
            value: Value::String(content.into()),
        }
    }

    /// Decode the body into a typed value.
    ///
    /// Handlers call this after the engine has already matched the tag, so a
    /// decode failure indicates a producer/consumer schema drift and is
    /// worth surfacing as an executor error rather than swallowing.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.value.clone())
    }

    /// Whether this payload carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tag.as_str() == tag
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.tag, self.value)
    }
}

/// Where a message should be delivered.
///
/// `Routed` is the default for executor emissions: the message travels
/// through the source executor's edge groups, which decide the concrete
/// recipients when the pending set is drained. `Executor` and `Broadcast`
/// bypass the static edges; dynamic orchestration layers (handoff) use
/// `Executor` for runtime re-routing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessageTarget {
    Routed,
    Executor { id: ExecutorId },
    Broadcast,
}

/// The unit transported through edges and queued in the runner context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowMessage {
    pub payload: Payload,
    pub source: ExecutorId,
    pub target: MessageTarget,
}

impl WorkflowMessage {
    /// A message routed through the source's edge groups.
    pub fn routed(source: impl Into<ExecutorId>, payload: Payload) -> Self {
        Self {
            payload,
            source: source.into(),
            target: MessageTarget::Routed,
        }
    }

    /// A message addressed directly to a known executor.
    pub fn to(
        source: impl Into<ExecutorId>,
        target: impl Into<ExecutorId>,
        payload: Payload,
    ) -> Self {
        Self {
            payload,
            source: source.into(),
            target: MessageTarget::Executor { id: target.into() },
        }
    }

    /// A message delivered to every executor that handles its tag.
    pub fn broadcast(source: impl Into<ExecutorId>, payload: Payload) -> Self {
        Self {
            payload,
            source: source.into(),
            target: MessageTarget::Broadcast,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip() {
        let payload = Payload::new("ticket.opened", serde_json::json!({"severity": 2}));
        let json = serde_json::to_string(&payload).unwrap();
        let back: Payload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn message_target_shapes() {
        let direct = WorkflowMessage::to("a", "b", Payload::text("hi"));
        assert_eq!(
            direct.target,
            MessageTarget::Executor { id: "b".into() }
        );
        let routed = WorkflowMessage::routed("a", Payload::text("hi"));
        assert_eq!(routed.target, MessageTarget::Routed);
    }
}
