//! The request/response interrupt protocol.
//!
//! An executor may suspend for external input by registering a
//! [`PendingRequest`] through the runner context. The run then settles in
//! `IdleWithPendingRequests` until the caller resumes it with a map of
//! `request id → response value`. Each supplied value is structurally
//! coerced against the request's expected [`ResponseType`]; values that
//! cannot be coerced leave the request pending and are logged rather than
//! failing the run.
//!
//! Accepted responses re-enter the graph as ordinary messages tagged
//! [`RESPONSE_TAG`], carrying an [`InputResponse`] body addressed to the
//! suspended executor; resumption is a normal re-invocation, not a
//! language-level continuation.

use std::collections::BTreeMap;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::message::Payload;
use crate::types::{ExecutorId, RequestId};

/// Tag of the message that delivers a coerced interrupt response back to
/// the executor that asked for it.
pub const RESPONSE_TAG: &str = "io.response";

/// Expected shape of an interrupt response, used for structural coercion.
///
/// `Record` fields are ordered (BTreeMap) so persisted request metadata
/// serializes deterministically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseType {
    Text,
    Integer,
    Float,
    Boolean,
    List { item: Box<ResponseType> },
    Record { fields: BTreeMap<String, ResponseType> },
    /// Any JSON value, passed through untouched.
    Json,
}

impl ResponseType {
    pub fn list(item: ResponseType) -> Self {
        Self::List {
            item: Box::new(item),
        }
    }

    pub fn record(fields: impl IntoIterator<Item = (String, ResponseType)>) -> Self {
        Self::Record {
            fields: fields.into_iter().collect(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List { .. } => "list",
            Self::Record { .. } => "record",
            Self::Json => "json",
        }
    }
}

/// A suspended external-input request, kept in run state (and checkpoints)
/// until a matching response arrives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub executor_id: ExecutorId,
    pub expected: ResponseType,
    /// Human/machine-readable description of what is being asked.
    pub prompt: Payload,
}

/// Why a supplied response value was rejected.
#[derive(Debug, Error, Diagnostic)]
pub enum CoercionError {
    #[error("expected {expected}, found {found}")]
    #[diagnostic(code(treadle::coercion::mismatch))]
    Mismatch {
        expected: &'static str,
        found: String,
    },

    #[error("record is missing required field `{0}`")]
    #[diagnostic(code(treadle::coercion::missing_field))]
    MissingField(String),

    #[error("list item {index}: {source}")]
    #[diagnostic(code(treadle::coercion::item))]
    Item {
        index: usize,
        #[source]
        source: Box<CoercionError>,
    },

    #[error("record field `{field}`: {source}")]
    #[diagnostic(code(treadle::coercion::field))]
    Field {
        field: String,
        #[source]
        source: Box<CoercionError>,
    },
}

fn found_label(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "boolean".to_string(),
        Value::Number(_) => "number".to_string(),
        Value::String(_) => "string".to_string(),
        Value::Array(_) => "list".to_string(),
        Value::Object(_) => "record".to_string(),
    }
}

/// Structurally coerce `value` into the expected shape.
///
/// Primitives accept their native JSON form plus unambiguous string forms
/// (`"42"` for integers, `"true"` for booleans). Lists and records coerce
/// element-wise; record fields not declared in the expected shape pass
/// through unchanged.
pub fn coerce(expected: &ResponseType, value: Value) -> Result<Value, CoercionError> {
    match expected {
        ResponseType::Json => Ok(value),
        ResponseType::Text => match value {
            Value::String(s) => Ok(Value::String(s)),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(CoercionError::Mismatch {
                expected: expected.label(),
                found: found_label(&other),
            }),
        },
        ResponseType::Integer => match &value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(i))
                } else if let Some(f) = n.as_f64()
                    && f.fract() == 0.0
                {
                    Ok(Value::from(f as i64))
                } else {
                    Err(CoercionError::Mismatch {
                        expected: expected.label(),
                        found: "fractional number".to_string(),
                    })
                }
            }
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| {
                CoercionError::Mismatch {
                    expected: expected.label(),
                    found: format!("string `{s}`"),
                }
            }),
            other => Err(CoercionError::Mismatch {
                expected: expected.label(),
                found: found_label(other),
            }),
        },
        ResponseType::Float => match &value {
            Value::Number(n) => Ok(Value::from(n.as_f64().unwrap_or_default())),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| CoercionError::Mismatch {
                    expected: expected.label(),
                    found: format!("string `{s}`"),
                }),
            other => Err(CoercionError::Mismatch {
                expected: expected.label(),
                found: found_label(other),
            }),
        },
        ResponseType::Boolean => match &value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(CoercionError::Mismatch {
                    expected: expected.label(),
                    found: format!("string `{s}`"),
                }),
            },
            other => Err(CoercionError::Mismatch {
                expected: expected.label(),
                found: found_label(other),
            }),
        },
        ResponseType::List { item } => match value {
            Value::Array(items) => {
                let mut coerced = Vec::with_capacity(items.len());
                for (index, entry) in items.into_iter().enumerate() {
                    coerced.push(coerce(item, entry).map_err(|e| CoercionError::Item {
                        index,
                        source: Box::new(e),
                    })?);
                }
                Ok(Value::Array(coerced))
            }
            other => Err(CoercionError::Mismatch {
                expected: expected.label(),
                found: found_label(&other),
            }),
        },
        ResponseType::Record { fields } => match value {
            Value::Object(mut map) => {
                for (field, field_type) in fields {
                    let Some(entry) = map.remove(field) else {
                        return Err(CoercionError::MissingField(field.clone()));
                    };
                    let coerced =
                        coerce(field_type, entry).map_err(|e| CoercionError::Field {
                            field: field.clone(),
                            source: Box::new(e),
                        })?;
                    map.insert(field.clone(), coerced);
                }
                Ok(Value::Object(map))
            }
            other => Err(CoercionError::Mismatch {
                expected: expected.label(),
                found: found_label(&other),
            }),
        },
    }
}

/// Body of the [`RESPONSE_TAG`] message re-injected on resume.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputResponse {
    pub request_id: RequestId,
    pub value: Value,
}

impl InputResponse {
    pub fn into_payload(self) -> Payload {
        Payload::from_serialize(RESPONSE_TAG, &self)
            .expect("InputResponse serialization is infallible")
    }

    pub fn from_payload(payload: &Payload) -> Result<Self, serde_json::Error> {
        payload.decode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn coerces_primitive_strings() {
        assert_eq!(
            coerce(&ResponseType::Integer, json!("42")).unwrap(),
            json!(42)
        );
        assert_eq!(
            coerce(&ResponseType::Boolean, json!("TRUE")).unwrap(),
            json!(true)
        );
        assert_eq!(
            coerce(&ResponseType::Text, json!(7)).unwrap(),
            json!("7")
        );
    }

    #[test]
    fn rejects_fractional_integer() {
        assert!(coerce(&ResponseType::Integer, json!(1.5)).is_err());
        assert_eq!(
            coerce(&ResponseType::Integer, json!(3.0)).unwrap(),
            json!(3)
        );
    }

    #[test]
    fn coerces_nested_shapes() {
        let expected = ResponseType::record([
            ("count".to_string(), ResponseType::Integer),
            (
                "names".to_string(),
                ResponseType::list(ResponseType::Text),
            ),
        ]);
        let coerced = coerce(&expected, json!({"count": "3", "names": ["a", "b"], "extra": 1}))
            .unwrap();
        assert_eq!(coerced, json!({"count": 3, "names": ["a", "b"], "extra": 1}));
    }

    #[test]
    fn missing_record_field_is_rejected() {
        let expected = ResponseType::record([("count".to_string(), ResponseType::Integer)]);
        assert!(matches!(
            coerce(&expected, json!({})),
            Err(CoercionError::MissingField(f)) if f == "count"
        ));
    }

    #[test]
    fn response_payload_round_trip() {
        let response = InputResponse {
            request_id: "req-1".into(),
            value: json!("yes"),
        };
        let payload = response.clone().into_payload();
        assert!(payload.has_tag(RESPONSE_TAG));
        assert_eq!(InputResponse::from_payload(&payload).unwrap(), response);
    }
}
