//! Canonical JSON frame shapes and error value normalization.
//!
//! Three frame types travel the wire, discriminated by a `type` tag:
//!
//! ```text
//! {"type":"call",   "id":"a:1", "method":"add", "params":[10,5]}
//! {"type":"notify", "id":"a:2", "event":"hi",   "data":["there"]}
//! {"type":"result", "id":"a:1", "result":15}
//! {"type":"result", "id":"a:1", "error":{"name":"Error","message":"boom"}}
//! {"type":"result", "id":"a:2"}                  // empty acknowledgement
//! ```
//!
//! Errors flowing outbound are rendered by copying `name`, `message` and
//! every extra field of the handler failure; inbound `error` payloads are
//! re-inflated into [`RemoteError`]. A rejection value that is not
//! error-shaped synthesizes `message = "RejectedWithNonError"`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{HandlerError, PairError, RemoteError};

/// Message sent between the two endpoints of a pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frame {
    /// Invoke an exposed method on the peer; expects a correlated result.
    Call {
        /// Correlation id (`"<pair-name>:<n>"`).
        id: String,
        /// Name of the exposed method.
        method: String,
        /// Positional arguments.
        params: Vec<Value>,
    },

    /// Deliver an event to the peer; expects an empty-result acknowledgement.
    Notify {
        /// Correlation id.
        id: String,
        /// Event name.
        event: String,
        /// Event payload.
        data: Vec<Value>,
    },

    /// Settle a previous `call` or `notify`. At most one of `result` and
    /// `error` is present; neither means an empty acknowledgement, and
    /// `null` is a legitimate result.
    Result {
        /// Correlation id copied from the settled frame.
        id: String,
        /// Fulfillment value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// Rejection value (normalized error object).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<Value>,
    },
}

impl Frame {
    /// Correlation id of this frame.
    pub fn id(&self) -> &str {
        match self {
            Frame::Call { id, .. } | Frame::Notify { id, .. } | Frame::Result { id, .. } => id,
        }
    }

    /// Empty-result acknowledgement for the given id.
    pub fn ack(id: impl Into<String>) -> Self {
        Frame::Result {
            id: id.into(),
            result: None,
            error: None,
        }
    }
}

/// Decode an already-parsed JSON value into a frame.
///
/// The `type` tag is inspected first so that unrecognized tags are reported
/// as [`PairError::UnknownMessageType`] rather than a generic shape error.
pub fn decode_frame(message: Value) -> Result<Frame, PairError> {
    let ty = message
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    match ty.as_deref() {
        Some(ty @ ("call" | "notify" | "result")) => {
            let ty = ty.to_string();
            serde_json::from_value(message).map_err(|err| PairError::MalformedFrame {
                ty,
                detail: err.to_string(),
            })
        }
        Some(other) => Err(PairError::UnknownMessageType {
            ty: other.to_string(),
        }),
        None => Err(PairError::UnknownMessageType {
            ty: "<missing>".to_string(),
        }),
    }
}

/// Render a handler failure as the wire error object.
pub fn error_to_wire(err: &HandlerError) -> Value {
    let mut object = Map::new();
    object.insert("name".to_string(), Value::String(err.name.clone()));
    object.insert("message".to_string(), Value::String(err.message.clone()));
    for (key, value) in &err.fields {
        if key != "name" && key != "message" {
            object.insert(key.clone(), value.clone());
        }
    }
    Value::Object(object)
}

/// Re-inflate a wire error payload into a [`RemoteError`].
pub fn remote_error_from_value(value: Value) -> RemoteError {
    match value {
        Value::Object(mut object) => {
            let name = object
                .remove("name")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "Error".to_string());
            let message = object
                .remove("message")
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| "RejectedWithNonError".to_string());
            let stack = object
                .remove("stack")
                .and_then(|v| v.as_str().map(str::to_string));
            RemoteError {
                name,
                message,
                stack,
                fields: object,
            }
        }
        // Not error-shaped at all (string, number, array, …).
        _ => RemoteError {
            name: "Error".to_string(),
            message: "RejectedWithNonError".to_string(),
            stack: None,
            fields: Map::new(),
        },
    }
}
