//! Error types for the tether RPC layer.

use std::fmt;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;

/// Which kind of frame a pending acknowledgement was waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// A `call` frame awaiting its correlated result.
    Call,
    /// A `notify` frame awaiting its empty-result acknowledgement.
    Notify,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameKind::Call => write!(f, "call"),
            FrameKind::Notify => write!(f, "notify"),
        }
    }
}

/// Errors surfaced by [`Pair`](crate::Pair) operations.
///
/// Per-call failures (timeouts, remote rejections) reject the caller;
/// protocol anomalies (`UnknownMessageType`, `InvalidResult`, malformed
/// frames) are routed to the pair's error sink instead.
#[derive(Debug, Error)]
pub enum PairError {
    /// A pair requires a non-empty name.
    #[error("MissingName: a pair requires a non-empty name")]
    MissingName,

    /// A pair requires an error sink for unrecoverable failures.
    #[error("MissingErrorHandler: a pair requires an error sink")]
    MissingErrorHandler,

    /// No send function has been installed yet.
    #[error("MissingSendFunction: no send function installed on pair `{pair}`")]
    MissingSendFunction {
        /// Name of the pair that tried to send.
        pair: String,
    },

    /// No correlated result arrived within the configured window.
    #[error("TimeoutWaitingForWriteAck<{id},{kind},duration:{}ms>", .duration.as_millis())]
    AckTimeout {
        /// Correlation id of the outbound frame.
        id: String,
        /// Whether a call or a notify was awaiting the ack.
        kind: FrameKind,
        /// The window that elapsed.
        duration: Duration,
    },

    /// The peer rejected the operation; carries the re-inflated error.
    #[error("{0}")]
    Remote(RemoteError),

    /// An inbound message carried an unrecognized `type` tag.
    #[error("unknown message type: {ty}")]
    UnknownMessageType {
        /// The offending tag (or `<missing>`).
        ty: String,
    },

    /// A result frame carried both a result and an error.
    #[error("invalid result frame for id {id}")]
    InvalidResult {
        /// Correlation id of the offending frame.
        id: String,
    },

    /// An inbound message had a known `type` but an invalid shape.
    #[error("malformed {ty} frame: {detail}")]
    MalformedFrame {
        /// The frame's `type` tag.
        ty: String,
        /// Decoder detail.
        detail: String,
    },

    /// The installed send function failed synchronously.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The reply channel was dropped before a result arrived.
    #[error("reply channel closed for id {id}")]
    ReplyDropped {
        /// Correlation id of the abandoned wait.
        id: String,
    },
}

impl PairError {
    /// True when this failure originated on the peer rather than locally.
    pub fn is_remote(&self) -> bool {
        matches!(self, PairError::Remote(_))
    }
}

/// Failures raised by the send function a transport installs on a pair.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport has shut down and will accept no more frames.
    #[error("transport closed")]
    Closed,

    /// The transport failed to hand off the frame.
    #[error("transport i/o error: {0}")]
    Io(String),
}

/// Errors raised by the actor registry overlay.
#[derive(Debug, Error)]
pub enum ActorError {
    /// The id is already bound (or was bound and has since expired).
    #[error("duplicate actor id: {0}")]
    DuplicateId(String),

    /// The id was expired and can no longer be addressed.
    #[error("ActorExpired<{0}>")]
    Expired(String),

    /// No actor appeared under the id within the registration window.
    #[error("ActorRegistrationTimeout<{id},duration:{}ms>", .duration.as_millis())]
    RegistrationTimeout {
        /// The awaited actor id.
        id: String,
        /// The window that elapsed.
        duration: Duration,
    },

    /// The actor method did not settle within the call window.
    #[error("ActorCallTimeout<{id},{method},duration:{}ms>", .duration.as_millis())]
    CallTimeout {
        /// Target actor id.
        id: String,
        /// Invoked method name.
        method: String,
        /// The window that elapsed.
        duration: Duration,
    },

    /// The actor exposes no such method.
    #[error("ActorNoSuchMethod<{method},available:[{}]>", .available.join(","))]
    NoSuchMethod {
        /// The requested method.
        method: String,
        /// Methods the actor does expose.
        available: Vec<String>,
    },

    /// A registry is already attached to this pair.
    #[error("can't expose two registries on node")]
    RegistryAlreadyAttached,

    /// The pair has no attached registry to serve local actors.
    #[error("no actor registry attached to pair `{0}`")]
    NotAttached(String),

    /// The reserved handler was invoked with an unusable parameter list.
    #[error("InvalidActorCall: {0}")]
    InvalidCall(String),
}

impl ActorError {
    /// Wire-level error name for this failure.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ActorError::DuplicateId(_) => "DuplicateActorId",
            ActorError::Expired(_) => "ActorExpired",
            ActorError::RegistrationTimeout { .. } => "ActorRegistrationTimeout",
            ActorError::CallTimeout { .. } => "ActorCallTimeout",
            ActorError::NoSuchMethod { .. } => "ActorNoSuchMethod",
            ActorError::RegistryAlreadyAttached => "RegistryAlreadyAttached",
            ActorError::NotAttached(_) => "NoActorRegistry",
            ActorError::InvalidCall(_) => "InvalidActorCall",
        }
    }
}

/// What an exposed method handler rejects with.
///
/// Travels the wire as `{name, message, …fields}` and is re-inflated on the
/// caller's side as a [`RemoteError`].
#[derive(Debug, Clone)]
pub struct HandlerError {
    /// Error class name (`"Error"` when unspecified).
    pub name: String,
    /// Human-readable message.
    pub message: String,
    /// Additional fields serialized alongside name and message.
    pub fields: Map<String, Value>,
}

impl HandlerError {
    /// Create an error with an explicit class name.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            fields: Map::new(),
        }
    }

    /// Create a plain error (`name = "Error"`).
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    /// Attach an extra field carried to the caller.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// The error sent back when a `call` names an unexposed method.
    pub(crate) fn no_such_method(method: &str, params: &[Value]) -> Self {
        Self::new("NoSuchMethod", format!("NoSuchMethod<{method}>"))
            .with_field("method", Value::String(method.to_string()))
            .with_field("params", Value::Array(params.to_vec()))
    }
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::msg(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::msg(message)
    }
}

impl From<ActorError> for HandlerError {
    fn from(err: ActorError) -> Self {
        HandlerError::new(err.kind(), err.to_string())
    }
}

/// A failure that originated on the peer, re-inflated from the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    /// Error class name reported by the peer.
    pub name: String,
    /// Message reported by the peer (`"RejectedWithNonError"` when the
    /// rejection value was not error-shaped).
    pub message: String,
    /// Peer-side stack trace, when one was attached.
    pub stack: Option<String>,
    /// Remaining fields of the wire error object.
    pub fields: Map<String, Value>,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}
