//! Convenience re-exports for typical usage.
//!
//! ```ignore
//! use tether::prelude::*;
//! ```

pub use crate::actor::{Actor, ActorEvents, ActorObject, ActorRegistry, RegistryConfig, RemoteActor};
pub use crate::codec::Frame;
pub use crate::error::{ActorError, HandlerError, PairError, RemoteError, TransportError};
pub use crate::events::Subscription;
pub use crate::pair::{CallOptions, MethodMap, Pair};
pub use crate::transport::{link, LinkHandle};
pub use crate::args;
