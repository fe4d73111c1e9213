//! Tether: transport-agnostic RPC between two peers.
//!
//! A [`Pair`] is one endpoint of a full-duplex connection. Both sides are
//! symmetric: each can expose methods, call methods on its partner, emit
//! acknowledged events, and host or address *actors* (stateful objects
//! reachable by a string id that can emit events of their own).
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ Pair ──▶ Frame codec ──▶ transport ═══ wire ═══ transport ──▶ peer Pair
//!             │                                                              │
//!             ├─ methods: name → handler                                     ├─ exposed methods
//!             ├─ waiters: id → oneshot (correlation)                         ├─ local event hub
//!             └─ ActorRegistry (optional overlay)                            └─ ActorRegistry
//! ```
//!
//! The core never touches bytes: a transport installs a send function with
//! [`Pair::set_send`] and feeds decoded JSON values to [`Pair::incoming`].
//! In-process wiring ships here as [`transport::link`]; newline-delimited
//! JSON over byte streams lives in the `tether-stream` crate.
//!
//! # Single-threaded execution
//!
//! Pairs are confined to one logical event loop (`!Send`, `Rc` internals)
//! and drive handler replies with `tokio::task::spawn_local`, so they must
//! run inside a [`tokio::task::LocalSet`] on a current-thread runtime.
//!
//! # Quick start
//!
//! ```ignore
//! use tether::prelude::*;
//!
//! let server = Pair::builder("server")
//!     .on_error(|err| tracing::error!(error = %err, "pair failure"))
//!     .build()?;
//! let client = Pair::builder("client")
//!     .on_error(|err| tracing::error!(error = %err, "pair failure"))
//!     .build()?;
//! let _wire = link(&client, &server);
//!
//! server.expose("add", |params| async move {
//!     let sum: i64 = params.iter().filter_map(|v| v.as_i64()).sum();
//!     Ok(serde_json::json!(sum))
//! });
//!
//! let sum = client.call("add", args![10, 5]).await?;
//! assert_eq!(sum, serde_json::json!(15));
//! ```

pub mod actor;
pub mod codec;
pub mod error;
pub mod events;
#[macro_use]
mod macros;
pub mod pair;
pub mod prelude;
pub mod transport;

pub use actor::{Actor, ActorObject, ActorRegistry, RemoteActor};
pub use error::{ActorError, HandlerError, PairError, RemoteError, TransportError};
pub use pair::{CallOptions, MethodMap, Pair};
pub use transport::link;
