//! The symmetric RPC pair: framing, correlation, timeouts and events.

mod config;
mod core;
mod correlation;
mod methods;
mod waiters;

pub use config::{CallOptions, PairBuilder, DEFAULT_CALL_TIMEOUT, DEFAULT_EMIT_TIMEOUT};
pub use core::{Pair, SendFn};
pub use methods::{handler, HandlerFuture, MethodHandler, MethodMap};
