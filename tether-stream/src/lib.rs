//! Byte-stream transport for tether pairs.
//!
//! Frames a pair's JSON messages as newline-delimited JSON over any
//! [`AsyncRead`](tokio::io::AsyncRead) / [`AsyncWrite`](tokio::io::AsyncWrite)
//! duplex: each message is one serialized JSON value followed by `\n`;
//! receivers buffer by newline and carry partial lines across reads. A line
//! that fails to decode is reported on the binding's error channel without
//! tearing the pair down.
//!
//! ```ignore
//! use tether::prelude::*;
//! use tether_stream::tcp;
//!
//! let pair = Pair::builder("client")
//!     .on_error(|err| tracing::error!(error = %err, "pair failure"))
//!     .build()?;
//! let mut handle = tcp::connect(&pair, "127.0.0.1:4500").await?;
//!
//! let sum = pair.call("add", args![10, 5]).await?;
//! ```
//!
//! Like the pairs themselves, bindings spawn their tasks with
//! `tokio::task::spawn_local` and must run inside a
//! [`tokio::task::LocalSet`].

pub mod framing;
mod stream;
pub mod tcp;

pub use framing::{FramingError, LineBuffer, MAX_LINE_LENGTH};
pub use stream::{bind, StreamError, StreamHandle};
