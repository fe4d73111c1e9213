//! The transport contract, and an in-process transport.
//!
//! A transport owns both directions of one connection:
//!
//! 1. it calls [`Pair::set_send`] exactly once to install the outbound
//!    function, and
//! 2. it invokes [`Pair::incoming`] with each received message, already
//!    decoded to a JSON value.
//!
//! Disconnection replaces the send function with a no-op (in-flight
//! waiters then expire through their timeouts rather than erroring) and
//! detaches whatever tasks the transport was running. Byte-stream
//! transports (see the `tether-stream` crate) additionally frame messages
//! as newline-delimited JSON.
//!
//! [`link`] is the whole-message transport for two pairs living in the same
//! process: each side's send feeds the other side's `incoming` directly.

use crate::codec::Frame;
use crate::error::TransportError;
use crate::pair::Pair;

/// Connect two in-process pairs to each other.
///
/// Frames are delivered synchronously, which makes this the natural
/// transport for tests and same-process wiring.
pub fn link(a: &Pair, b: &Pair) -> LinkHandle {
    install(a, b);
    install(b, a);
    LinkHandle {
        a: a.clone(),
        b: b.clone(),
    }
}

fn install(from: &Pair, to: &Pair) {
    let to = to.clone();
    from.set_send(move |frame: &Frame| {
        let message = serde_json::to_value(frame)
            .map_err(|err| TransportError::Io(err.to_string()))?;
        to.incoming(message);
        Ok(())
    });
}

/// Releases both directions of a [`link`].
#[derive(Debug)]
pub struct LinkHandle {
    a: Pair,
    b: Pair,
}

impl LinkHandle {
    /// Disconnect: both pairs get a no-op send function installed.
    pub fn disconnect(self) {
        self.a.set_send(|_frame| Ok(()));
        self.b.set_send(|_frame| Ok(()));
    }
}
