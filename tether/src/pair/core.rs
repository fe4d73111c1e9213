//! The symmetric RPC endpoint.
//!
//! A [`Pair`] is one side of a full-duplex connection. It can expose
//! methods, call methods on its peer, emit acknowledged events, and receive
//! events on a local hub. Outbound frames carry process-unique correlation
//! ids; inbound results settle the matching waiter regardless of arrival
//! order.
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │ Pair                                 │
//! │                                      │
//! │  methods:  name → handler            │
//! │  waiters:  id   → oneshot sender     │
//! │  events:   EventHub (peer notifies)  │
//! │  send:     installed by a transport  │
//! └──────────────────────────────────────┘
//! ```
//!
//! # Single-threaded design
//!
//! A pair is confined to one logical event loop: interior state uses
//! `Rc<RefCell<…>>`, handler replies are driven with
//! `tokio::task::spawn_local`, and the type is `!Send`. Run pairs inside a
//! [`tokio::task::LocalSet`] (or a current-thread local runtime).

use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::actor::ActorRegistry;
use crate::codec::{self, Frame};
use crate::error::{ActorError, FrameKind, HandlerError, PairError, TransportError};
use crate::events::{EventHub, Subscription};
use crate::pair::config::{CallOptions, PairBuilder};
use crate::pair::correlation::next_correlation_id;
use crate::pair::methods::{handler, MethodHandler, MethodMap};
use crate::pair::waiters::WaiterTable;

/// Sink receiving failures that belong to no particular caller.
pub(crate) type ErrorSink = Rc<dyn Fn(PairError)>;

/// Wrapper around inbound-notification delivery (change-detection seam).
pub(crate) type EffectWrapper = Rc<dyn Fn(&mut dyn FnMut())>;

/// The outbound function a transport installs on a pair.
pub type SendFn = dyn Fn(&Frame) -> Result<(), TransportError>;

/// One endpoint of an RPC connection; symmetric in role.
///
/// Cloning is cheap and yields a handle to the same endpoint.
#[derive(Clone)]
pub struct Pair {
    inner: Rc<PairInner>,
}

struct PairInner {
    name: String,
    timeout: Duration,
    emit_timeout: Duration,
    error_sink: ErrorSink,
    wrap_effects: EffectWrapper,
    send: RefCell<Option<Rc<SendFn>>>,
    methods: RefCell<HashMap<String, MethodHandler>>,
    events: EventHub,
    waiters: WaiterTable,
    registry: RefCell<Option<ActorRegistry>>,
}

impl Pair {
    /// Start building a pair with the given name.
    pub fn builder(name: impl Into<String>) -> PairBuilder {
        PairBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        timeout: Duration,
        emit_timeout: Duration,
        error_sink: ErrorSink,
        wrap_effects: EffectWrapper,
    ) -> Self {
        Self {
            inner: Rc::new(PairInner {
                name,
                timeout,
                emit_timeout,
                error_sink,
                wrap_effects,
                send: RefCell::new(None),
                methods: RefCell::new(HashMap::new()),
                events: EventHub::new(),
                waiters: WaiterTable::new(),
                registry: RefCell::new(None),
            }),
        }
    }

    /// This endpoint's name (prefixes its correlation ids).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Default result window for `call`.
    pub fn call_timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Default acknowledgement window for `emit`.
    pub fn emit_timeout(&self) -> Duration {
        self.inner.emit_timeout
    }

    /// Number of outbound frames currently awaiting a result.
    pub fn pending_count(&self) -> usize {
        self.inner.waiters.pending_count()
    }

    // ------------------------------------------------------------------
    // Transport surface
    // ------------------------------------------------------------------

    /// Install or replace the outbound send function.
    ///
    /// Transports call this once per connection. Replacing the function
    /// does not cancel in-flight waiters: a new channel may deliver results
    /// for ids created under the old one (best-effort reconnect).
    pub fn set_send(&self, send: impl Fn(&Frame) -> Result<(), TransportError> + 'static) {
        *self.inner.send.borrow_mut() = Some(Rc::new(send));
    }

    /// Entry point for transports: dispatch one received, already-parsed
    /// message. Never suspends.
    pub fn incoming(&self, message: Value) {
        match codec::decode_frame(message) {
            Ok(Frame::Call { id, method, params }) => self.handle_call(id, method, params),
            Ok(Frame::Notify { id, event, data }) => self.handle_notify(id, event, data),
            Ok(Frame::Result { id, result, error }) => self.handle_result(id, result, error),
            Err(err) => self.report(err),
        }
    }

    // ------------------------------------------------------------------
    // Exposing methods
    // ------------------------------------------------------------------

    /// Register a method handler. Re-registering a name overwrites.
    pub fn expose<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + 'static,
    {
        self.inner.methods.borrow_mut().insert(name.into(), handler(f));
    }

    /// Register a batch of handlers.
    pub fn expose_all(&self, methods: MethodMap) {
        self.inner.methods.borrow_mut().extend(methods.into_entries());
    }

    // ------------------------------------------------------------------
    // Calling the peer
    // ------------------------------------------------------------------

    /// Call an exposed method on the peer and await its result.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, PairError> {
        self.call_with(CallOptions::default(), method, params).await
    }

    /// [`call`](Self::call) with per-operation overrides.
    pub async fn call_with(
        &self,
        options: CallOptions,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, PairError> {
        let id = next_correlation_id(&self.inner.name);
        let window = options.timeout.unwrap_or(self.inner.timeout);
        tracing::debug!(
            pair = %self.inner.name,
            id = %id,
            method = %method,
            "sending call"
        );
        let frame = Frame::Call {
            id: id.clone(),
            method: method.to_string(),
            params,
        };
        self.roundtrip(id, FrameKind::Call, frame, window).await
    }

    /// Emit an event to the peer and await its acknowledgement.
    ///
    /// The ack confirms the peer received the event; it is sent before the
    /// peer's listeners run, so it reflects transport latency only.
    pub async fn emit(&self, event: &str, data: Vec<Value>) -> Result<(), PairError> {
        self.emit_with(CallOptions::default(), event, data).await
    }

    /// [`emit`](Self::emit) with per-operation overrides.
    pub async fn emit_with(
        &self,
        options: CallOptions,
        event: &str,
        data: Vec<Value>,
    ) -> Result<(), PairError> {
        let id = next_correlation_id(&self.inner.name);
        let window = options.timeout.unwrap_or(self.inner.emit_timeout);
        tracing::debug!(
            pair = %self.inner.name,
            id = %id,
            event = %event,
            "sending notify"
        );
        let frame = Frame::Notify {
            id: id.clone(),
            event: event.to_string(),
            data,
        };
        self.roundtrip(id, FrameKind::Notify, frame, window).await?;
        Ok(())
    }

    /// Register the waiter, send, then race the waiter against the window.
    ///
    /// The shared primitive behind `call` and `emit`. On expiry the waiter
    /// is abandoned; the peer's eventual result is dropped silently.
    async fn roundtrip(
        &self,
        id: String,
        kind: FrameKind,
        frame: Frame,
        window: Duration,
    ) -> Result<Value, PairError> {
        let rx = self.inner.waiters.register(&id);

        if let Err(err) = self.send_frame(&frame) {
            self.inner.waiters.abandon(&id);
            return Err(err);
        }

        match tokio::time::timeout(window, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(remote))) => Err(PairError::Remote(remote)),
            Ok(Err(_closed)) => Err(PairError::ReplyDropped { id }),
            Err(_elapsed) => {
                self.inner.waiters.abandon(&id);
                tracing::debug!(
                    pair = %self.inner.name,
                    id = %id,
                    kind = %kind,
                    "timed out waiting for result"
                );
                Err(PairError::AckTimeout {
                    id,
                    kind,
                    duration: window,
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Local events (peer notifications)
    // ------------------------------------------------------------------

    /// Subscribe to an event delivered by the peer.
    pub fn on(&self, event: impl Into<String>, listener: impl Fn(&[Value]) + 'static) -> Subscription {
        self.inner.events.on(event, listener)
    }

    /// Subscribe to the next delivery of an event only.
    pub fn once(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&[Value]) + 'static,
    ) -> Subscription {
        self.inner.events.once(event, listener)
    }

    /// Remove a listener.
    pub fn off(&self, subscription: &Subscription) {
        self.inner.events.off(subscription)
    }

    // ------------------------------------------------------------------
    // Inbound dispatch
    // ------------------------------------------------------------------

    fn handle_call(&self, id: String, method: String, params: Vec<Value>) {
        let handler = self.inner.methods.borrow().get(&method).cloned();
        match handler {
            Some(handler) => {
                tracing::debug!(
                    pair = %self.inner.name,
                    id = %id,
                    method = %method,
                    "dispatching call"
                );
                let future = handler(params);
                let pair = self.clone();
                tokio::task::spawn_local(async move {
                    match future.await {
                        Ok(value) => pair.send_result(&id, value),
                        Err(err) => pair.send_error(&id, &err),
                    }
                });
            }
            None => {
                tracing::debug!(
                    pair = %self.inner.name,
                    id = %id,
                    method = %method,
                    "call names an unexposed method"
                );
                self.send_error(&id, &HandlerError::no_such_method(&method, &params));
            }
        }
    }

    fn handle_notify(&self, id: String, event: String, data: Vec<Value>) {
        // Ack before local delivery: a slow listener must not delay the
        // emitter's confirmation.
        if let Err(err) = self.send_frame(&Frame::ack(id)) {
            self.report(err);
        }

        let events = &self.inner.events;
        let mut deliver = || events.emit(&event, &data);
        (self.inner.wrap_effects)(&mut deliver);
    }

    fn handle_result(&self, id: String, result: Option<Value>, error: Option<Value>) {
        if result.is_some() && error.is_some() {
            self.report(PairError::InvalidResult { id });
            return;
        }

        let outcome = match error {
            Some(value) => Err(codec::remote_error_from_value(value)),
            None => Ok(result.unwrap_or(Value::Null)),
        };

        if !self.inner.waiters.complete(&id, outcome) {
            tracing::debug!(
                pair = %self.inner.name,
                id = %id,
                "result for unknown correlation id, dropping"
            );
        }
    }

    // ------------------------------------------------------------------
    // Outbound plumbing
    // ------------------------------------------------------------------

    fn send_frame(&self, frame: &Frame) -> Result<(), PairError> {
        let send = self.inner.send.borrow().clone();
        match send {
            Some(send) => send(frame).map_err(PairError::from),
            None => Err(PairError::MissingSendFunction {
                pair: self.inner.name.clone(),
            }),
        }
    }

    /// Reply to a settled call. Send failures go to the error sink; there
    /// is no caller left to reject.
    fn send_result(&self, id: &str, value: Value) {
        let frame = Frame::Result {
            id: id.to_string(),
            result: Some(value),
            error: None,
        };
        if let Err(err) = self.send_frame(&frame) {
            self.report(err);
        }
    }

    fn send_error(&self, id: &str, error: &HandlerError) {
        let frame = Frame::Result {
            id: id.to_string(),
            result: None,
            error: Some(codec::error_to_wire(error)),
        };
        if let Err(err) = self.send_frame(&frame) {
            self.report(err);
        }
    }

    /// Route a failure to the injected error sink.
    pub(crate) fn report(&self, err: PairError) {
        (self.inner.error_sink)(err);
    }

    // ------------------------------------------------------------------
    // Registry slot
    // ------------------------------------------------------------------

    pub(crate) fn attach_registry(&self, registry: ActorRegistry) -> Result<(), ActorError> {
        let mut slot = self.inner.registry.borrow_mut();
        if slot.is_some() {
            return Err(ActorError::RegistryAlreadyAttached);
        }
        *slot = Some(registry);
        Ok(())
    }

    pub(crate) fn registry(&self) -> Option<ActorRegistry> {
        self.inner.registry.borrow().clone()
    }
}

impl std::fmt::Debug for Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pair")
            .field("name", &self.inner.name)
            .field("pending", &self.inner.waiters.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    fn test_pair(name: &str) -> (Pair, Rc<RefCell<Vec<PairError>>>) {
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        let pair = Pair::builder(name)
            .on_error(move |err| sink.borrow_mut().push(err))
            .build()
            .expect("valid pair config");
        (pair, errors)
    }

    fn capture_outbound(pair: &Pair) -> Rc<RefCell<Vec<Value>>> {
        let frames = Rc::new(RefCell::new(Vec::new()));
        let sink = frames.clone();
        pair.set_send(move |frame| {
            let value = serde_json::to_value(frame).expect("frame serializes");
            sink.borrow_mut().push(value);
            Ok(())
        });
        frames
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_call_frame_without_send_function_fails() {
        let (pair, _errors) = test_pair("alpha");
        let err = pair
            .call("ping", vec![])
            .await
            .expect_err("no send function installed");
        assert!(matches!(err, PairError::MissingSendFunction { .. }));
    }

    #[tokio::test]
    async fn test_incoming_call_replies_with_result() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let (pair, errors) = test_pair("server");
                let frames = capture_outbound(&pair);

                pair.expose("add", |params| async move {
                    let sum: i64 = params.iter().filter_map(Value::as_i64).sum();
                    Ok(json!(sum))
                });

                pair.incoming(json!({
                    "type": "call", "id": "peer:1", "method": "add", "params": [10, 5]
                }));
                settle().await;

                assert_eq!(
                    frames.borrow().as_slice(),
                    &[json!({"type": "result", "id": "peer:1", "result": 15})]
                );
                assert!(errors.borrow().is_empty());
            })
            .await;
    }

    #[tokio::test]
    async fn test_incoming_call_unknown_method_replies_no_such_method() {
        let (pair, _errors) = test_pair("server");
        let frames = capture_outbound(&pair);

        pair.incoming(json!({
            "type": "call", "id": "peer:2", "method": "nope", "params": [1]
        }));

        let frames = frames.borrow();
        assert_eq!(frames.len(), 1);
        let error = &frames[0]["error"];
        assert_eq!(error["name"], json!("NoSuchMethod"));
        assert_eq!(error["method"], json!("nope"));
        assert_eq!(error["params"], json!([1]));
    }

    #[tokio::test]
    async fn test_notify_acks_before_delivering_to_listeners() {
        let (pair, _errors) = test_pair("server");
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = order.clone();
        pair.set_send(move |frame| {
            if matches!(frame, Frame::Result { .. }) {
                log.borrow_mut().push("ack");
            }
            Ok(())
        });
        let log = order.clone();
        pair.on("hi", move |_| log.borrow_mut().push("listener"));

        pair.incoming(json!({
            "type": "notify", "id": "peer:3", "event": "hi", "data": ["there"]
        }));

        assert_eq!(order.borrow().as_slice(), &["ack", "listener"]);
    }

    #[tokio::test]
    async fn test_wrap_effects_runs_around_notify_delivery() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = order.clone();
        let pair = Pair::builder("server")
            .on_error(|_| {})
            .wrap_effects(move |deliver| {
                log.borrow_mut().push("before");
                deliver();
                log.borrow_mut().push("after");
            })
            .build()
            .expect("valid pair config");
        pair.set_send(|_| Ok(()));

        let log = order.clone();
        pair.on("hi", move |_| log.borrow_mut().push("listener"));

        pair.incoming(json!({"type": "notify", "id": "x:1", "event": "hi", "data": []}));

        assert_eq!(order.borrow().as_slice(), &["before", "listener", "after"]);
    }

    #[tokio::test]
    async fn test_unknown_message_type_goes_to_error_sink() {
        let (pair, errors) = test_pair("server");
        pair.set_send(|_| Ok(()));

        pair.incoming(json!({"type": "frobnicate", "id": "x:1"}));

        let errors = errors.borrow();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            PairError::UnknownMessageType { ty } if ty == "frobnicate"
        ));
    }

    #[tokio::test]
    async fn test_result_with_both_fields_goes_to_error_sink() {
        let (pair, errors) = test_pair("server");
        pair.set_send(|_| Ok(()));

        pair.incoming(json!({
            "type": "result", "id": "x:1", "result": 1, "error": {"message": "boom"}
        }));

        assert!(matches!(&errors.borrow()[0], PairError::InvalidResult { .. }));
    }

    #[tokio::test]
    async fn test_reply_send_failure_goes_to_error_sink() {
        let (pair, errors) = test_pair("server");
        pair.set_send(|_| Err(TransportError::Closed));

        pair.incoming(json!({"type": "notify", "id": "x:1", "event": "hi", "data": []}));

        assert!(matches!(&errors.borrow()[0], PairError::Transport(_)));
    }

    #[tokio::test]
    async fn test_expose_overwrites_previous_handler() {
        tokio::task::LocalSet::new()
            .run_until(async {
                let (pair, _errors) = test_pair("server");
                let frames = capture_outbound(&pair);

                pair.expose("f", |_| async { Ok(json!("old")) });
                pair.expose("f", |_| async { Ok(json!("new")) });

                pair.incoming(json!({"type": "call", "id": "p:1", "method": "f", "params": []}));
                settle().await;

                assert_eq!(frames.borrow()[0]["result"], json!("new"));
            })
            .await;
    }
}
