//! Local actors: the contract a registry serves, and a dynamic record
//! implementation.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use serde_json::Value;

use crate::error::HandlerError;
use crate::events::{EventHub, Subscription};
use crate::pair::{handler, HandlerFuture, MethodHandler};

/// A local actor: an addressable object with methods, readable properties
/// and an optional event capability.
pub trait Actor {
    /// Names of the methods this actor exposes (reported to callers that
    /// name a missing one).
    fn method_names(&self) -> Vec<String>;

    /// Invoke a method. `None` means the actor has no such method.
    ///
    /// Handlers may settle immediately or suspend; either way the reply is
    /// sent when the returned future completes.
    fn invoke(&self, method: &str, params: Vec<Value>) -> Option<HandlerFuture>;

    /// Read a property as-is (it round-trips through JSON on the wire).
    fn property(&self, name: &str) -> Option<Value>;

    /// The actor's event capability, when it has one.
    fn events(&self) -> Option<&ActorEvents> {
        None
    }
}

/// Event capability of a local actor.
///
/// `publish` first feeds any registry taps (so emissions proxy to the peer
/// under a scoped name), then the actor's own subscribers. A tap is never
/// uninstalled, only disabled through its stored flag, so taps installed by
/// other parties are not clobbered.
#[derive(Default)]
pub struct ActorEvents {
    hub: EventHub,
    taps: RefCell<Vec<Tap>>,
}

struct Tap {
    active: Rc<Cell<bool>>,
    observer: Rc<dyn Fn(&str, &[Value])>,
}

impl ActorEvents {
    /// Create an idle event capability.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an event to taps and local subscribers.
    pub fn publish(&self, event: &str, args: &[Value]) {
        let observers: Vec<_> = self
            .taps
            .borrow()
            .iter()
            .filter(|tap| tap.active.get())
            .map(|tap| tap.observer.clone())
            .collect();
        for observer in observers {
            observer(event, args);
        }
        self.hub.emit(event, args);
    }

    /// Subscribe to local emissions of `event`.
    pub fn subscribe(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&[Value]) + 'static,
    ) -> Subscription {
        self.hub.on(event, listener)
    }

    /// Remove a local subscriber.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.hub.off(subscription)
    }

    /// Install an observer over every publish; returns the flag that
    /// disables it.
    pub(crate) fn install_tap(&self, observer: Rc<dyn Fn(&str, &[Value])>) -> Rc<Cell<bool>> {
        let active = Rc::new(Cell::new(true));
        self.taps.borrow_mut().push(Tap {
            active: active.clone(),
            observer,
        });
        active
    }
}

/// A dynamic actor record: method table, property map, event emitter.
///
/// ```ignore
/// let hits = Rc::new(Cell::new(0));
/// let counter = hits.clone();
/// let actor = ActorObject::new()
///     .with_property("name", json!("counter"))
///     .with_method("increment", move |_| {
///         let counter = counter.clone();
///         async move {
///             counter.set(counter.get() + 1);
///             Ok(json!(counter.get()))
///         }
///     });
/// ```
#[derive(Default)]
pub struct ActorObject {
    methods: HashMap<String, MethodHandler>,
    properties: RefCell<HashMap<String, Value>>,
    events: ActorEvents,
}

impl ActorObject {
    /// Create an empty actor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a method handler.
    pub fn with_method<F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + 'static,
    {
        self.methods.insert(name.into(), handler(f));
        self
    }

    /// Add a readable property.
    pub fn with_property(self, name: impl Into<String>, value: Value) -> Self {
        self.properties.borrow_mut().insert(name.into(), value);
        self
    }

    /// Set or replace a property after construction.
    pub fn set_property(&self, name: impl Into<String>, value: Value) {
        self.properties.borrow_mut().insert(name.into(), value);
    }

    /// Publish an event through the actor's event capability.
    pub fn emit(&self, event: &str, args: &[Value]) {
        self.events.publish(event, args);
    }
}

impl Actor for ActorObject {
    fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    fn invoke(&self, method: &str, params: Vec<Value>) -> Option<HandlerFuture> {
        self.methods.get(method).map(|handler| handler(params))
    }

    fn property(&self, name: &str) -> Option<Value> {
        self.properties.borrow().get(name).cloned()
    }

    fn events(&self) -> Option<&ActorEvents> {
        Some(&self.events)
    }
}
