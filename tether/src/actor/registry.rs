//! The actor registry overlay.
//!
//! A registry attaches to exactly one [`Pair`] and serves two reserved
//! methods on it: [`CALL_ACTOR`] invokes a method on a local actor and
//! [`GET_ACTOR_PROPERTY`] reads one of its properties. Actors are resolved
//! late: a call arriving before `expose_actor` waits for the registration
//! (bounded by [`RegistryConfig::registration_timeout`]) instead of failing
//! outright.
//!
//! Actor emissions are proxied onto the owning pair under the scoped name
//! `remote:<id>:<event>`, so they never collide with plain pair events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use serde_json::Value;

use crate::actor::local::Actor;
use crate::actor::scoped_event_name;
use crate::error::{ActorError, HandlerError};
use crate::events::EventHub;
use crate::pair::Pair;

/// Reserved method name for invoking an actor method on the peer.
pub const CALL_ACTOR: &str = "callActor";

/// Reserved method name for reading an actor property on the peer.
///
/// Deliberately shaped to be unlikely to collide with user methods; when a
/// registry attaches, it overwrites any user exposure of either reserved
/// name.
pub const GET_ACTOR_PROPERTY: &str = "-getActorProperty-";

/// Timeouts governing the registry's two bounded waits.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long an inbound actor call waits for the actor to register.
    pub registration_timeout: Duration,
    /// How long an actor method may run before the caller is rejected.
    pub call_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            registration_timeout: Duration::from_millis(500),
            call_timeout: Duration::from_millis(500),
        }
    }
}

enum Slot {
    Active(Rc<dyn Actor>),
    Expired,
}

enum Lookup {
    Active(Rc<dyn Actor>),
    Expired,
    Missing,
}

/// Maps actor ids to local actors and proxies their events to the peer.
///
/// Cloning yields a handle to the same registry.
#[derive(Clone, Default)]
pub struct ActorRegistry {
    inner: Rc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    config: RegistryConfig,
    slots: RefCell<HashMap<String, Slot>>,
    /// Fires `register:<id>` / `deregister:<id>` on slot transitions.
    transitions: EventHub,
    /// Disable flags of the event taps installed on exposed actors.
    taps: RefCell<HashMap<String, Rc<Cell<bool>>>>,
    pair: RefCell<Option<Pair>>,
}

impl ActorRegistry {
    /// Create a registry with default timeouts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with explicit timeouts.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                config,
                ..RegistryInner::default()
            }),
        }
    }

    /// Attach this registry to a pair, installing the reserved method
    /// handlers. At most one registry may attach to a pair.
    pub fn attach(&self, pair: &Pair) -> Result<(), ActorError> {
        pair.attach_registry(self.clone())?;
        *self.inner.pair.borrow_mut() = Some(pair.clone());

        let registry = self.clone();
        pair.expose(CALL_ACTOR, move |params| {
            let registry = registry.clone();
            async move { registry.handle_call_actor(params).await }
        });

        let registry = self.clone();
        pair.expose(GET_ACTOR_PROPERTY, move |params| {
            let registry = registry.clone();
            async move { registry.handle_get_property(params).await }
        });

        tracing::debug!(pair = %pair.name(), "actor registry attached");
        Ok(())
    }

    /// Bind an actor to an id.
    ///
    /// Duplicate ids are refused, including ids that were bound once and
    /// have since expired. Registration wakes any caller blocked on this
    /// id, and instruments the actor's event capability so emissions reach
    /// the peer.
    pub fn expose_actor(&self, id: &str, actor: Rc<dyn Actor>) -> Result<(), ActorError> {
        {
            let mut slots = self.inner.slots.borrow_mut();
            if slots.contains_key(id) {
                return Err(ActorError::DuplicateId(id.to_string()));
            }
            slots.insert(id.to_string(), Slot::Active(actor.clone()));
        }

        if let Some(events) = actor.events() {
            let registry = self.clone();
            let actor_id = id.to_string();
            let flag = events.install_tap(Rc::new(move |event, args| {
                registry.proxy_event(&actor_id, event, args)
            }));
            self.inner.taps.borrow_mut().insert(id.to_string(), flag);
        }

        tracing::debug!(actor = %id, "actor registered");
        self.inner.transitions.emit(&format!("register:{id}"), &[]);
        Ok(())
    }

    /// Expire an id. The slot keeps an expired sentinel for the registry's
    /// lifetime, so the id can never be re-bound; the actor's event tap is
    /// disabled in place.
    pub fn expire_actor(&self, id: &str) {
        self.inner
            .slots
            .borrow_mut()
            .insert(id.to_string(), Slot::Expired);
        if let Some(flag) = self.inner.taps.borrow_mut().remove(id) {
            flag.set(false);
        }
        tracing::debug!(actor = %id, "actor expired");
        self.inner.transitions.emit(&format!("deregister:{id}"), &[]);
    }

    /// The actor currently bound to `id`, if any.
    pub fn local_actor(&self, id: &str) -> Option<Rc<dyn Actor>> {
        match self.lookup(id) {
            Lookup::Active(actor) => Some(actor),
            _ => None,
        }
    }

    fn lookup(&self, id: &str) -> Lookup {
        match self.inner.slots.borrow().get(id) {
            Some(Slot::Active(actor)) => Lookup::Active(actor.clone()),
            Some(Slot::Expired) => Lookup::Expired,
            None => Lookup::Missing,
        }
    }

    /// Resolve `id`, waiting up to the registration timeout for a late
    /// `expose_actor`.
    async fn wait_for_actor(&self, id: &str) -> Result<Rc<dyn Actor>, ActorError> {
        match self.lookup(id) {
            Lookup::Active(actor) => return Ok(actor),
            Lookup::Expired => return Err(ActorError::Expired(id.to_string())),
            Lookup::Missing => {}
        }

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let tx = Cell::new(Some(tx));
        let subscription = self.inner.transitions.once(format!("register:{id}"), move |_| {
            if let Some(tx) = tx.take() {
                let _ = tx.send(());
            }
        });

        let window = self.inner.config.registration_timeout;
        match tokio::time::timeout(window, rx).await {
            Ok(Ok(())) => match self.lookup(id) {
                Lookup::Active(actor) => Ok(actor),
                Lookup::Expired => Err(ActorError::Expired(id.to_string())),
                Lookup::Missing => Err(ActorError::RegistrationTimeout {
                    id: id.to_string(),
                    duration: window,
                }),
            },
            _ => {
                self.inner.transitions.off(&subscription);
                Err(ActorError::RegistrationTimeout {
                    id: id.to_string(),
                    duration: window,
                })
            }
        }
    }

    /// Server side of the `callActor` reserved method: `(id, method, …args)`.
    async fn handle_call_actor(&self, params: Vec<Value>) -> Result<Value, HandlerError> {
        let mut params = params.into_iter();
        let id = match params.next() {
            Some(Value::String(id)) => id,
            _ => {
                return Err(ActorError::InvalidCall(
                    "callActor expects (id, method, ..args)".to_string(),
                )
                .into());
            }
        };
        let method = match params.next() {
            Some(Value::String(method)) => method,
            _ => {
                return Err(ActorError::InvalidCall(
                    "callActor expects (id, method, ..args)".to_string(),
                )
                .into());
            }
        };
        let args: Vec<Value> = params.collect();

        let actor = self.wait_for_actor(&id).await.map_err(HandlerError::from)?;

        let future = actor.invoke(&method, args).ok_or_else(|| {
            HandlerError::from(ActorError::NoSuchMethod {
                method: method.clone(),
                available: actor.method_names(),
            })
        })?;

        let window = self.inner.config.call_timeout;
        match tokio::time::timeout(window, future).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ActorError::CallTimeout {
                id,
                method,
                duration: window,
            }
            .into()),
        }
    }

    /// Server side of the property read: `(id, name)`.
    async fn handle_get_property(&self, params: Vec<Value>) -> Result<Value, HandlerError> {
        let mut params = params.into_iter();
        let (id, name) = match (params.next(), params.next()) {
            (Some(Value::String(id)), Some(Value::String(name))) => (id, name),
            _ => {
                return Err(ActorError::InvalidCall(
                    "property read expects (id, name)".to_string(),
                )
                .into());
            }
        };

        let actor = self.wait_for_actor(&id).await.map_err(HandlerError::from)?;
        Ok(actor.property(&name).unwrap_or(Value::Null))
    }

    /// Re-emit an actor event on the owning pair under its scoped name.
    fn proxy_event(&self, id: &str, event: &str, args: &[Value]) {
        let pair = match self.inner.pair.borrow().clone() {
            Some(pair) => pair,
            None => return,
        };
        let scoped = scoped_event_name(id, event);
        let data = args.to_vec();
        tracing::debug!(actor = %id, event = %event, scoped = %scoped, "proxying actor event");
        tokio::task::spawn_local(async move {
            // Ack failures have no caller to reject; they go to the sink.
            if let Err(err) = pair.emit(&scoped, data).await {
                pair.report(err);
            }
        });
    }
}

impl Pair {
    /// Bind an actor to an id on this pair's attached registry.
    pub fn expose_actor(&self, id: &str, actor: Rc<dyn Actor>) -> Result<(), ActorError> {
        match self.registry() {
            Some(registry) => registry.expose_actor(id, actor),
            None => Err(ActorError::NotAttached(self.name().to_string())),
        }
    }

    /// Expire an actor id on this pair's attached registry.
    pub fn expire_actor(&self, id: &str) -> Result<(), ActorError> {
        match self.registry() {
            Some(registry) => {
                registry.expire_actor(id);
                Ok(())
            }
            None => Err(ActorError::NotAttached(self.name().to_string())),
        }
    }

    /// The local actor bound to `id`, if a registry is attached and the id
    /// is live.
    pub fn local_actor(&self, id: &str) -> Option<Rc<dyn Actor>> {
        self.registry().and_then(|registry| registry.local_actor(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorObject;
    use serde_json::json;

    fn test_actor() -> Rc<dyn Actor> {
        Rc::new(ActorObject::new().with_method("ping", |_| async { Ok(json!("pong")) }))
    }

    #[test]
    fn test_duplicate_registration_refused() {
        let registry = ActorRegistry::new();
        registry
            .expose_actor("a-1", test_actor())
            .expect("first registration succeeds");

        let err = registry
            .expose_actor("a-1", test_actor())
            .expect_err("second registration is a duplicate");
        assert!(matches!(err, ActorError::DuplicateId(id) if id == "a-1"));
    }

    #[test]
    fn test_expired_id_cannot_be_rebound() {
        let registry = ActorRegistry::new();
        registry
            .expose_actor("a-1", test_actor())
            .expect("registration succeeds");
        registry.expire_actor("a-1");

        assert!(registry.local_actor("a-1").is_none());
        let err = registry
            .expose_actor("a-1", test_actor())
            .expect_err("expired slot stays occupied");
        assert!(matches!(err, ActorError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn test_wait_for_actor_times_out_for_unknown_id() {
        let registry = ActorRegistry::with_config(RegistryConfig {
            registration_timeout: Duration::from_millis(20),
            call_timeout: Duration::from_millis(500),
        });

        let err = match registry.wait_for_actor("ghost").await {
            Ok(_) => panic!("nothing ever registers"),
            Err(e) => e,
        };
        assert!(matches!(err, ActorError::RegistrationTimeout { .. }));
        assert!(err.to_string().contains("Timeout"));
    }

    #[tokio::test]
    async fn test_wait_for_actor_resolves_on_late_registration() {
        let registry = ActorRegistry::new();

        let late = registry.clone();
        let register = async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            late.expose_actor("late-1", test_actor())
                .expect("registration succeeds");
        };

        let (waited, ()) = tokio::join!(registry.wait_for_actor("late-1"), register);
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn test_expired_id_rejects_waiters() {
        let registry = ActorRegistry::new();
        registry
            .expose_actor("a-1", test_actor())
            .expect("registration succeeds");
        registry.expire_actor("a-1");

        let err = match registry.wait_for_actor("a-1").await {
            Ok(_) => panic!("expired id is unreachable"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("Expired"));
    }

    #[tokio::test]
    async fn test_call_actor_reports_available_methods() {
        let registry = ActorRegistry::new();
        let actor = Rc::new(
            ActorObject::new()
                .with_method("increment", |_| async { Ok(json!(1)) })
                .with_method("reset", |_| async { Ok(Value::Null) }),
        );
        registry
            .expose_actor("counter", actor)
            .expect("registration succeeds");

        let err = registry
            .handle_call_actor(vec![json!("counter"), json!("blah")])
            .await
            .expect_err("no such method");
        assert!(err.message.contains("NoSuchMethod"));
        assert_eq!(err.name, "ActorNoSuchMethod");
        assert!(err.message.contains("increment,reset"));
    }

    #[tokio::test]
    async fn test_call_actor_bounds_method_runtime() {
        let registry = ActorRegistry::with_config(RegistryConfig {
            registration_timeout: Duration::from_millis(500),
            call_timeout: Duration::from_millis(20),
        });
        let actor = Rc::new(ActorObject::new().with_method("slow", |_| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(Value::Null)
        }));
        registry
            .expose_actor("sloth", actor)
            .expect("registration succeeds");

        let err = registry
            .handle_call_actor(vec![json!("sloth"), json!("slow")])
            .await
            .expect_err("method overruns its window");
        assert_eq!(err.name, "ActorCallTimeout");
        assert!(err.message.contains("Timeout"));
    }

    #[tokio::test]
    async fn test_get_property_round_trips_values() {
        let registry = ActorRegistry::new();
        let actor = Rc::new(ActorObject::new().with_property("name", json!("I am an ACTOR")));
        registry
            .expose_actor("a-1", actor)
            .expect("registration succeeds");

        let value = registry
            .handle_get_property(vec![json!("a-1"), json!("name")])
            .await
            .expect("property read succeeds");
        assert_eq!(value, json!("I am an ACTOR"));

        let missing = registry
            .handle_get_property(vec![json!("a-1"), json!("nope")])
            .await
            .expect("missing property reads as null");
        assert_eq!(missing, Value::Null);
    }
}
