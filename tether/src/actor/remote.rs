//! Client-side actor handle.
//!
//! A [`RemoteActor`] binds a pair to one actor id on the peer. It holds no
//! state of its own: calls and property reads reduce to the pair's reserved
//! methods, and subscriptions attach to the scoped event name on the pair's
//! local hub.

use serde_json::Value;

use crate::actor::registry::{CALL_ACTOR, GET_ACTOR_PROPERTY};
use crate::actor::scoped_event_name;
use crate::error::PairError;
use crate::events::Subscription;
use crate::pair::Pair;

/// A view of an actor hosted by the peer.
#[derive(Debug, Clone)]
pub struct RemoteActor {
    pair: Pair,
    id: String,
}

impl RemoteActor {
    pub(crate) fn new(pair: Pair, id: impl Into<String>) -> Self {
        Self {
            pair,
            id: id.into(),
        }
    }

    /// The bound actor id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Invoke a method on the remote actor.
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, PairError> {
        self.pair.call_actor(&self.id, method, args).await
    }

    /// Read a property of the remote actor.
    pub async fn get(&self, name: &str) -> Result<Value, PairError> {
        self.pair
            .call(
                GET_ACTOR_PROPERTY,
                vec![Value::String(self.id.clone()), Value::String(name.to_string())],
            )
            .await
    }

    /// Subscribe to an event emitted by the remote actor.
    pub fn on(&self, event: &str, listener: impl Fn(&[Value]) + 'static) -> Subscription {
        self.pair.on(scoped_event_name(&self.id, event), listener)
    }

    /// Subscribe to the next emission only.
    pub fn once(&self, event: &str, listener: impl Fn(&[Value]) + 'static) -> Subscription {
        self.pair.once(scoped_event_name(&self.id, event), listener)
    }

    /// Remove a subscription taken out with [`on`](Self::on) or
    /// [`once`](Self::once).
    pub fn off(&self, subscription: &Subscription) {
        self.pair.off(subscription)
    }
}

impl Pair {
    /// A handle to the actor bound to `id` on the peer.
    pub fn actor(&self, id: impl Into<String>) -> RemoteActor {
        RemoteActor::new(self.clone(), id)
    }

    /// Invoke a method on the peer-hosted actor `id`.
    pub async fn call_actor(
        &self,
        id: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, PairError> {
        let mut params = Vec::with_capacity(args.len() + 2);
        params.push(Value::String(id.to_string()));
        params.push(Value::String(method.to_string()));
        params.extend(args);
        self.call(CALL_ACTOR, params).await
    }
}
