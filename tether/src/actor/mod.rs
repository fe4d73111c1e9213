//! Addressable actors layered over a pair.
//!
//! The registry owns the server side (local actors, late-binding
//! resolution, event proxying); [`RemoteActor`] is the client-side view.

mod local;
mod registry;
mod remote;

pub use local::{Actor, ActorEvents, ActorObject};
pub use registry::{ActorRegistry, RegistryConfig, CALL_ACTOR, GET_ACTOR_PROPERTY};
pub use remote::RemoteActor;

/// Wire-level event name for actor `id`'s event `event`.
///
/// The scoping keeps actor emissions from colliding with plain pair events
/// of the same name.
pub fn scoped_event_name(id: &str, event: &str) -> String {
    format!("remote:{id}:{event}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_event_name_shape() {
        assert_eq!(scoped_event_name("incrementer-1", "tick"), "remote:incrementer-1:tick");
    }
}
