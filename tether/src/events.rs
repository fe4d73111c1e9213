//! Local event hub backing a pair's `on`/`once`/`off` surface.
//!
//! Listeners are plain closures keyed by event name. Emission snapshots the
//! matching listeners before invoking them, so a listener may subscribe or
//! unsubscribe reentrantly without poisoning the table.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value;

/// A subscribed listener closure.
pub type Listener = Rc<dyn Fn(&[Value])>;

struct Entry {
    token: u64,
    once: bool,
    listener: Listener,
}

/// Handle for removing a listener.
///
/// Listener closures have no identity in Rust, so removal goes through the
/// token handed out at subscription time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    event: String,
    token: u64,
}

impl Subscription {
    /// Event name this subscription is attached to.
    pub fn event(&self) -> &str {
        &self.event
    }
}

/// Listener registry for one endpoint.
#[derive(Default)]
pub struct EventHub {
    entries: RefCell<HashMap<String, Vec<Entry>>>,
    next_token: Cell<u64>,
}

impl EventHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every emission of `event`.
    pub fn on(&self, event: impl Into<String>, listener: impl Fn(&[Value]) + 'static) -> Subscription {
        self.subscribe(event.into(), false, Rc::new(listener))
    }

    /// Subscribe to the next emission of `event` only.
    pub fn once(
        &self,
        event: impl Into<String>,
        listener: impl Fn(&[Value]) + 'static,
    ) -> Subscription {
        self.subscribe(event.into(), true, Rc::new(listener))
    }

    fn subscribe(&self, event: String, once: bool, listener: Listener) -> Subscription {
        let token = self.next_token.get();
        self.next_token.set(token + 1);

        self.entries
            .borrow_mut()
            .entry(event.clone())
            .or_default()
            .push(Entry {
                token,
                once,
                listener,
            });

        Subscription { event, token }
    }

    /// Remove a listener. Removing an already-removed listener is a no-op.
    pub fn off(&self, subscription: &Subscription) {
        let mut entries = self.entries.borrow_mut();
        if let Some(list) = entries.get_mut(&subscription.event) {
            list.retain(|entry| entry.token != subscription.token);
            if list.is_empty() {
                entries.remove(&subscription.event);
            }
        }
    }

    /// Deliver `args` to every listener of `event`.
    ///
    /// Once-listeners are unregistered before their invocation, and the
    /// listener table is not borrowed while listeners run.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let snapshot: Vec<Listener> = {
            let mut entries = self.entries.borrow_mut();
            match entries.get_mut(event) {
                Some(list) => {
                    let listeners = list.iter().map(|entry| entry.listener.clone()).collect();
                    list.retain(|entry| !entry.once);
                    if list.is_empty() {
                        entries.remove(event);
                    }
                    listeners
                }
                None => Vec::new(),
            }
        };

        for listener in snapshot {
            listener(args);
        }
    }

    /// Number of listeners currently subscribed to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.entries
            .borrow()
            .get(event)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_on_receives_every_emission() {
        let hub = EventHub::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        hub.on("tick", move |args| sink.borrow_mut().push(args.to_vec()));

        hub.emit("tick", &[json!(1)]);
        hub.emit("tick", &[json!(2)]);
        hub.emit("other", &[json!(3)]);

        assert_eq!(*seen.borrow(), vec![vec![json!(1)], vec![json!(2)]]);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let hub = EventHub::new();
        let count = Rc::new(Cell::new(0));

        let counter = count.clone();
        hub.once("tick", move |_| counter.set(counter.get() + 1));

        hub.emit("tick", &[]);
        hub.emit("tick", &[]);

        assert_eq!(count.get(), 1);
        assert_eq!(hub.listener_count("tick"), 0);
    }

    #[test]
    fn test_off_removes_only_the_targeted_listener() {
        let hub = EventHub::new();
        let count = Rc::new(Cell::new(0));

        let a = count.clone();
        let sub = hub.on("tick", move |_| a.set(a.get() + 1));
        let b = count.clone();
        hub.on("tick", move |_| b.set(b.get() + 10));

        hub.off(&sub);
        hub.emit("tick", &[]);

        assert_eq!(count.get(), 10);
        // Removing twice is harmless.
        hub.off(&sub);
    }

    #[test]
    fn test_listener_may_resubscribe_during_emit() {
        let hub = Rc::new(EventHub::new());
        let count = Rc::new(Cell::new(0));

        let hub_inner = hub.clone();
        let counter = count.clone();
        hub.once("tick", move |_| {
            counter.set(counter.get() + 1);
            let counter = counter.clone();
            hub_inner.once("tick", move |_| counter.set(counter.get() + 1));
        });

        hub.emit("tick", &[]);
        hub.emit("tick", &[]);

        assert_eq!(count.get(), 2);
    }
}
