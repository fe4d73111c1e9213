//! Pending-reply tracking for outbound `call` and `notify` frames.
//!
//! Each outbound frame that expects a correlated result registers a oneshot
//! waiter under its id. The first matching result settles the waiter; later
//! results for the same id find no entry and are dropped. A timed-out wait
//! abandons the entry so the peer's eventual reply leaks nothing.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::RemoteError;

/// Outcome delivered to a waiter: the peer's result or its rejection.
pub(crate) type ReplyOutcome = Result<Value, RemoteError>;

/// Table of pending waiters keyed by correlation id.
#[derive(Default)]
pub(crate) struct WaiterTable {
    pending: RefCell<HashMap<String, oneshot::Sender<ReplyOutcome>>>,
}

impl WaiterTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id` and return its receiving half.
    pub(crate) fn register(&self, id: &str) -> oneshot::Receiver<ReplyOutcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.borrow_mut().insert(id.to_string(), tx);
        rx
    }

    /// Settle the waiter for `id`, if one is still registered.
    ///
    /// Returns false when no waiter exists (late, duplicate, or unsolicited
    /// result); the outcome is discarded in that case.
    pub(crate) fn complete(&self, id: &str, outcome: ReplyOutcome) -> bool {
        match self.pending.borrow_mut().remove(id) {
            Some(tx) => {
                // The receiver may have been dropped by a cancelled caller.
                let _ = tx.send(outcome);
                true
            }
            None => false,
        }
    }

    /// Drop the waiter for `id` without settling it (timeout path).
    pub(crate) fn abandon(&self, id: &str) {
        self.pending.borrow_mut().remove(id);
    }

    /// Number of replies currently awaited.
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_result_settles_waiter() {
        let table = WaiterTable::new();
        let mut rx = table.register("a:1");
        assert_eq!(table.pending_count(), 1);

        assert!(table.complete("a:1", Ok(json!(15))));
        assert_eq!(table.pending_count(), 0);
        assert_eq!(rx.try_recv().expect("settled"), Ok(json!(15)));
    }

    #[test]
    fn test_subsequent_results_are_discarded() {
        let table = WaiterTable::new();
        let _rx = table.register("a:1");

        assert!(table.complete("a:1", Ok(json!(1))));
        assert!(!table.complete("a:1", Ok(json!(2))));
        assert!(!table.complete("a:unknown", Ok(json!(3))));
    }

    #[test]
    fn test_abandon_removes_without_settling() {
        let table = WaiterTable::new();
        let mut rx = table.register("a:1");

        table.abandon("a:1");
        assert_eq!(table.pending_count(), 0);
        // Sender dropped: the receiver observes closure, not a value.
        assert!(rx.try_recv().is_err());
        assert!(!table.complete("a:1", Ok(json!(1))));
    }

    #[test]
    fn test_completion_with_dropped_receiver_is_harmless() {
        let table = WaiterTable::new();
        let rx = table.register("a:1");
        drop(rx);

        assert!(table.complete("a:1", Ok(json!(1))));
    }
}
