//! Correlation id generation.
//!
//! A single process-wide monotonic counter, prefixed with the pair name.
//! The prefix makes ids traceable across pairs in one process's logs;
//! uniqueness is only needed to disambiguate concurrent waiters.

use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Produce the next correlation id for a pair: `"<pair-name>:<n>"`.
///
/// Ids are never reused within a process lifetime.
pub(crate) fn next_correlation_id(pair_name: &str) -> String {
    let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{pair_name}:{n}")
}
