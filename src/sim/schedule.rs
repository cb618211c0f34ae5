//! Delayed events on the session's logical clock
//!
//! Nothing is ever cancelled. Each event records the attempt it was
//! scheduled in, and the handler checks at fire time whether that attempt
//! (and the expected state) is still current.

use std::collections::BTreeMap;

/// What a scheduled event does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventKind {
    /// Restart the current level after a death
    Restart,
}

/// Identity of a scheduled event; at most one pending per key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    /// Attempt the event belongs to
    pub attempt: u64,
    pub kind: EventKind,
}

/// A due event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fired {
    pub key: EventKey,
    pub at_ms: f64,
}

/// Pending events keyed by attempt and kind
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    pending: BTreeMap<EventKey, f64>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` at `at_ms`. Returns false if one is already pending.
    pub fn schedule(&mut self, key: EventKey, at_ms: f64) -> bool {
        if self.pending.contains_key(&key) {
            return false;
        }
        self.pending.insert(key, at_ms);
        true
    }

    /// Remove and return every event due at or before `now_ms`, earliest first
    pub fn drain_due(&mut self, now_ms: f64) -> Vec<Fired> {
        let due: Vec<EventKey> = self
            .pending
            .iter()
            .filter(|&(_, &at)| at <= now_ms)
            .map(|(&k, _)| k)
            .collect();
        let mut fired: Vec<Fired> = due
            .into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|at_ms| Fired { key, at_ms }))
            .collect();
        fired.sort_by(|a, b| a.at_ms.total_cmp(&b.at_ms));
        fired
    }

    pub fn is_pending(&self, key: EventKey) -> bool {
        self.pending.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
