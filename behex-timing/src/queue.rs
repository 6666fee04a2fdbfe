//! Cancellable one-shot timers for a single-threaded event loop.
//!
//! Every scheduled timer gets a fresh [`TimerToken`]. Cancelling consumes
//! the entry, so a token can fire at most once and a cancelled token never
//! fires at all.

use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerToken(u64);

impl TimerToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    next_id: u64,
    // Keyed by (due, id) so equal deadlines fire in scheduling order.
    entries: BTreeMap<(u64, u64), K>,
    due_by_id: HashMap<u64, u64>,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self {
            next_id: 0,
            entries: BTreeMap::new(),
            due_by_id: HashMap::new(),
        }
    }
}

impl<K> TimerQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due_ns: u64, kind: K) -> TimerToken {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert((due_ns, id), kind);
        self.due_by_id.insert(id, due_ns);
        TimerToken(id)
    }

    /// Returns false if the token already fired or was cancelled.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        match self.due_by_id.remove(&token.0) {
            Some(due) => self.entries.remove(&(due, token.0)).is_some(),
            None => false,
        }
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.due_by_id.contains_key(&token.0)
    }

    pub fn next_due(&self) -> Option<u64> {
        self.entries.keys().next().map(|&(due, _)| due)
    }

    /// Removes and returns the earliest timer due at or before `now_ns`.
    pub fn pop_due(&mut self, now_ns: u64) -> Option<(TimerToken, u64, K)> {
        let &(due, id) = self.entries.keys().next()?;
        if due > now_ns {
            return None;
        }
        let kind = self.entries.remove(&(due, id))?;
        self.due_by_id.remove(&id);
        Some((TimerToken(id), due, kind))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.due_by_id.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
