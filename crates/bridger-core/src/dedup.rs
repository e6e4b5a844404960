//! Bounded FIFO packet deduplication.
//!
//! Grounded on `bridger/deduplication.py`: a fixed-capacity queue of seen keys
//! plus a parallel set for O(1) membership checks, oldest entry evicted when
//! the queue is full. Exposes the same three primitives the original does:
//! a peek-only check, a commit-only record, and a check-and-commit
//! convenience that callers use in the common case.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Deduplicates packets by a caller-chosen key, keeping only the most recent
/// `capacity` keys in memory.
pub struct Deduplicator<K> {
    capacity: usize,
    order: VecDeque<K>,
    seen: HashSet<K>,
}

impl<K: Eq + Hash + Clone> Deduplicator<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Peek-only: has `key` been seen before? Does not record anything.
    pub fn peek(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    /// Alias for [`peek`](Self::peek), matching the naming callers that only
    /// need to inspect (not commit) expect.
    pub fn is_duplicate(&self, key: &K) -> bool {
        self.peek(key)
    }

    /// Commit-only: records `key` as seen, evicting the oldest key if at
    /// capacity. Does not check whether `key` was already seen.
    pub fn mark_processed(&mut self, key: K) {
        if self.seen.contains(&key) {
            return;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }

        self.order.push_back(key.clone());
        self.seen.insert(key);
    }

    /// Check-and-commit: returns `true` if `key` had not been seen before
    /// (the caller should process it), and records it in that case. Returns
    /// `false` without recording anything if `key` is a duplicate.
    pub fn should_process(&mut self, key: K) -> bool {
        if self.peek(&key) {
            return false;
        }
        self.mark_processed(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Key used by the ingest loop: a gateway may re-announce the same packet id
/// across reconnects, so dedup is scoped per gateway rather than global.
pub type GatewayPacketKey = (String, u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_seen_should_be_processed() {
        let mut dedup: Deduplicator<u32> = Deduplicator::new(4);
        assert!(dedup.should_process(1));
    }

    #[test]
    fn repeat_should_not_be_processed() {
        let mut dedup: Deduplicator<u32> = Deduplicator::new(4);
        assert!(dedup.should_process(1));
        assert!(!dedup.should_process(1));
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut dedup: Deduplicator<u32> = Deduplicator::new(2);
        assert!(dedup.should_process(1));
        assert!(dedup.should_process(2));
        assert!(dedup.should_process(3)); // evicts 1
        assert!(dedup.should_process(1)); // 1 was evicted, so it's fresh again
        assert!(!dedup.should_process(3));
    }

    #[test]
    fn gateway_scoped_keys_distinguish_gateways() {
        let mut dedup: Deduplicator<GatewayPacketKey> = Deduplicator::new(8);
        assert!(dedup.should_process(("gw-a".to_string(), 42)));
        assert!(dedup.should_process(("gw-b".to_string(), 42)));
        assert!(!dedup.should_process(("gw-a".to_string(), 42)));
    }

    #[test]
    fn len_reflects_current_window() {
        let mut dedup: Deduplicator<u32> = Deduplicator::new(3);
        dedup.should_process(1);
        dedup.should_process(2);
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut dedup: Deduplicator<u32> = Deduplicator::new(4);
        assert!(!dedup.peek(&1));
        assert!(!dedup.peek(&1)); // still unseen, peek recorded nothing
        assert_eq!(dedup.len(), 0);
    }

    #[test]
    fn mark_processed_commits_without_checking() {
        let mut dedup: Deduplicator<u32> = Deduplicator::new(4);
        dedup.mark_processed(1);
        assert!(dedup.peek(&1));
        assert_eq!(dedup.len(), 1);
    }
}
