//! Bounded recency-ordered peer cache.
//!
//! [`PeerCache`] is a set with LRU eviction: recording a value moves it to
//! the most-recent end, and once the cache is full the least-recently
//! recorded value is dropped. It backs the live peer table, so stale peers
//! age out naturally as newer announcements arrive.
//!
//! The cache is not synchronized; callers that share one across tasks must
//! wrap it in a mutex and hold the lock only for the duration of each call.

use std::collections::VecDeque;

/// Default capacity of a peer cache.
pub const DEFAULT_CAPACITY: usize = 20;

/// A bounded set ordered by recency of recording.
///
/// Entries are unique; capacities are small (tens of peers on a LAN), so
/// membership checks scan the backing deque rather than keeping a side
/// index.
#[derive(Debug, Clone)]
pub struct PeerCache<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Eq> PeerCache<T> {
    /// Create a cache holding at most `capacity` entries.
    ///
    /// A capacity of zero is normalized to one.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Record a value as the most recently seen entry.
    ///
    /// If the value is already present it is moved to the most-recent end
    /// without changing membership. Returns the entry evicted to make room,
    /// if any.
    pub fn record(&mut self, value: T) -> Option<T> {
        if let Some(pos) = self.entries.iter().position(|e| *e == value) {
            self.entries.remove(pos);
        }
        self.entries.push_back(value);

        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Whether the value is currently cached.
    pub fn contains(&self, value: &T) -> bool {
        self.entries.contains(value)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The fixed capacity this cache was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate over entries, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

impl<T: Eq + Clone> PeerCache<T> {
    /// Point-in-time copy of the entries, oldest to newest.
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl<T: Eq> Default for PeerCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
