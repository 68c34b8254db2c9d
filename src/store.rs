use std::collections::VecDeque;

use dashmap::DashMap;
use tracing::debug;

use crate::clock::MINUTE_MS;

// Per-key quota state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub minute_timestamps: VecDeque<i64>, // epoch ms, oldest first
    pub day_count: u32,
    pub day_reset_at: i64, // epoch ms of next UTC midnight
}

impl RateLimitEntry {
    pub fn new(day_reset_at: i64) -> Self {
        Self {
            minute_timestamps: VecDeque::new(),
            day_count: 0,
            day_reset_at,
        }
    }

    // Drop timestamps that have left the trailing 60s window
    pub fn prune_minute(&mut self, now_ms: i64) {
        while let Some(&t) = self.minute_timestamps.front() {
            if t > now_ms - MINUTE_MS {
                break;
            }
            self.minute_timestamps.pop_front();
        }
    }

    pub fn minute_used(&self, now_ms: i64) -> usize {
        self.minute_timestamps
            .iter()
            .filter(|&&t| t > now_ms - MINUTE_MS)
            .count()
    }

    // True when the entry carries no state a fresh entry wouldn't have
    pub fn is_idle(&self, now_ms: i64) -> bool {
        now_ms >= self.day_reset_at && self.minute_used(now_ms) == 0
    }
}

/// Backing storage for the rate limiter.
///
/// `with_entry` must give the closure exclusive access to the key's entry for
/// its whole duration, so two concurrent checks on one key cannot both observe
/// the same pre-mutation state.
pub trait RateLimitStore: Send + Sync {
    fn with_entry<R>(
        &self,
        key: &str,
        now_ms: i64,
        init: impl FnOnce() -> RateLimitEntry,
        f: impl FnOnce(&mut RateLimitEntry) -> R,
    ) -> R;

    fn get(&self, key: &str) -> Option<RateLimitEntry>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct Slot {
    entry: RateLimitEntry,
    last_seen: i64,
}

/// In-memory store on a `DashMap`. Each key lives in a sharded map slot, and
/// `entry()` holds the shard write lock while the closure runs.
pub struct MemoryStore {
    slots: DashMap<String, Slot>,
    max_keys: usize,
}

impl MemoryStore {
    pub fn new(max_keys: usize) -> Self {
        Self {
            slots: DashMap::new(),
            max_keys: max_keys.max(1),
        }
    }

    /// Evict idle entries, then trim least-recently-seen keys down to `max_keys`.
    /// Returns the number of evicted keys.
    pub fn sweep(&self, now_ms: i64) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| !slot.entry.is_idle(now_ms));

        let over = self.slots.len().saturating_sub(self.max_keys);
        if over > 0 {
            self.evict_oldest(self.by_age(), over);
        }
        self.slots.shrink_to_fit();

        let evicted = before.saturating_sub(self.slots.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.slots.len(), "rate limit store swept");
        }
        evicted
    }

    fn by_age(&self) -> Vec<(i64, String)> {
        let mut by_age: Vec<(i64, String)> = self
            .slots
            .iter()
            .map(|s| (s.value().last_seen, s.key().clone()))
            .collect();
        by_age.sort_unstable();
        by_age
    }

    // Keys touched after the snapshot was taken are kept
    fn evict_oldest(&self, by_age: Vec<(i64, String)>, count: usize) {
        for (seen, key) in by_age.into_iter().take(count) {
            self.slots.remove_if(&key, |_, slot| slot.last_seen == seen);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl RateLimitStore for MemoryStore {
    fn with_entry<R>(
        &self,
        key: &str,
        now_ms: i64,
        init: impl FnOnce() -> RateLimitEntry,
        f: impl FnOnce(&mut RateLimitEntry) -> R,
    ) -> R {
        let mut slot = self.slots.entry(key.to_string()).or_insert_with(|| Slot {
            entry: init(),
            last_seen: now_ms,
        });
        slot.last_seen = now_ms;
        f(&mut slot.entry)
    }

    fn get(&self, key: &str) -> Option<RateLimitEntry> {
        self.slots.get(key).map(|slot| slot.entry.clone())
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}
