//! Telegram update deduplication cache

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Default dedup TTL (5 minutes)
const DEDUP_TTL_SECS: u64 = 300;

/// Maximum dedup cache entries
const DEDUP_MAX_ENTRIES: usize = 2000;

/// Remembers recently seen `update_id`s
///
/// Telegram redelivers webhook updates it considers unanswered, and a
/// restarted poller can see the same batch twice. Entries expire after a TTL
/// and the oldest entry is evicted once the cache is full.
#[derive(Debug)]
pub struct UpdateDedup {
    seen: HashMap<i64, Instant>,
    order: VecDeque<(i64, Instant)>,
    ttl: Duration,
    max_entries: usize,
}

impl Default for UpdateDedup {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEDUP_TTL_SECS), DEDUP_MAX_ENTRIES)
    }
}

impl UpdateDedup {
    /// Create a cache with a custom TTL and capacity
    #[must_use]
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            seen: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    /// Returns `true` if `update_id` was already seen within the TTL,
    /// otherwise records it and returns `false`
    pub fn is_duplicate(&mut self, update_id: i64) -> bool {
        let now = Instant::now();
        self.evict(now);

        if self.seen.contains_key(&update_id) {
            return true;
        }

        if self.seen.len() >= self.max_entries
            && let Some((oldest, _)) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }

        self.seen.insert(update_id, now);
        self.order.push_back((update_id, now));
        false
    }

    /// Drop `update_id` so a redelivery is accepted again
    ///
    /// Used when an update was recorded but could not be handed off.
    pub fn forget(&mut self, update_id: i64) {
        if self.seen.remove(&update_id).is_some() {
            self.order.retain(|&(id, _)| id != update_id);
        }
    }

    /// Number of remembered updates
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing is remembered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(&(id, at)) = self.order.front() {
            if now.duration_since(at) < self.ttl {
                break;
            }
            self.order.pop_front();
            self.seen.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sight_is_not_duplicate() {
        let mut dedup = UpdateDedup::default();
        assert!(!dedup.is_duplicate(1));
        assert!(dedup.is_duplicate(1));
        assert!(!dedup.is_duplicate(2));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut dedup = UpdateDedup::new(Duration::from_secs(60), 2);
        assert!(!dedup.is_duplicate(1));
        assert!(!dedup.is_duplicate(2));
        assert!(!dedup.is_duplicate(3));
        assert_eq!(dedup.len(), 2);
        // 1 was evicted
        assert!(!dedup.is_duplicate(1));
    }

    #[test]
    fn test_forgotten_update_is_accepted_again() {
        let mut dedup = UpdateDedup::default();
        assert!(!dedup.is_duplicate(9));
        assert!(!dedup.is_duplicate(10));

        dedup.forget(9);
        assert_eq!(dedup.len(), 1);
        assert!(!dedup.is_duplicate(9));
        assert!(dedup.is_duplicate(9));
        assert!(dedup.is_duplicate(10));

        // Unknown ids are a no-op
        dedup.forget(42);
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_expired_entries_are_forgotten() {
        let mut dedup = UpdateDedup::new(Duration::ZERO, 10);
        assert!(!dedup.is_duplicate(5));
        assert!(!dedup.is_duplicate(5));
    }
}
