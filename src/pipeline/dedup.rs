// Deduplicator - process-wide "seen recently" set with bounded memory
//
// Suppresses duplicate names within a CT batch burst. Capacity-bounded LRU:
// an admitted name stays suppressed until it is evicted by newer entries.
// The persistence layer's unique constraint remains the final guarantee.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

pub struct Deduplicator {
    seen: Mutex<LruCache<String, ()>>,
    capacity: usize,
}

impl Deduplicator {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            seen: Mutex::new(LruCache::new(cap)),
            capacity: cap.get(),
        }
    }

    /// Admit a name: true on first sight within the current window
    pub fn admit(&self, name: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if seen.contains(name) {
            // Refresh recency so hot names do not get evicted mid-burst
            seen.promote(name);
            false
        } else {
            seen.put(name.to_string(), ());
            true
        }
    }

    /// Seed the window without affecting admit semantics for new names
    ///
    /// Used at cold start with the most recent persisted discoveries.
    pub fn preload<I: IntoIterator<Item = String>>(&self, names: I) {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        for name in names {
            seen.put(name, ());
        }
    }

    pub fn len(&self) -> usize {
        match self.seen.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sight_admits() {
        let dedup = Deduplicator::new(100);

        assert!(dedup.admit("api.example.com"));
        assert!(!dedup.admit("api.example.com"));
        assert!(!dedup.admit("api.example.com"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_distinct_names_admit() {
        let dedup = Deduplicator::new(100);

        assert!(dedup.admit("a.example.com"));
        assert!(dedup.admit("b.example.com"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_eviction_reopens_admission() {
        let dedup = Deduplicator::new(2);

        assert!(dedup.admit("a.example.com"));
        assert!(dedup.admit("b.example.com"));
        assert!(dedup.admit("c.example.com"));

        // "a" was least recently used and got evicted
        assert!(dedup.admit("a.example.com"));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_admit_refreshes_recency() {
        let dedup = Deduplicator::new(2);

        dedup.admit("a.example.com");
        dedup.admit("b.example.com");
        // Touch "a" so "b" becomes the eviction candidate
        assert!(!dedup.admit("a.example.com"));
        dedup.admit("c.example.com");

        assert!(!dedup.admit("a.example.com"));
        assert!(dedup.admit("b.example.com"));
    }

    #[test]
    fn test_preload_suppresses() {
        let dedup = Deduplicator::new(100);

        dedup.preload(vec![
            "a.example.com".to_string(),
            "b.example.com".to_string(),
        ]);

        assert!(!dedup.admit("a.example.com"));
        assert!(dedup.admit("c.example.com"));
    }

    #[test]
    fn test_capacity_bound_holds() {
        let dedup = Deduplicator::new(10);

        for i in 0..1000 {
            dedup.admit(&format!("host{}.example.com", i));
        }

        assert_eq!(dedup.len(), 10);
    }
}
