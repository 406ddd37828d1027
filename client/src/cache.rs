//! In-memory cache for GET responses
//!
//! Keeps decoded JSON payloads for a short TTL so repeat reads of the same
//! resource skip the network. Entries live only in memory and the whole
//! cache is dropped on any session teardown, so no response data outlives
//! the session that fetched it.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// TTL-bounded response cache
pub struct QueryCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl QueryCache {
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Get a cached value; expired entries count as absent
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value under the cache's TTL
    pub fn set(&self, key: &str, value: Value) {
        let mut entries = self.entries.lock();
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Drop everything
    pub fn clear(&self) {
        let mut entries = self.entries.lock();
        let dropped = entries.len();
        entries.clear();
        if dropped > 0 {
            debug!("Query cache cleared ({} entries)", dropped);
        }
    }

    /// Number of live entries (expired ones may still be counted)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache currently holds nothing
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_get_clear() {
        let cache = QueryCache::new(Duration::from_secs(60));

        cache.set("courses", json!([{"id": 1}]));
        assert_eq!(cache.get("courses"), Some(json!([{"id": 1}])));

        cache.set("notifications", json!([]));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("courses"), None);
    }

    #[test]
    fn expired_entries_read_as_missing() {
        let cache = QueryCache::new(Duration::from_millis(5));

        cache.set("courses", json!(1));
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(cache.get("courses"), None);
        // The expired entry was evicted by the read
        assert!(cache.is_empty());
    }
}
