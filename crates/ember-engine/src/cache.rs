//! Response cache seam and its in-memory and SQLite backends.

use std::time::Duration;

use dashmap::DashMap;
use tracing::warn;

use ember_store::{CacheRepo, CachedResponse};

/// Entries older than this are treated as absent and deleted on lookup.
pub const CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cache key for a message under a persona.
pub fn fingerprint(message: &str, persona: &str) -> String {
    format!("{message}_{persona}")
}

/// Whether an entry created at `created_at_ms` is still usable at `now_ms`.
pub fn is_fresh(created_at_ms: i64, now_ms: i64, ttl: Duration) -> bool {
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(created_at_ms) < ttl_ms
}

/// Opaque get/put/delete store for completed responses.
///
/// Failures are logged by the backend and read as a miss.
pub trait ResponseCache: Send + Sync {
    fn get(&self, fingerprint: &str) -> Option<CachedResponse>;
    fn put(&self, fingerprint: &str, entry: CachedResponse);
    fn delete(&self, fingerprint: &str);
    /// Drop every entry created before `cutoff_ms`; returns how many went.
    fn purge_older_than(&self, cutoff_ms: i64) -> usize;
}

#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: DashMap<String, CachedResponse>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ResponseCache for InMemoryCache {
    fn get(&self, fingerprint: &str) -> Option<CachedResponse> {
        self.entries.get(fingerprint).map(|e| e.value().clone())
    }

    fn put(&self, fingerprint: &str, entry: CachedResponse) {
        let _ = self.entries.insert(fingerprint.to_string(), entry);
    }

    fn delete(&self, fingerprint: &str) {
        let _ = self.entries.remove(fingerprint);
    }

    fn purge_older_than(&self, cutoff_ms: i64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| e.created_at_ms >= cutoff_ms);
        before.saturating_sub(self.entries.len())
    }
}

impl ResponseCache for CacheRepo {
    fn get(&self, fingerprint: &str) -> Option<CachedResponse> {
        CacheRepo::get(self, fingerprint).unwrap_or_else(|e| {
            warn!(error = %e, "response cache read failed");
            None
        })
    }

    fn put(&self, fingerprint: &str, entry: CachedResponse) {
        if let Err(e) = CacheRepo::put(self, fingerprint, &entry) {
            warn!(error = %e, "response cache write failed");
        }
    }

    fn delete(&self, fingerprint: &str) {
        if let Err(e) = CacheRepo::delete(self, fingerprint) {
            warn!(error = %e, "response cache delete failed");
        }
    }

    fn purge_older_than(&self, cutoff_ms: i64) -> usize {
        CacheRepo::purge_older_than(self, cutoff_ms).unwrap_or_else(|e| {
            warn!(error = %e, "response cache purge failed");
            0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_store::Database;

    fn entry(text: &str) -> CachedResponse {
        CachedResponse {
            response: text.into(),
            created_at_ms: 1,
        }
    }

    #[test]
    fn fingerprint_joins_with_underscore() {
        assert_eq!(fingerprint("hello", "casual"), "hello_casual");
        // Plain concatenation: underscores in either part can collide.
        assert_eq!(fingerprint("a_b", "c"), fingerprint("a", "b_c"));
    }

    #[test]
    fn freshness_window() {
        let ttl = Duration::from_secs(10);
        assert!(is_fresh(0, 9_999, ttl));
        assert!(!is_fresh(0, 10_000, ttl));
        assert!(is_fresh(5_000, 0, ttl));
    }

    fn exercise(cache: &dyn ResponseCache) {
        assert!(cache.get("k").is_none());
        cache.put("k", entry("v"));
        assert_eq!(cache.get("k").unwrap().response, "v");
        cache.delete("k");
        assert!(cache.get("k").is_none());
    }

    fn exercise_purge(cache: &dyn ResponseCache) {
        for (key, at) in [("old", 100), ("edge", 500), ("new", 900)] {
            cache.put(
                key,
                CachedResponse {
                    response: key.into(),
                    created_at_ms: at,
                },
            );
        }
        assert_eq!(cache.purge_older_than(500), 1);
        assert!(cache.get("old").is_none());
        assert!(cache.get("edge").is_some());
        assert!(cache.get("new").is_some());
        assert_eq!(cache.purge_older_than(500), 0);
    }

    #[test]
    fn in_memory_backend() {
        exercise(&InMemoryCache::new());
        exercise_purge(&InMemoryCache::new());
    }

    #[test]
    fn sqlite_backend() {
        exercise(&CacheRepo::new(Database::in_memory().unwrap()));
        exercise_purge(&CacheRepo::new(Database::in_memory().unwrap()));
    }
}
