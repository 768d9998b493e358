use rusqlite::OptionalExtension;
use sha2::{Digest, Sha256};

use crate::database::Database;
use crate::error::StoreError;

/// A stored completion and the time it was produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CachedResponse {
    pub response: String,
    pub created_at_ms: i64,
}

/// Persistent response cache keyed by a digest of the request fingerprint.
///
/// Expiry is the caller's policy; rows are only removed through
/// [`CacheRepo::delete`] or [`CacheRepo::purge_older_than`].
#[derive(Clone)]
pub struct CacheRepo {
    db: Database,
}

impl CacheRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn digest(fingerprint: &str) -> String {
        format!("{:x}", Sha256::digest(fingerprint.as_bytes()))
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<CachedResponse>, StoreError> {
        let key = Self::digest(fingerprint);
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT response, created_at_ms FROM response_cache WHERE fingerprint = ?1",
                    [&key],
                    |row| {
                        Ok(CachedResponse {
                            response: row.get(0)?,
                            created_at_ms: row.get(1)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    pub fn put(&self, fingerprint: &str, entry: &CachedResponse) -> Result<(), StoreError> {
        let key = Self::digest(fingerprint);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO response_cache (fingerprint, response, created_at_ms) VALUES (?1, ?2, ?3)
                 ON CONFLICT(fingerprint) DO UPDATE SET response = excluded.response,
                 created_at_ms = excluded.created_at_ms",
                rusqlite::params![key, entry.response, entry.created_at_ms],
            )?;
            Ok(())
        })
    }

    pub fn delete(&self, fingerprint: &str) -> Result<bool, StoreError> {
        let key = Self::digest(fingerprint);
        self.db.with_conn(|conn| {
            let n = conn.execute("DELETE FROM response_cache WHERE fingerprint = ?1", [&key])?;
            Ok(n > 0)
        })
    }

    /// Drop every entry created before `cutoff_ms`. Returns the number removed.
    pub fn purge_older_than(&self, cutoff_ms: i64) -> Result<usize, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM response_cache WHERE created_at_ms < ?1",
                [cutoff_ms],
            )?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> CacheRepo {
        CacheRepo::new(Database::in_memory().unwrap())
    }

    fn entry(text: &str, at: i64) -> CachedResponse {
        CachedResponse {
            response: text.into(),
            created_at_ms: at,
        }
    }

    #[test]
    fn put_get_delete() {
        let cache = repo();
        cache.put("hello_assistant", &entry("hi!", 10)).unwrap();
        assert_eq!(cache.get("hello_assistant").unwrap(), Some(entry("hi!", 10)));
        assert_eq!(cache.get("hello_casual").unwrap(), None);

        assert!(cache.delete("hello_assistant").unwrap());
        assert_eq!(cache.get("hello_assistant").unwrap(), None);
    }

    #[test]
    fn put_replaces_existing_entry() {
        let cache = repo();
        cache.put("k", &entry("old", 1)).unwrap();
        cache.put("k", &entry("new", 2)).unwrap();
        assert_eq!(cache.get("k").unwrap(), Some(entry("new", 2)));
    }

    #[test]
    fn long_fingerprints_are_digested() {
        let cache = repo();
        let fingerprint = format!("{}_assistant", "x".repeat(10_000));
        cache.put(&fingerprint, &entry("ok", 5)).unwrap();
        assert_eq!(cache.get(&fingerprint).unwrap().unwrap().response, "ok");
        assert_eq!(CacheRepo::digest(&fingerprint).len(), 64);
    }

    #[test]
    fn purge_older_than_cutoff() {
        let cache = repo();
        cache.put("a", &entry("a", 100)).unwrap();
        cache.put("b", &entry("b", 300)).unwrap();
        assert_eq!(cache.purge_older_than(200).unwrap(), 1);
        assert!(cache.get("a").unwrap().is_none());
        assert!(cache.get("b").unwrap().is_some());
    }
}
