use chrono::Utc;
use rusqlite::OptionalExtension;

use ember_core::PrefValue;

use crate::database::Database;
use crate::error::StoreError;

/// Flat key/value preference table backing the configuration mirror.
#[derive(Clone)]
pub struct PreferenceRepo {
    db: Database,
}

impl PreferenceRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> Result<Option<PrefValue>, StoreError> {
        self.db.with_conn(|conn| {
            let row: Option<(String, String)> = conn
                .query_row(
                    "SELECT kind, value FROM preferences WHERE key = ?1",
                    [key],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            match row {
                None => Ok(None),
                Some((kind, raw)) => PrefValue::decode(&kind, &raw)
                    .map(Some)
                    .ok_or_else(|| StoreError::Corrupt {
                        key: key.to_string(),
                        reason: format!("cannot decode {kind:?} from {raw:?}"),
                    }),
            }
        })
    }

    pub fn put(&self, key: &str, value: &PrefValue) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO preferences (key, kind, value, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(key) DO UPDATE SET kind = excluded.kind, value = excluded.value,
                 updated_at = excluded.updated_at",
                rusqlite::params![key, value.kind(), value.encode(), now],
            )?;
            Ok(())
        })
    }

    /// Delete a key. Returns whether a row was removed.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let n = conn.execute("DELETE FROM preferences WHERE key = ?1", [key])?;
            Ok(n > 0)
        })
    }
}
