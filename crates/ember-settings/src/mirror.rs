//! Flat preference mirror backends.

use std::collections::HashMap;

use ember_core::PrefValue;
use ember_store::PreferenceRepo;
use parking_lot::Mutex;
use tracing::warn;

/// Flat key/value store the configuration document is mirrored into.
///
/// Mirror writes are best effort: backends log their own failures.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<PrefValue>;
    fn put(&self, key: &str, value: PrefValue);
    fn remove(&self, key: &str);
}

/// In-process mirror, used in tests and when no database is configured.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    entries: Mutex<HashMap<String, PrefValue>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<PrefValue> {
        self.entries.lock().get(key).cloned()
    }

    fn put(&self, key: &str, value: PrefValue) {
        let _ = self.entries.lock().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) {
        let _ = self.entries.lock().remove(key);
    }
}

impl PreferenceStore for PreferenceRepo {
    fn get(&self, key: &str) -> Option<PrefValue> {
        match PreferenceRepo::get(self, key) {
            Ok(v) => v,
            Err(e) => {
                warn!(key, error = %e, "preference read failed");
                None
            }
        }
    }

    fn put(&self, key: &str, value: PrefValue) {
        if let Err(e) = PreferenceRepo::put(self, key, &value) {
            warn!(key, error = %e, "preference write failed");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(e) = PreferenceRepo::remove(self, key) {
            warn!(key, error = %e, "preference delete failed");
        }
    }
}
