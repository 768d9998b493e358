//! Keeps the configuration file and the preference mirror consistent.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::document::ConfigDocument;
use crate::errors::{ConfigError, Result};
use crate::mapping::{apply_to_mirror, mirror_document, rebuild_from_mirror};
use crate::mirror::PreferenceStore;
use crate::paths::ConfigPaths;

/// Reconciles `ai_config.json` with the flat preference mirror.
///
/// Reads never fail: a missing, empty or unparsable file is rebuilt from the
/// mirror and written back. All file and mirror writes happen under one lock.
pub struct ConfigSynchronizer {
    paths: ConfigPaths,
    prefs: Arc<dyn PreferenceStore>,
    io_lock: Mutex<()>,
    legacy_checked: AtomicBool,
}

impl ConfigSynchronizer {
    pub fn new(paths: ConfigPaths, prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            paths,
            prefs,
            io_lock: Mutex::new(()),
            legacy_checked: AtomicBool::new(false),
        }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Create the config directory and file if missing, migrating the legacy
    /// file on the first check of this process.
    pub fn ensure_file(&self) {
        let _guard = self.io_lock.lock();
        self.ensure_file_locked();
    }

    /// Current document, with porcupine fields redacted unless porcupine is
    /// the active engine.
    pub fn load(&self) -> ConfigDocument {
        let _guard = self.io_lock.lock();
        self.load_locked()
    }

    /// Current document without touching the file or the mirror.
    ///
    /// Falls back to the mirror's view when the file is missing or
    /// unreadable; repair is left to [`load`](Self::load).
    pub fn current(&self) -> ConfigDocument {
        let _guard = self.io_lock.lock();
        let from_file = if self.paths.current.exists() {
            self.read_file()
        } else {
            None
        };
        let mut doc = match from_file {
            Some((_, doc)) => doc,
            None => rebuild_from_mirror(self.prefs.as_ref()),
        };
        let _ = doc.redact_hotword();
        doc
    }

    /// Current document as pretty-printed JSON.
    pub fn read_raw(&self) -> String {
        to_pretty(&self.load())
    }

    /// Replace the document with `text`.
    ///
    /// Stamps `updatedAt`, applies hotword redaction, mirrors the fields the
    /// input mentions and persists the canonical form, which is returned.
    pub fn write(&self, text: &str) -> Result<String> {
        let raw: Value = serde_json::from_str(text)?;
        if !raw.is_object() {
            return Err(ConfigError::Malformed("document must be a JSON object".into()));
        }
        let mut doc: ConfigDocument = serde_json::from_value(raw.clone())?;
        doc.updated_at = ember_core::now_ms();
        if doc.redact_hotword() {
            debug!(engine = %doc.hotword.engine, "dropped porcupine fields on write");
        }

        let mut present = raw;
        if let Value::Object(map) = &mut present {
            let _ = map.insert("updatedAt".into(), Value::from(doc.updated_at));
        }

        let _guard = self.io_lock.lock();
        self.create_parent_dir();
        let _ = self.persist(&doc);
        apply_to_mirror(&present, &doc, self.prefs.as_ref());
        info!(updated_at = doc.updated_at, "configuration written");
        Ok(to_pretty(&doc))
    }

    fn load_locked(&self) -> ConfigDocument {
        self.ensure_file_locked();
        match self.read_file() {
            Some((raw, mut doc)) => {
                let _ = doc.redact_hotword();
                apply_to_mirror(&raw, &doc, self.prefs.as_ref());
                doc
            }
            None => self.restore_from_mirror(),
        }
    }

    fn ensure_file_locked(&self) {
        self.create_parent_dir();
        if self.paths.current.exists() {
            return;
        }

        if !self.legacy_checked.swap(true, Ordering::SeqCst) && self.paths.legacy.exists() {
            match self.migrate_legacy() {
                Ok(()) => {
                    info!(
                        from = %self.paths.legacy.display(),
                        to = %self.paths.current.display(),
                        "migrated legacy configuration"
                    );
                    return;
                }
                Err(e) => warn!(error = %e, "legacy configuration migration failed"),
            }
        }

        let doc = rebuild_from_mirror(self.prefs.as_ref());
        if self.persist(&doc) {
            debug!(path = %self.paths.current.display(), "created configuration from mirror");
        }
    }

    fn migrate_legacy(&self) -> io::Result<()> {
        migrate_file(&self.paths.legacy, &self.paths.current, |p| fs::remove_file(p))
    }

    fn restore_from_mirror(&self) -> ConfigDocument {
        let doc = rebuild_from_mirror(self.prefs.as_ref());
        warn!(path = %self.paths.current.display(), "configuration unreadable, restored from mirror");
        let _ = self.persist(&doc);
        mirror_document(&doc, self.prefs.as_ref());
        doc
    }

    /// Parsed file contents, or `None` if absent, empty or invalid.
    fn read_file(&self) -> Option<(Value, ConfigDocument)> {
        let text = match fs::read_to_string(&self.paths.current) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %self.paths.current.display(), error = %e, "failed to read configuration");
                return None;
            }
        };
        if text.trim().is_empty() {
            return None;
        }

        let raw: Value = match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "configuration file is not valid JSON");
                return None;
            }
        };
        if !raw.is_object() {
            warn!("configuration file is not a JSON object");
            return None;
        }
        match serde_json::from_value(raw.clone()) {
            Ok(doc) => Some((raw, doc)),
            Err(e) => {
                warn!(error = %e, "configuration file has invalid fields");
                None
            }
        }
    }

    fn create_parent_dir(&self) {
        if let Some(parent) = self.paths.current.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "failed to create config directory");
            }
        }
    }

    /// Write to a staging file and rename it over the document.
    fn persist(&self, doc: &ConfigDocument) -> bool {
        let staging = self.paths.staging();
        let result = fs::write(&staging, to_pretty(doc))
            .and_then(|()| fs::rename(&staging, &self.paths.current));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(path = %self.paths.current.display(), error = %e, "failed to persist configuration");
                false
            }
        }
    }
}

/// Copy `from` to `to`, then try to remove `from`.
///
/// Once the copy lands the migration counts as done; a leftover source is
/// only logged, since `to` now exists and the source is never read again.
fn migrate_file(
    from: &Path,
    to: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    let _ = fs::copy(from, to)?;
    if let Err(e) = remove(from) {
        warn!(path = %from.display(), error = %e, "legacy configuration left in place after copy");
    }
    Ok(())
}

fn to_pretty(doc: &ConfigDocument) -> String {
    serde_json::to_string_pretty(doc).unwrap_or_else(|e| {
        warn!(error = %e, "failed to encode configuration");
        "{}".to_string()
    })
}
