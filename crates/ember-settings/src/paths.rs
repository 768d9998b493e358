use std::path::{Path, PathBuf};

/// File name of the configuration document.
pub const CONFIG_FILE_NAME: &str = "ai_config.json";

/// Current and legacy locations of the configuration document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigPaths {
    /// `<root>/config/ai_config.json`
    pub current: PathBuf,
    /// `<root>/ai_config.json`, migrated once into `current` if present.
    pub legacy: PathBuf,
}

impl ConfigPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            current: root.join("config").join(CONFIG_FILE_NAME),
            legacy: root.join(CONFIG_FILE_NAME),
        }
    }

    /// Sibling path persisted writes go to before being renamed into place.
    pub fn staging(&self) -> PathBuf {
        self.current.with_extension("json.tmp")
    }
}

/// Default data directory (`~/.ember`).
pub fn default_root() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".ember")
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::under(&default_root())
    }
}
