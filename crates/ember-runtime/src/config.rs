//! Runtime configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use ember_llm::{CHAT_COMPLETIONS_URL, OLLAMA_CHAT_URL};
use ember_server::DEFAULT_PROTOCOL_PORT;
use ember_settings::ConfigPaths;

pub const DEFAULT_FILE_PORT: u16 = 8080;
pub const DEFAULT_ASSET_PORT: u16 = 8081;
pub const DATABASE_FILE_NAME: &str = "ember.db";

/// Where the runtime keeps its state and which ports it serves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Root for the config file and database (default `~/.ember`).
    pub data_dir: PathBuf,
    pub bind_addr: IpAddr,
    pub protocol_port: u16,
    pub file_port: u16,
    pub asset_port: u16,
    pub ollama_url: String,
    pub chat_url: String,
    /// Log directives, e.g. `"info,ember_server=debug"`.
    pub log: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            data_dir: ember_settings::paths::default_root(),
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            protocol_port: DEFAULT_PROTOCOL_PORT,
            file_port: DEFAULT_FILE_PORT,
            asset_port: DEFAULT_ASSET_PORT,
            ollama_url: OLLAMA_CHAT_URL.into(),
            chat_url: CHAT_COMPLETIONS_URL.into(),
            log: None,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `EMBER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `EMBER_*` key.
    /// Unparseable ports are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(dir) = get("EMBER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        for (key, slot) in [
            ("EMBER_PROTOCOL_PORT", &mut config.protocol_port),
            ("EMBER_FILE_PORT", &mut config.file_port),
            ("EMBER_ASSET_PORT", &mut config.asset_port),
        ] {
            if let Some(raw) = get(key) {
                match raw.parse() {
                    Ok(port) => *slot = port,
                    Err(e) => warn!(key, value = %raw, error = %e, "ignoring invalid port"),
                }
            }
        }
        if let Some(url) = get("EMBER_OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Some(url) = get("EMBER_CHAT_URL") {
            config.chat_url = url;
        }
        config.log = get("EMBER_LOG");
        config
    }

    pub fn config_paths(&self) -> ConfigPaths {
        ConfigPaths::under(&self.data_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_ports() {
        let config = RuntimeConfig::default();
        assert_eq!(config.protocol_port, 8765);
        assert_eq!(config.file_port, 8080);
        assert_eq!(config.asset_port, 8081);
        assert_eq!(config.ollama_url, OLLAMA_CHAT_URL);
        assert!(config.log.is_none());
    }

    #[test]
    fn env_overrides() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("EMBER_DATA_DIR", "/srv/ember"),
            ("EMBER_PROTOCOL_PORT", "9000"),
            ("EMBER_ASSET_PORT", " 9002 "),
            ("EMBER_CHAT_URL", "http://localhost:11434/v1/chat/completions"),
            ("EMBER_LOG", "debug"),
        ]));
        assert_eq!(config.data_dir, PathBuf::from("/srv/ember"));
        assert_eq!(config.protocol_port, 9000);
        assert_eq!(config.file_port, DEFAULT_FILE_PORT);
        assert_eq!(config.asset_port, 9002);
        assert_eq!(config.chat_url, "http://localhost:11434/v1/chat/completions");
        assert_eq!(config.log.as_deref(), Some("debug"));
    }

    #[test]
    fn invalid_port_keeps_default() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            ("EMBER_PROTOCOL_PORT", "eighty"),
            ("EMBER_FILE_PORT", "70000"),
        ]));
        assert_eq!(config.protocol_port, DEFAULT_PROTOCOL_PORT);
        assert_eq!(config.file_port, DEFAULT_FILE_PORT);
    }

    #[test]
    fn derived_paths() {
        let config = RuntimeConfig {
            data_dir: PathBuf::from("/data"),
            ..RuntimeConfig::default()
        };
        assert_eq!(config.database_path(), PathBuf::from("/data/ember.db"));
        assert_eq!(
            config.config_paths().current,
            PathBuf::from("/data/config/ai_config.json")
        );
    }
}
