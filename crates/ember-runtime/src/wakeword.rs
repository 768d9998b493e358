//! Wake-word switch driven by the `hotword` section of the config document.
//!
//! Detection itself runs in the host; this listener decides whether it should
//! be armed and with which settings.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use ember_core::{ServiceError, WakeWordListener};
use ember_settings::{ConfigSynchronizer, HotwordConfig, PORCUPINE_ENGINE};

const SERVICE: &str = "wakeword";

pub struct ConfiguredWakeWord {
    settings: Arc<ConfigSynchronizer>,
    armed: Mutex<Option<HotwordConfig>>,
}

impl ConfiguredWakeWord {
    pub fn new(settings: Arc<ConfigSynchronizer>) -> Self {
        Self {
            settings,
            armed: Mutex::new(None),
        }
    }

    /// Settings the listener was armed with, if running.
    pub fn armed_config(&self) -> Option<HotwordConfig> {
        self.armed.lock().clone()
    }
}

impl WakeWordListener for ConfiguredWakeWord {
    fn start(&self) -> Result<(), ServiceError> {
        let hotword = self.settings.load().hotword;
        if !hotword.enabled {
            info!("wake word disabled in config");
            *self.armed.lock() = None;
            return Ok(());
        }
        if hotword.engine == PORCUPINE_ENGINE
            && hotword.access_key.as_deref().map_or(true, |k| k.trim().is_empty())
        {
            return Err(ServiceError::Start {
                service: SERVICE.into(),
                reason: "porcupine engine needs an access key".into(),
            });
        }
        info!(
            engine = %hotword.engine,
            sensitivity = hotword.sensitivity,
            models = hotword.models.len(),
            "wake word armed"
        );
        *self.armed.lock() = Some(hotword);
        Ok(())
    }

    fn stop(&self) -> Result<(), ServiceError> {
        if self.armed.lock().take().is_some() {
            info!("wake word disarmed");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.armed.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_settings::{ConfigPaths, MemoryPreferences};
    use tempfile::TempDir;

    fn listener(hotword: serde_json::Value) -> (TempDir, ConfiguredWakeWord) {
        let dir = TempDir::new().unwrap();
        let sync = ConfigSynchronizer::new(
            ConfigPaths::under(dir.path()),
            Arc::new(MemoryPreferences::new()),
        );
        sync.write(&serde_json::json!({ "hotword": hotword }).to_string())
            .unwrap();
        (dir, ConfiguredWakeWord::new(Arc::new(sync)))
    }

    #[test]
    fn disabled_hotword_stays_off() {
        let (_dir, wake) = listener(serde_json::json!({ "enabled": false }));
        wake.start().unwrap();
        assert!(!wake.is_running());
    }

    #[test]
    fn enabled_hotword_arms_and_disarms() {
        let (_dir, wake) = listener(serde_json::json!({ "enabled": true, "sensitivity": 0.7 }));
        wake.start().unwrap();
        assert!(wake.is_running());
        assert_eq!(wake.armed_config().unwrap().sensitivity, 0.7);

        wake.stop().unwrap();
        assert!(!wake.is_running());
        wake.stop().unwrap();
    }

    #[test]
    fn porcupine_without_key_fails() {
        let (_dir, wake) = listener(serde_json::json!({ "enabled": true, "engine": "porcupine" }));
        let err = wake.start().unwrap_err();
        assert!(matches!(err, ServiceError::Start { .. }));
        assert!(!wake.is_running());
    }

    #[test]
    fn porcupine_with_key_arms() {
        let (_dir, wake) = listener(serde_json::json!({
            "enabled": true,
            "engine": "porcupine",
            "accessKey": "pk-123"
        }));
        wake.start().unwrap();
        assert_eq!(
            wake.armed_config().unwrap().access_key.as_deref(),
            Some("pk-123")
        );
    }
}
