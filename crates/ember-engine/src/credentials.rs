use secrecy::SecretString;

use ember_settings::{AiMode, ConfigDocument, ConfigSynchronizer};

/// Everything the provider chain needs for one request.
#[derive(Clone, Debug)]
pub struct ProviderSettings {
    pub api_key: SecretString,
    pub mode: AiMode,
    /// Model for the chat-completions provider.
    pub chat_model: String,
    pub system_prompt: Option<String>,
    pub max_tokens: Option<u32>,
}

impl ProviderSettings {
    /// Settings for `persona`, or `None` when no API key is configured.
    pub fn from_document(doc: &ConfigDocument, persona: &str) -> Option<Self> {
        let api_key = doc.api_key()?;
        let chat_model = if doc.cloud.selected_model.trim().is_empty() {
            doc.selected_model.clone()
        } else {
            doc.cloud.selected_model.clone()
        };
        Some(Self {
            api_key: SecretString::from(api_key),
            mode: doc.mode,
            chat_model,
            system_prompt: doc.system_prompt_overrides.get(persona).cloned(),
            max_tokens: u32::try_from(doc.constraints.max_response_tokens).ok(),
        })
    }
}

/// Source of provider credentials and per-persona settings.
pub trait CredentialSource: Send + Sync {
    fn provider_settings(&self, persona: &str) -> Option<ProviderSettings>;
}

impl CredentialSource for ConfigSynchronizer {
    fn provider_settings(&self, persona: &str) -> Option<ProviderSettings> {
        ProviderSettings::from_document(&self.current(), persona)
    }
}

/// Fixed settings, for tests and hosts without a config file.
#[derive(Clone, Debug, Default)]
pub struct StaticCredentials(pub Option<ConfigDocument>);

impl CredentialSource for StaticCredentials {
    fn provider_settings(&self, persona: &str) -> Option<ProviderSettings> {
        self.0
            .as_ref()
            .and_then(|doc| ProviderSettings::from_document(doc, persona))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use ember_core::PrefValue;
    use ember_settings::{ConfigPaths, MemoryPreferences, PreferenceStore};

    /// Mirror that counts mutations.
    #[derive(Default)]
    struct CountingPreferences {
        inner: MemoryPreferences,
        writes: AtomicUsize,
    }

    impl PreferenceStore for CountingPreferences {
        fn get(&self, key: &str) -> Option<PrefValue> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: PrefValue) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.put(key, value);
        }

        fn remove(&self, key: &str) {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.remove(key);
        }
    }

    fn doc_with_key(key: &str) -> ConfigDocument {
        let mut doc = ConfigDocument::default();
        doc.cloud.api_key = key.into();
        doc
    }

    #[test]
    fn no_key_means_no_settings() {
        assert!(ProviderSettings::from_document(&ConfigDocument::default(), "assistant").is_none());
        assert!(StaticCredentials(None).provider_settings("assistant").is_none());
    }

    #[test]
    fn settings_carry_key_model_and_overrides() {
        let mut doc = doc_with_key("sk-1");
        doc.cloud.selected_model = "gpt-oss:20b".into();
        doc.system_prompt_overrides
            .insert("casual".into(), "Keep it short.".into());
        doc.constraints.max_response_tokens = 512;

        let s = ProviderSettings::from_document(&doc, "casual").unwrap();
        assert_eq!(s.api_key.expose_secret(), "sk-1");
        assert_eq!(s.chat_model, "gpt-oss:20b");
        assert_eq!(s.system_prompt.as_deref(), Some("Keep it short."));
        assert_eq!(s.max_tokens, Some(512));

        let s = ProviderSettings::from_document(&doc, "technical").unwrap();
        assert!(s.system_prompt.is_none());
    }

    #[test]
    fn blank_cloud_model_falls_back_to_selected_model() {
        let mut doc = doc_with_key("sk");
        doc.cloud.selected_model = " ".into();
        doc.selected_model = "qwen3-coder:480b".into();
        let s = ProviderSettings::from_document(&doc, "assistant").unwrap();
        assert_eq!(s.chat_model, "qwen3-coder:480b");
    }

    #[test]
    fn synchronizer_is_a_credential_source() {
        let dir = tempfile::tempdir().unwrap();
        let sync = ConfigSynchronizer::new(
            ConfigPaths::under(dir.path()),
            Arc::new(MemoryPreferences::new()),
        );
        assert!(sync.provider_settings("assistant").is_none());

        sync.write(r#"{"cloud":{"apiKey":"sk-live"}}"#).unwrap();
        let s = sync.provider_settings("assistant").unwrap();
        assert_eq!(s.api_key.expose_secret(), "sk-live");
    }

    #[test]
    fn lookups_leave_file_and_mirror_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Arc::new(CountingPreferences::default());
        let sync = ConfigSynchronizer::new(ConfigPaths::under(dir.path()), prefs.clone());
        sync.write(r#"{"cloud":{"apiKey":"sk-live"}}"#).unwrap();

        let writes = prefs.writes.load(Ordering::SeqCst);
        let modified = std::fs::metadata(&sync.paths().current)
            .unwrap()
            .modified()
            .unwrap();
        for persona in ["assistant", "casual", "technical"] {
            assert!(sync.provider_settings(persona).is_some());
        }
        assert_eq!(prefs.writes.load(Ordering::SeqCst), writes);
        assert_eq!(
            std::fs::metadata(&sync.paths().current)
                .unwrap()
                .modified()
                .unwrap(),
            modified
        );
    }
}
