//! The nested configuration document persisted as `ai_config.json`.
//!
//! Every section deserializes with `default`, so a partial document fills in
//! the compiled defaults. A field of the wrong type is still an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Hotword engine whose credentials may be stored in the document.
pub const PORCUPINE_ENGINE: &str = "porcupine";

/// Where completions are served from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiMode {
    Local,
    #[default]
    Cloud,
}

impl AiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Cloud => "cloud",
        }
    }
}

/// Root configuration document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigDocument {
    pub version: String,
    pub selected_model: String,
    pub mode: AiMode,
    /// Epoch milliseconds of the last successful write.
    pub updated_at: i64,
    pub cloud: CloudConfig,
    pub web_search: WebSearchConfig,
    pub thinking_trace: ThinkingTraceConfig,
    pub vision: VisionConfig,
    pub audio: AudioConfig,
    pub hotword: HotwordConfig,
    pub tts: TtsConfig,
    /// Persona key to system prompt.
    pub system_prompt_overrides: BTreeMap<String, String>,
    pub constraints: Constraints,
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            selected_model: "gpt-oss:120b".to_string(),
            mode: AiMode::Cloud,
            updated_at: 0,
            cloud: CloudConfig::default(),
            web_search: WebSearchConfig::default(),
            thinking_trace: ThinkingTraceConfig::default(),
            vision: VisionConfig::default(),
            audio: AudioConfig::default(),
            hotword: HotwordConfig::default(),
            tts: TtsConfig::default(),
            system_prompt_overrides: BTreeMap::new(),
            constraints: Constraints::default(),
        }
    }
}

impl ConfigDocument {
    /// Strip porcupine credentials unless porcupine is the active engine.
    /// Returns `true` if anything was removed.
    pub fn redact_hotword(&mut self) -> bool {
        if self.hotword.engine == PORCUPINE_ENGINE {
            return false;
        }
        let hw = &mut self.hotword;
        let removed = hw.access_key.is_some() || hw.model.is_some() || hw.keyword_file.is_some();
        hw.access_key = None;
        hw.model = None;
        hw.keyword_file = None;
        removed
    }

    /// API key for the cloud provider, if one is configured.
    pub fn api_key(&self) -> Option<&str> {
        let key = self.cloud.api_key.trim();
        (!key.is_empty()).then_some(key)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudConfig {
    pub provider: String,
    pub api_key: String,
    pub selected_model: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            api_key: String::new(),
            selected_model: "gpt-oss:120b".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebSearchConfig {
    pub enabled: bool,
    pub provider: String,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "duckduckgo".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThinkingTraceConfig {
    pub enabled: bool,
    pub last_message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisionConfig {
    pub enabled: bool,
    pub preferred_model: String,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            preferred_model: "llava".to_string(),
        }
    }
}

/// Speech capture and transcription settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioConfig {
    pub enabled: bool,
    pub engine: String,
    pub preferred_model: String,
    pub language: String,
    pub prompt: String,
    pub capture_timeout_ms: i32,
    pub silence_threshold_db: f64,
    pub silence_duration_ms: i32,
    pub mode: String,
    pub endpoint: String,
    pub api_key: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            engine: "whisper".to_string(),
            preferred_model: "whisper-1".to_string(),
            language: "en".to_string(),
            prompt: String::new(),
            capture_timeout_ms: 8000,
            silence_threshold_db: -40.0,
            silence_duration_ms: 1500,
            mode: "local".to_string(),
            endpoint: String::new(),
            api_key: String::new(),
        }
    }
}

/// Wake-word detection settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HotwordConfig {
    pub enabled: bool,
    pub engine: String,
    pub sensitivity: f64,
    pub models: Vec<HotwordModel>,
    /// Porcupine only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    /// Porcupine only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Porcupine only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_file: Option<String>,
}

impl Default for HotwordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            engine: "openwakeword".to_string(),
            sensitivity: 0.5,
            models: vec![HotwordModel {
                name: "hey_ember".to_string(),
                asset: "hey_ember.onnx".to_string(),
                threshold: 0.5,
            }],
            access_key: None,
            model: None,
            keyword_file: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HotwordModel {
    pub name: String,
    pub asset: String,
    pub threshold: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TtsConfig {
    pub mode: String,
    pub voice: String,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            mode: "system".to_string(),
            voice: "default".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    pub max_context_tokens: i32,
    pub max_response_tokens: i32,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_context_tokens: 8192,
            max_response_tokens: 1024,
        }
    }
}
