//! Declarative mapping between document fields and mirror keys.
//!
//! Each entry ties one JSON pointer into [`ConfigDocument`] to exactly one
//! preference key. Both directions of the sync walk this table, so adding a
//! field means adding a row here and nothing else.

use serde_json::{Map, Number, Value};
use tracing::warn;

use ember_core::PrefValue;

use crate::document::{ConfigDocument, PORCUPINE_ENGINE};
use crate::mirror::PreferenceStore;

/// Scalar kind a field is mirrored as.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefKind {
    String,
    Bool,
    Int,
    Long,
    Float,
    /// Non-scalar field stored as JSON text under a string key.
    Json,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldMapping {
    pub pointer: &'static str,
    pub key: &'static str,
    pub kind: PrefKind,
}

const fn field(pointer: &'static str, key: &'static str, kind: PrefKind) -> FieldMapping {
    FieldMapping { pointer, key, kind }
}

pub static FIELD_MAPPINGS: &[FieldMapping] = &[
    field("/version", "config_version", PrefKind::String),
    field("/selectedModel", "selected_model", PrefKind::String),
    field("/mode", "ai_mode", PrefKind::String),
    field("/updatedAt", "config_updated_at", PrefKind::Long),
    field("/cloud/provider", "cloud_provider", PrefKind::String),
    field("/cloud/apiKey", "ollama_cloud_api_key", PrefKind::String),
    field("/cloud/selectedModel", "cloud_selected_model", PrefKind::String),
    field("/webSearch/enabled", "web_search_enabled", PrefKind::Bool),
    field("/webSearch/provider", "web_search_provider", PrefKind::String),
    field("/thinkingTrace/enabled", "thinking_trace_enabled", PrefKind::Bool),
    field("/thinkingTrace/lastMessage", "thinking_trace_last_message", PrefKind::String),
    field("/vision/enabled", "vision_enabled", PrefKind::Bool),
    field("/vision/preferredModel", "vision_preferred_model", PrefKind::String),
    field("/audio/enabled", "audio_enabled", PrefKind::Bool),
    field("/audio/engine", "audio_engine", PrefKind::String),
    field("/audio/preferredModel", "audio_preferred_model", PrefKind::String),
    field("/audio/language", "audio_language", PrefKind::String),
    field("/audio/prompt", "audio_prompt", PrefKind::String),
    field("/audio/captureTimeoutMs", "audio_capture_timeout_ms", PrefKind::Int),
    field("/audio/silenceThresholdDb", "audio_silence_threshold_db", PrefKind::Float),
    field("/audio/silenceDurationMs", "audio_silence_duration_ms", PrefKind::Int),
    field("/audio/mode", "audio_mode", PrefKind::String),
    field("/audio/endpoint", "audio_endpoint", PrefKind::String),
    field("/audio/apiKey", "audio_api_key", PrefKind::String),
    field("/hotword/enabled", "hotword_enabled", PrefKind::Bool),
    field("/hotword/engine", "hotword_engine", PrefKind::String),
    field("/hotword/sensitivity", "hotword_sensitivity", PrefKind::Float),
    field("/hotword/models", "hotword_models", PrefKind::Json),
    field("/hotword/accessKey", PORCUPINE_ACCESS_KEY, PrefKind::String),
    field("/hotword/model", PORCUPINE_MODEL, PrefKind::String),
    field("/hotword/keywordFile", PORCUPINE_KEYWORD_FILE, PrefKind::String),
    field("/tts/mode", "tts_mode", PrefKind::String),
    field("/tts/voice", "tts_voice", PrefKind::String),
    field("/systemPromptOverrides", "system_prompt_overrides", PrefKind::Json),
    field("/constraints/maxContextTokens", "max_context_tokens", PrefKind::Int),
    field("/constraints/maxResponseTokens", "max_response_tokens", PrefKind::Int),
];

pub const PORCUPINE_ACCESS_KEY: &str = "porcupine_access_key";
pub const PORCUPINE_MODEL: &str = "porcupine_model";
pub const PORCUPINE_KEYWORD_FILE: &str = "porcupine_keyword_file";

/// Mirror keys that only exist while porcupine is the hotword engine.
pub const PORCUPINE_KEYS: [&str; 3] = [PORCUPINE_ACCESS_KEY, PORCUPINE_MODEL, PORCUPINE_KEYWORD_FILE];

/// Look up the mapping for a preference key.
pub fn mapping_for_key(key: &str) -> Option<&'static FieldMapping> {
    FIELD_MAPPINGS.iter().find(|m| m.key == key)
}

/// Convert a document value into its mirrored scalar.
pub fn to_pref(kind: PrefKind, value: &Value) -> Option<PrefValue> {
    match kind {
        PrefKind::String => value.as_str().map(|s| PrefValue::String(s.to_string())),
        PrefKind::Bool => value.as_bool().map(PrefValue::Bool),
        PrefKind::Int => value
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .map(PrefValue::Int),
        PrefKind::Long => value.as_i64().map(PrefValue::Long),
        PrefKind::Float => value.as_f64().map(PrefValue::Float),
        PrefKind::Json => Some(PrefValue::String(value.to_string())),
    }
}

/// Convert a mirrored scalar back into a document value.
pub fn from_pref(kind: PrefKind, value: &PrefValue) -> Option<Value> {
    match kind {
        PrefKind::String => value.as_str().map(|s| Value::String(s.to_string())),
        PrefKind::Bool => value.as_bool().map(Value::Bool),
        PrefKind::Int | PrefKind::Long => value.as_i64().map(|n| Value::Number(n.into())),
        PrefKind::Float => value.as_f64().and_then(Number::from_f64).map(Value::Number),
        PrefKind::Json => value.as_str().and_then(|s| serde_json::from_str(s).ok()),
    }
}

/// Set `value` at a `/`-separated pointer, creating intermediate objects.
pub fn set_pointer(root: &mut Value, pointer: &str, value: Value) {
    let mut current = root;
    let mut segments = pointer.split('/').skip(1).peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        if segments.peek().is_none() {
            let _ = map.insert(segment.to_string(), value);
            return;
        }
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Mirror every field of `document` whose pointer is present in `present`.
///
/// `present` is the raw input the document was parsed from; fields it does
/// not mention are left untouched in the mirror. Porcupine keys are removed
/// whenever the document's engine is not porcupine.
pub fn apply_to_mirror(present: &Value, document: &ConfigDocument, prefs: &dyn PreferenceStore) {
    let canonical = match serde_json::to_value(document) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to encode configuration for mirroring");
            return;
        }
    };
    let porcupine = document.hotword.engine == PORCUPINE_ENGINE;

    for m in FIELD_MAPPINGS {
        if !porcupine && PORCUPINE_KEYS.contains(&m.key) {
            prefs.remove(m.key);
            continue;
        }
        if present.pointer(m.pointer).is_none() {
            continue;
        }
        let Some(value) = canonical.pointer(m.pointer) else {
            // Optional field cleared by this input.
            prefs.remove(m.key);
            continue;
        };
        match to_pref(m.kind, value) {
            Some(pref) => prefs.put(m.key, pref),
            None => warn!(key = m.key, "configuration field has unexpected shape, not mirrored"),
        }
    }
}

/// Mirror every field of `document`.
pub fn mirror_document(document: &ConfigDocument, prefs: &dyn PreferenceStore) {
    match serde_json::to_value(document) {
        Ok(full) => apply_to_mirror(&full, document, prefs),
        Err(e) => warn!(error = %e, "failed to encode configuration for mirroring"),
    }
}

/// Rebuild a total document from the mirror.
///
/// Starts from the defaults and overlays each mirrored key. A key whose value
/// would make the document invalid is skipped. Porcupine fields are dropped
/// unless the rebuilt engine is porcupine.
pub fn rebuild_from_mirror(prefs: &dyn PreferenceStore) -> ConfigDocument {
    let mut document = ConfigDocument::default();
    let mut value = match serde_json::to_value(&document) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to encode default configuration");
            return document;
        }
    };

    for m in FIELD_MAPPINGS {
        let Some(pref) = prefs.get(m.key) else {
            continue;
        };
        let Some(field_value) = from_pref(m.kind, &pref) else {
            warn!(key = m.key, kind = pref.kind(), "mirrored value has wrong kind, skipped");
            continue;
        };

        let mut candidate = value.clone();
        set_pointer(&mut candidate, m.pointer, field_value);
        match serde_json::from_value::<ConfigDocument>(candidate.clone()) {
            Ok(parsed) => {
                value = candidate;
                document = parsed;
            }
            Err(e) => warn!(key = m.key, error = %e, "mirrored value rejected"),
        }
    }

    let _ = document.redact_hotword();
    document
}
