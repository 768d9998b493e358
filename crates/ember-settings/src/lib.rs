//! # ember-settings
//!
//! The AI configuration document and its flat preference mirror.
//!
//! `ai_config.json` lives at `~/.ember/config/ai_config.json`. Every field is
//! also mirrored into a flat key/value store (the `preferences` table of the
//! runtime database) through [`mapping::FIELD_MAPPINGS`]. When the file is
//! missing or unreadable, the mirror is the source of truth and the file is
//! rebuilt from it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use ember_settings::{ConfigPaths, ConfigSynchronizer, MemoryPreferences};
//!
//! let sync = ConfigSynchronizer::new(ConfigPaths::default(), Arc::new(MemoryPreferences::new()));
//! let doc = sync.load();
//! println!("mode: {}", doc.mode.as_str());
//! ```

#![deny(unsafe_code)]

pub mod document;
pub mod errors;
pub mod mapping;
pub mod mirror;
pub mod paths;
pub mod sync;

pub use document::{AiMode, ConfigDocument, HotwordConfig, HotwordModel, PORCUPINE_ENGINE};
pub use errors::{ConfigError, Result};
pub use mirror::{MemoryPreferences, PreferenceStore};
pub use paths::ConfigPaths;
pub use sync::ConfigSynchronizer;
