//! Configuration error types.

use thiserror::Error;

/// Errors surfaced by [`crate::ConfigSynchronizer::write`].
///
/// Reads never fail outward; they fall back to the preference mirror.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The submitted text is not a valid configuration document.
    #[error("malformed configuration: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_error_becomes_malformed() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err: ConfigError = json_err.into();
        assert!(matches!(err, ConfigError::Malformed(_)));
        assert!(err.to_string().starts_with("malformed configuration"));
    }
}
