//! Error types for the recognizer engine
//!
//! Structured error definitions using thiserror, with an anyhow bridge so
//! plugin implementors can propagate arbitrary errors through the plugin
//! contract.

use thiserror::Error;

/// Main error type for recognizer operations
#[derive(Error, Debug)]
pub enum RecognizerError {
    /// A plugin's run failed
    #[error("Plugin '{name}' failed: {message}")]
    Plugin { name: String, message: String },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for recognizer operations
pub type Result<T> = std::result::Result<T, RecognizerError>;

/// Convert anyhow::Error to RecognizerError
impl From<anyhow::Error> for RecognizerError {
    fn from(err: anyhow::Error) -> Self {
        RecognizerError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RecognizerError::Plugin {
            name: "quantity".to_string(),
            message: "bad pattern".to_string(),
        };
        assert_eq!(err.to_string(), "Plugin 'quantity' failed: bad pattern");
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: RecognizerError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, RecognizerError::Other(_)));
        assert_eq!(err.to_string(), "boom");
    }
}
