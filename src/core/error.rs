//! Error types shared by every release stage.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Errors that can occur while detecting, recording or publishing a release.
#[derive(Debug, Error)]
pub enum ReleaseError {
    /// Missing or malformed configuration input (environment, flags, config file).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// File read or write failure.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// File the operation was working on
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// An expected key is absent from a structured document.
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// A value does not have the expected shape.
    #[error("Format error: {0}")]
    Format(String),

    /// JSON could not be parsed or produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML could not be parsed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ReleaseError {
    /// Wrap an IO error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Build a lookup error for a missing key path such as `engine.worker.tag`.
    pub fn missing_key(path: &[&str], document: &str) -> Self {
        Self::Lookup(format!("key '{}' not found in {}", path.join("."), document))
    }
}
