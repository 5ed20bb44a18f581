//! Error types for configuration loading and validation

use thiserror::Error;

use crate::collection::ValidationError;

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON5 error: {0}")]
    Json5(#[from] json5::Error),

    #[error("Options error: {0}")]
    Options(#[from] config_crate::ConfigError),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("No configuration item for \"{parent}\", so \"{path}\" cannot be set")]
    MissingParent { parent: String, path: String },

    #[error("Missing environment variables {names} at {path}")]
    MissingEnv { names: String, path: String },

    #[error("No config sources found")]
    NoSources,

    /// Raised by a strict error collection on the first added error.
    #[error("Strict mode: got {count} validation error(s)")]
    StrictViolation {
        count: usize,
        errors: Vec<ValidationError>,
    },
}

impl ConfigError {
    /// Whether an entrypoint should terminate the process on this error
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ConfigError::StrictViolation { .. } | ConfigError::NoSources | ConfigError::MissingEnv { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ConfigError::NoSources.is_fatal());
        assert!(ConfigError::StrictViolation { count: 1, errors: Vec::new() }.is_fatal());
        assert!(!ConfigError::InvalidPath("a..b".to_string()).is_fatal());
    }

    #[test]
    fn test_missing_parent_message() {
        let err = ConfigError::MissingParent {
            parent: "app.db".to_string(),
            path: "app.db.host".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No configuration item for \"app.db\", so \"app.db.host\" cannot be set"
        );
    }
}
