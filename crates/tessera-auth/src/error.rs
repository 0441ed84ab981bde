//! Error types for permission configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading permission configuration.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The overrides file could not be read.
    #[error("failed to read permission configuration")]
    Io {
        /// File that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// YAML overrides did not parse.
    #[error("invalid permission configuration yaml")]
    Yaml {
        /// Parser error.
        source: serde_yaml::Error,
    },
    /// JSON overrides did not parse.
    #[error("invalid permission configuration json")]
    Json {
        /// Parser error.
        source: serde_json::Error,
    },
    /// A field held an unusable value.
    #[error("invalid permission setting")]
    InvalidSetting {
        /// Offending field.
        field: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
}

/// Convenience alias for authorization results.
pub type AuthResult<T> = Result<T, AuthError>;
