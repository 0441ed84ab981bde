//! Error types for settings operations.

use std::num::{ParseFloatError, ParseIntError};

use tessera_data::DataError;
use thiserror::Error;

/// Primary error type for settings operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Key rejected by the key policy during field validation.
    #[error("configuration key is not allowed")]
    KeyNotAllowed {
        /// Key supplied by the caller.
        key: String,
    },
    /// Key rejected by the key policy at the persistence boundary.
    ///
    /// Only reachable when field validation was skipped or wrong; callers
    /// report it as a failed save.
    #[error("configuration key blocked at persistence")]
    KeyBlockedAtPersistence {
        /// Key that reached the persistence boundary.
        key: String,
    },
    /// A write-path field failed validation.
    #[error("invalid setting field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when it is safe to echo.
        value: Option<String>,
    },
    /// Another record already uses the key.
    #[error("configuration key already exists")]
    DuplicateKey {
        /// Conflicting key.
        key: String,
    },
    /// No encryption secret was configured.
    #[error("encryption key is not configured")]
    MissingEncryptionKey,
    /// The configured encryption secret is shorter than required.
    #[error("encryption key is too short")]
    WeakEncryptionKey {
        /// Minimum accepted length in bytes.
        min_len: usize,
        /// Length supplied.
        actual_len: usize,
    },
    /// Authenticated encryption failed.
    #[error("failed to encrypt value")]
    Encryption,
    /// A stored value could not be cast to its declared type.
    #[error("failed to decode setting value")]
    Decode {
        /// Declared type tag.
        setting_type: String,
        /// Underlying parse failure.
        source: DecodeError,
    },
    /// No record exists with the identifier.
    #[error("setting not found")]
    NotFound {
        /// Identifier requested.
        id: i64,
    },
    /// Persistence layer failure.
    #[error("data access failed")]
    DataAccess {
        /// Operation identifier.
        operation: &'static str,
        /// Source data-layer error.
        source: DataError,
    },
    /// The registry reload that follows a write failed.
    #[error("configuration reload failed")]
    Reload {
        /// Cause of the reload failure.
        source: Box<ConfigError>,
    },
    /// A host environment setting was malformed.
    #[error("invalid host setting")]
    InvalidHostSetting {
        /// Environment variable name.
        name: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value.
        value: String,
    },
}

impl ConfigError {
    /// Whether the failure came from the key policy, at either boundary.
    #[must_use]
    pub const fn is_key_rejection(&self) -> bool {
        matches!(
            self,
            Self::KeyNotAllowed { .. } | Self::KeyBlockedAtPersistence { .. }
        )
    }
}

/// Cast failures for typed setting values.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Integer parsing failed.
    #[error("invalid integer")]
    Integer(#[from] ParseIntError),
    /// Float parsing failed.
    #[error("invalid float")]
    Float(#[from] ParseFloatError),
    /// Float parsed but is NaN or infinite.
    #[error("float is not finite")]
    NonFiniteFloat,
    /// JSON parsing failed.
    #[error("malformed json")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for settings results.
pub type ConfigResult<T> = Result<T, ConfigError>;
