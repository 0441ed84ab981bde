//! Application-level error type.
//!
//! Messages are constant; context lives in fields and sources are preserved.

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Settings store or host configuration failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: tessera_config::ConfigError,
    },
    /// Permission configuration could not be loaded.
    #[error("permission configuration failed")]
    Permissions {
        /// Operation identifier.
        operation: &'static str,
        /// Source authorization error.
        source: tessera_auth::AuthError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        source: tessera_api::ApiServerError,
    },
    /// Telemetry operations failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tessera_telemetry::TelemetryError,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: tessera_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn permissions(
        operation: &'static str,
        source: tessera_auth::AuthError,
    ) -> Self {
        Self::Permissions { operation, source }
    }

    pub(crate) const fn api_server(
        operation: &'static str,
        source: tessera_api::ApiServerError,
    ) -> Self {
        Self::ApiServer { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tessera_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}
