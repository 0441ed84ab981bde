//! Environment loading, storage selection and API wiring.
//!
//! # Design
//! - Without `DATABASE_URL` the service runs on in-memory storage and says so.
//! - The startup reload is best effort: failures are logged and the base
//!   configuration stays published.

use std::sync::Arc;

use tessera_api::{ApiServer, ApiState};
use tessera_auth::{PermissionConfig, PermissionResolver};
use tessera_config::{
    ConfigRegistry, ConfigStore, HostSettings, MemorySettingsRepository, PgSettingsRepository,
    ReloadReport, SettingsRepository,
};
use tessera_telemetry::{LogFormat, LoggingConfig};
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

/// Dependencies required to bootstrap the service.
pub(crate) struct BootstrapDependencies {
    host: HostSettings,
    permissions: PermissionConfig,
    repository: Arc<dyn SettingsRepository>,
}

impl BootstrapDependencies {
    /// Build dependencies for already-parsed host settings.
    pub(crate) async fn from_host(host: HostSettings) -> AppResult<Self> {
        let permissions = match &host.permissions_file {
            Some(path) => PermissionConfig::load(path)
                .map_err(|err| AppError::permissions("permissions.load", err))?,
            None => PermissionConfig::default(),
        };

        let repository: Arc<dyn SettingsRepository> = match &host.database_url {
            Some(url) => Arc::new(
                PgSettingsRepository::connect(url)
                    .await
                    .map_err(|err| AppError::config("settings_repository.connect", err))?,
            ),
            None => {
                warn!("DATABASE_URL is not set; settings are kept in memory only");
                Arc::new(MemorySettingsRepository::new())
            }
        };

        Ok(Self {
            host,
            permissions,
            repository,
        })
    }

    /// Registry over the selected storage, with host base values and the
    /// environment hook installed.
    pub(crate) fn registry(&self) -> ConfigRegistry {
        ConfigRegistry::builder(Arc::clone(&self.repository))
            .codec(self.host.codec())
            .base_values(self.host.base_values())
            .hook(Arc::new(self.host.environment_hook()))
            .build()
    }
}

/// Load stored settings once at startup.
///
/// Failure is logged and the service keeps running on base configuration.
pub(crate) async fn initial_load(registry: &ConfigRegistry) -> Option<ReloadReport> {
    match registry.reload().await {
        Ok(report) => {
            info!(
                revision = report.revision,
                applied = report.applied,
                skipped = report.skipped.len(),
                "stored settings loaded"
            );
            Some(report)
        }
        Err(err) => {
            warn!(
                error = %err,
                "initial settings load failed; continuing with base configuration"
            );
            None
        }
    }
}

/// Entry point for the boot sequence.
///
/// # Errors
///
/// Returns an error when host settings are malformed, logging cannot be
/// installed, storage or permission configuration cannot be opened, or the
/// listener fails.
pub async fn run_app() -> AppResult<()> {
    let host = HostSettings::from_env()
        .map_err(|err| AppError::config("host_settings.from_env", err))?;

    let format = LogFormat::from_override(host.log_format.as_deref())
        .map_err(|err| AppError::telemetry("telemetry.log_format", err))?;
    let logging = LoggingConfig {
        level: &host.log_level,
        format,
        ..LoggingConfig::default()
    };
    tessera_telemetry::init_logging(&logging)
        .map_err(|err| AppError::telemetry("telemetry.init", err))?;

    info!(bind_addr = %host.bind_addr, "tessera bootstrap starting");
    let bind_addr = host.bind_addr;
    let dependencies = BootstrapDependencies::from_host(host).await?;
    let registry = Arc::new(dependencies.registry());
    initial_load(&registry).await;

    let state = ApiState::new(
        ConfigStore::new(registry),
        PermissionResolver::new(Arc::new(dependencies.permissions)),
    );
    ApiServer::new(state)
        .serve(bind_addr)
        .await
        .map_err(|err| AppError::api_server("api_server.serve", err))?;
    info!("API server shutdown complete");
    Ok(())
}
