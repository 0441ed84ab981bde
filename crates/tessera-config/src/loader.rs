//! Host settings read from the process environment at boot.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::codec::ValueCodec;
use crate::error::{ConfigError, ConfigResult};
use crate::model::TypedValue;
use crate::registry::AppEnvironment;

/// Listener address used when `TESSERA_BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:7070";

/// Settings supplied by the host rather than by stored records.
#[derive(Clone, PartialEq, Eq)]
pub struct HostSettings {
    /// Secret the value encryption key is derived from.
    pub encryption_key: Option<String>,
    /// `PostgreSQL` connection string; absent means in-memory storage.
    pub database_url: Option<String>,
    /// API listener address.
    pub bind_addr: SocketAddr,
    /// Optional YAML/JSON permission overrides.
    pub permissions_file: Option<PathBuf>,
    /// Log level filter.
    pub log_level: String,
    /// Log format override (`json` or `pretty`).
    pub log_format: Option<String>,
    /// Host debug flag.
    pub debug: bool,
    /// Whether `X-Forwarded-Proto` is trusted when deriving the base URL.
    pub trust_proxy: bool,
}

impl fmt::Debug for HostSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostSettings")
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("bind_addr", &self.bind_addr)
            .field("permissions_file", &self.permissions_file)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .field("debug", &self.debug)
            .field("trust_proxy", &self.trust_proxy)
            .finish()
    }
}

impl HostSettings {
    /// Read settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostSetting`] for malformed values.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidHostSetting`] for malformed values.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let present = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bind_raw = present("TESSERA_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr =
            bind_raw
                .trim()
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidHostSetting {
                    name: "TESSERA_BIND_ADDR",
                    reason: "invalid socket address",
                    value: bind_raw.clone(),
                })?;

        let log_format = present("TESSERA_LOG_FORMAT").map(|raw| raw.trim().to_ascii_lowercase());
        if let Some(format) = &log_format
            && format != "json"
            && format != "pretty"
        {
            return Err(ConfigError::InvalidHostSetting {
                name: "TESSERA_LOG_FORMAT",
                reason: "expected json or pretty",
                value: format.clone(),
            });
        }

        Ok(Self {
            encryption_key: lookup("TESSERA_ENCRYPTION_KEY"),
            database_url: present("DATABASE_URL"),
            bind_addr,
            permissions_file: present("TESSERA_PERMISSIONS_FILE").map(PathBuf::from),
            log_level: present("TESSERA_LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_format,
            debug: flag(present("TESSERA_DEBUG").as_deref()),
            trust_proxy: flag(present("TESSERA_TRUST_PROXY").as_deref()),
        })
    }

    /// Codec keyed by the configured secret.
    #[must_use]
    pub fn codec(&self) -> ValueCodec {
        ValueCodec::from_secret(self.encryption_key.as_deref())
    }

    /// Host values published underneath stored records.
    #[must_use]
    pub fn base_values(&self) -> Vec<(&'static str, TypedValue)> {
        vec![("debug", TypedValue::Boolean(self.debug))]
    }

    /// Post-reload environment hook for this host.
    #[must_use]
    pub const fn environment_hook(&self) -> AppEnvironment {
        AppEnvironment::new(self.trust_proxy)
    }
}

fn flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}
