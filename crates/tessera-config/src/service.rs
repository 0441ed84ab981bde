//! Write path for settings: validation, the persistence guard, encryption and
//! the reload that follows every successful write.
//!
//! # Design
//! - Field validation first, then the key guard, encryption, the write and a
//!   synchronous reload.
//! - `save_new`/`save_existing` skip field validation but never the key guard.
//! - An empty value for an encrypted record keeps the stored ciphertext.

use std::sync::Arc;

use tracing::{error, info, instrument, warn};

use crate::codec::{ValueCodec, cast_value};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    DEFAULT_MODULE, NewSetting, SettingInput, SettingRecord, SettingType, SettingsFilter,
    SettingsPage, UpdateOutcome,
};
use crate::registry::{ConfigRegistry, ReloadReport};
use crate::repository::SettingsRepository;

/// Longest accepted key, type tag or module label.
pub const MAX_FIELD_LEN: usize = 255;

/// CRUD over setting records, reloading the registry after each write.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    registry: Arc<ConfigRegistry>,
}

fn invalid(field: &'static str, reason: &'static str, value: Option<&str>) -> ConfigError {
    ConfigError::InvalidField {
        field,
        reason,
        value: value.map(str::to_string),
    }
}

fn bounded(field: &'static str, value: &str) -> ConfigResult<()> {
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(invalid(field, "too_long", None));
    }
    Ok(())
}

fn required<'a>(field: &'static str, value: Option<&'a str>) -> ConfigResult<&'a str> {
    match value {
        None => Err(invalid(field, "required", None)),
        Some("") => Err(invalid(field, "empty", None)),
        Some(value) => {
            bounded(field, value)?;
            Ok(value)
        }
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.is_empty())
}

impl ConfigStore {
    /// Store writing through the registry's repository.
    #[must_use]
    pub const fn new(registry: Arc<ConfigRegistry>) -> Self {
        Self { registry }
    }

    /// Registry refreshed by this store.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    fn repository(&self) -> &Arc<dyn SettingsRepository> {
        self.registry.repository()
    }

    fn codec(&self) -> &ValueCodec {
        self.registry.codec()
    }

    /// One page of records.
    ///
    /// # Errors
    ///
    /// Returns an error when storage cannot be read.
    pub async fn list(&self, filter: &SettingsFilter) -> ConfigResult<SettingsPage> {
        self.repository().list(filter).await
    }

    /// One record by identifier.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] for an unknown identifier.
    pub async fn get(&self, id: i64) -> ConfigResult<SettingRecord> {
        self.repository()
            .fetch(id)
            .await?
            .ok_or(ConfigError::NotFound { id })
    }

    /// Validate and create a record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`], [`ConfigError::KeyNotAllowed`]
    /// or [`ConfigError::Decode`] for rejected input, plus any persistence,
    /// encryption or reload failure.
    #[instrument(name = "config_store.create", skip_all)]
    pub async fn create(&self, input: SettingInput) -> ConfigResult<SettingRecord> {
        let setting = self.validate_new(input)?;
        self.save_new(setting).await
    }

    fn validate_new(&self, input: SettingInput) -> ConfigResult<NewSetting> {
        let key = required("config_key", input.config_key.as_deref())?;
        if !self.registry.policy().is_allowed(key) {
            return Err(ConfigError::KeyNotAllowed {
                key: key.to_string(),
            });
        }
        let setting_type = SettingType::parse(required("type", input.setting_type.as_deref())?);
        let value = required("value", input.value.as_deref())?;
        if !setting_type.is_encrypted() {
            cast_value(value, &setting_type)?;
        }
        let module = match optional_text(input.module) {
            Some(module) => {
                bounded("module", &module)?;
                module
            }
            None => DEFAULT_MODULE.to_string(),
        };

        Ok(NewSetting {
            module: Some(module),
            key: key.to_string(),
            raw_value: value.to_string(),
            setting_type,
            options: optional_text(input.options),
        })
    }

    /// Persist a new record without field validation.
    ///
    /// The key policy is still enforced here and encrypted values are
    /// encrypted before they reach storage.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KeyBlockedAtPersistence`] for a disallowed key,
    /// plus any encryption, persistence or reload failure.
    pub async fn save_new(&self, mut setting: NewSetting) -> ConfigResult<SettingRecord> {
        self.guard_key(&setting.key)?;
        if setting.setting_type.is_encrypted() {
            setting.raw_value = self.codec().encrypt(&setting.raw_value)?;
        }
        let record = self.repository().insert(&setting).await?;
        info!(id = record.id, key = %record.key, "setting created");
        self.reload_after("create").await?;
        Ok(record)
    }

    /// Apply an update to an existing record.
    ///
    /// Omitted fields keep their stored values. For encrypted records an
    /// empty or omitted value keeps the stored ciphertext untouched; when
    /// nothing else changes the request is a no-op and no reload happens.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`], [`ConfigError::InvalidField`] or
    /// [`ConfigError::Decode`] for rejected input, plus any persistence,
    /// encryption or reload failure.
    #[instrument(name = "config_store.update", skip(self, input))]
    pub async fn update(&self, id: i64, input: SettingInput) -> ConfigResult<UpdateOutcome> {
        let current = self.get(id).await?;
        match Self::plan_update(&current, input)? {
            None => {
                info!(id, key = %current.key, "update left setting unchanged");
                Ok(UpdateOutcome::Unchanged(current))
            }
            Some((record, value_changed)) => self
                .save_existing(record, value_changed)
                .await
                .map(UpdateOutcome::Saved),
        }
    }

    fn plan_update(
        current: &SettingRecord,
        input: SettingInput,
    ) -> ConfigResult<Option<(SettingRecord, bool)>> {
        if let Some(key) = input.config_key.as_deref()
            && !key.is_empty()
            && key != current.key
        {
            return Err(invalid("config_key", "immutable", Some(key)));
        }
        let setting_type = match input.setting_type.as_deref() {
            Some(tag) => SettingType::parse(required("type", Some(tag))?),
            None => current.setting_type.clone(),
        };

        let mut next = current.clone();
        let mut value_changed = false;
        match input.value.as_deref() {
            None | Some("") if setting_type.is_encrypted() => {
                if !current.setting_type.is_encrypted() {
                    return Err(invalid("value", "required", None));
                }
            }
            Some("") => return Err(invalid("value", "empty", None)),
            None => {
                if current.setting_type.is_encrypted() && !setting_type.is_encrypted() {
                    return Err(invalid("value", "required", None));
                }
                cast_value(&current.raw_value, &setting_type)?;
            }
            Some(value) => {
                if !setting_type.is_encrypted() {
                    cast_value(value, &setting_type)?;
                }
                value_changed = setting_type.is_encrypted() || value != current.raw_value;
                next.raw_value = value.to_string();
            }
        }
        next.setting_type = setting_type;

        if let Some(module) = input.module {
            if !module.is_empty() {
                bounded("module", &module)?;
            }
            next.module = optional_text(Some(module));
        }
        if let Some(options) = input.options {
            next.options = optional_text(Some(options));
        }

        if !value_changed && next == *current {
            return Ok(None);
        }
        Ok(Some((next, value_changed)))
    }

    /// Persist changes to an existing record without field validation.
    ///
    /// When the record is encrypted and `value_changed` is set, `raw_value`
    /// holds plaintext and is encrypted before it is written. Otherwise the
    /// stored value is written back as given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KeyBlockedAtPersistence`] for a disallowed key,
    /// plus any encryption, persistence or reload failure.
    pub async fn save_existing(
        &self,
        mut record: SettingRecord,
        value_changed: bool,
    ) -> ConfigResult<SettingRecord> {
        self.guard_key(&record.key)?;
        if record.setting_type.is_encrypted() && value_changed {
            record.raw_value = self.codec().encrypt(&record.raw_value)?;
        }
        let saved = self.repository().update(&record).await?;
        info!(id = saved.id, key = %saved.key, "setting updated");
        self.reload_after("update").await?;
        Ok(saved)
    }

    /// Delete a record.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] for an unknown identifier, plus any
    /// persistence or reload failure.
    #[instrument(name = "config_store.delete", skip(self))]
    pub async fn delete(&self, id: i64) -> ConfigResult<()> {
        if !self.repository().delete(id).await? {
            return Err(ConfigError::NotFound { id });
        }
        info!(id, "setting deleted");
        self.reload_after("delete").await?;
        Ok(())
    }

    fn guard_key(&self, key: &str) -> ConfigResult<()> {
        if self.registry.policy().is_allowed(key) {
            return Ok(());
        }
        warn!(
            security = true,
            key = %key,
            "blocked write of disallowed configuration key"
        );
        Err(ConfigError::KeyBlockedAtPersistence {
            key: key.to_string(),
        })
    }

    async fn reload_after(&self, operation: &'static str) -> ConfigResult<ReloadReport> {
        self.registry.reload().await.map_err(|source| {
            error!(operation, error = %source, "reload after write failed");
            ConfigError::Reload {
                source: Box::new(source),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypedValue;
    use crate::repository::MemorySettingsRepository;

    const SECRET: &str = "store-unit-test-secret-long-enough-000";

    fn store() -> ConfigStore {
        let registry = ConfigRegistry::builder(Arc::new(MemorySettingsRepository::new()))
            .codec(ValueCodec::from_secret(Some(SECRET)))
            .build();
        ConfigStore::new(Arc::new(registry))
    }

    fn field_reason(err: &ConfigError) -> Option<(&'static str, &'static str)> {
        match err {
            ConfigError::InvalidField { field, reason, .. } => Some((*field, *reason)),
            _ => None,
        }
    }

    #[tokio::test]
    async fn create_validates_fields() {
        let store = store();
        let cases = [
            (SettingInput::default(), ("config_key", "required")),
            (SettingInput::new("", "x", "string"), ("config_key", "empty")),
            (SettingInput::new(&"A".repeat(300), "x", "string"), ("config_key", "too_long")),
            (
                SettingInput {
                    setting_type: None,
                    ..SettingInput::new("App.name", "x", "string")
                },
                ("type", "required"),
            ),
            (SettingInput::new("App.name", "", "string"), ("value", "empty")),
        ];
        for (input, expected) in cases {
            let err = store.create(input).await.expect_err("invalid input");
            assert_eq!(field_reason(&err), Some(expected));
        }
    }

    #[tokio::test]
    async fn create_rejects_blocked_key_at_validation() {
        let err = store()
            .create(SettingInput::new("Security.salt", "x", "string"))
            .await
            .expect_err("blocked");
        assert!(matches!(err, ConfigError::KeyNotAllowed { .. }));
    }

    #[tokio::test]
    async fn save_new_blocks_key_even_without_validation() {
        let store = store();
        let err = store
            .save_new(NewSetting {
                module: None,
                key: "Datasources.default.password".into(),
                raw_value: "hunter2".into(),
                setting_type: SettingType::String,
                options: None,
            })
            .await
            .expect_err("blocked at persistence");
        assert!(matches!(err, ConfigError::KeyBlockedAtPersistence { .. }));
        let page = store.list(&SettingsFilter::default()).await.expect("lists");
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn updates_of_blocked_rows_stop_at_persistence() -> ConfigResult<()> {
        let repo = MemorySettingsRepository::with_records([NewSetting {
            module: None,
            key: "Security.salt".into(),
            raw_value: "original".into(),
            setting_type: SettingType::String,
            options: None,
        }]);
        let registry = ConfigRegistry::builder(Arc::new(repo))
            .codec(ValueCodec::from_secret(Some(SECRET)))
            .build();
        let store = ConfigStore::new(Arc::new(registry));
        let stored = store.get(1).await?;

        let input = SettingInput {
            value: Some("x".into()),
            ..SettingInput::default()
        };
        let err = store.update(stored.id, input).await.expect_err("blocked");
        assert!(matches!(err, ConfigError::KeyBlockedAtPersistence { .. }));

        let mut direct = stored.clone();
        direct.raw_value = "x".into();
        let err = store.save_existing(direct, true).await.expect_err("blocked");
        assert!(matches!(err, ConfigError::KeyBlockedAtPersistence { .. }));

        assert_eq!(store.get(stored.id).await?, stored);
        Ok(())
    }

    #[tokio::test]
    async fn create_rejects_values_that_do_not_cast() {
        let err = store()
            .create(SettingInput::new("App.payload", "{oops", "json"))
            .await
            .expect_err("malformed json");
        assert!(matches!(err, ConfigError::Decode { .. }));
    }

    #[tokio::test]
    async fn create_defaults_module_and_reloads() -> ConfigResult<()> {
        let store = store();
        let record = store
            .create(SettingInput::new("App.retries", "3", "int"))
            .await?;
        assert_eq!(record.module.as_deref(), Some(DEFAULT_MODULE));
        assert_eq!(record.setting_type, SettingType::Integer);
        assert_eq!(
            store.registry().get("App.retries"),
            Some(TypedValue::Integer(3))
        );
        Ok(())
    }

    #[tokio::test]
    async fn update_rejects_key_change_and_bad_values() -> ConfigResult<()> {
        let store = store();
        let record = store
            .create(SettingInput::new("App.retries", "3", "integer"))
            .await?;
        let rename = SettingInput {
            config_key: Some("App.other".into()),
            ..SettingInput::default()
        };
        let err = store.update(record.id, rename).await.expect_err("immutable");
        assert_eq!(field_reason(&err), Some(("config_key", "immutable")));

        let bad = SettingInput {
            value: Some("many".into()),
            ..SettingInput::default()
        };
        let err = store.update(record.id, bad).await.expect_err("not an integer");
        assert!(matches!(err, ConfigError::Decode { .. }));
        assert_eq!(store.registry().get_i64("App.retries"), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn identical_update_is_unchanged() -> ConfigResult<()> {
        let store = store();
        let record = store
            .create(SettingInput::new("App.name", "Tessera", "string"))
            .await?;
        let revision = store.registry().revision();
        let outcome = store
            .update(
                record.id,
                SettingInput {
                    value: Some("Tessera".into()),
                    ..SettingInput::default()
                },
            )
            .await?;
        assert_eq!(outcome, UpdateOutcome::Unchanged(record));
        assert_eq!(store.registry().revision(), revision);
        Ok(())
    }

    #[tokio::test]
    async fn leaving_encryption_requires_a_value() -> ConfigResult<()> {
        let store = store();
        let record = store
            .create(SettingInput::new("App.apiToken", "secret", "encrypted"))
            .await?;
        let downgrade = SettingInput {
            setting_type: Some("string".into()),
            ..SettingInput::default()
        };
        let err = store.update(record.id, downgrade).await.expect_err("needs value");
        assert_eq!(field_reason(&err), Some(("value", "required")));
        Ok(())
    }

    #[tokio::test]
    async fn delete_unknown_record_is_not_found() {
        let err = store().delete(42).await.expect_err("missing");
        assert!(matches!(err, ConfigError::NotFound { id: 42 }));
    }
}
