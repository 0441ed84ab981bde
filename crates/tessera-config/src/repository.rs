//! Storage backends for setting records.
//!
//! Repositories are plain persistence: no key policy, no encryption. The
//! write-path guarantees live in [`crate::service::ConfigStore`].

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tessera_data::settings as data;
use tessera_data::{DataError, NewSettingRow, SettingRow};
use tokio::sync::RwLock;
use tracing::instrument;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{NewSetting, SettingRecord, SettingsFilter, SettingsPage};

/// Persistence operations over setting records.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Load one page of records.
    async fn list(&self, filter: &SettingsFilter) -> ConfigResult<SettingsPage>;
    /// Load every record, ordered by identifier.
    async fn fetch_all(&self) -> ConfigResult<Vec<SettingRecord>>;
    /// Load one record.
    async fn fetch(&self, id: i64) -> ConfigResult<Option<SettingRecord>>;
    /// Insert a record; fails with [`ConfigError::DuplicateKey`] on key reuse.
    async fn insert(&self, setting: &NewSetting) -> ConfigResult<SettingRecord>;
    /// Replace a record's mutable columns; the key is never rewritten.
    async fn update(&self, record: &SettingRecord) -> ConfigResult<SettingRecord>;
    /// Delete a record, reporting whether it existed.
    async fn delete(&self, id: i64) -> ConfigResult<bool>;
}

fn data_err(operation: &'static str) -> impl FnOnce(DataError) -> ConfigError {
    move |source| ConfigError::DataAccess { operation, source }
}

/// `PostgreSQL` repository backed by the `tessera_config` stored procedures.
#[derive(Debug, Clone)]
pub struct PgSettingsRepository {
    pool: PgPool,
}

impl PgSettingsRepository {
    /// Connect and apply migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or migrations
    /// fail to run.
    #[instrument(name = "settings_repository.connect", skip(database_url))]
    pub async fn connect(database_url: &str) -> ConfigResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|source| ConfigError::DataAccess {
                operation: "connect",
                source: DataError::from_query("connect", source),
            })?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, applying migrations.
    ///
    /// # Errors
    ///
    /// Returns an error when migrations fail.
    pub async fn from_pool(pool: PgPool) -> ConfigResult<Self> {
        data::run_migrations(&pool)
            .await
            .map_err(data_err("run migrations"))?;
        Ok(Self { pool })
    }

    /// Underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl SettingsRepository for PgSettingsRepository {
    async fn list(&self, filter: &SettingsFilter) -> ConfigResult<SettingsPage> {
        let module = filter.module.as_deref();
        let total = data::count_settings(&self.pool, module)
            .await
            .map_err(data_err("count settings"))?;
        let rows = data::list_settings(
            &self.pool,
            module,
            i64::from(filter.limit),
            to_i64(filter.offset()),
        )
        .await
        .map_err(data_err("list settings"))?;
        Ok(SettingsPage {
            records: rows.into_iter().map(SettingRecord::from).collect(),
            total: u64::try_from(total).unwrap_or_default(),
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn fetch_all(&self) -> ConfigResult<Vec<SettingRecord>> {
        let rows = data::fetch_all_settings(&self.pool)
            .await
            .map_err(data_err("fetch all settings"))?;
        Ok(rows.into_iter().map(SettingRecord::from).collect())
    }

    async fn fetch(&self, id: i64) -> ConfigResult<Option<SettingRecord>> {
        let row = data::fetch_setting(&self.pool, id)
            .await
            .map_err(data_err("fetch setting"))?;
        Ok(row.map(SettingRecord::from))
    }

    async fn insert(&self, setting: &NewSetting) -> ConfigResult<SettingRecord> {
        let row = NewSettingRow {
            module: setting.module.as_deref(),
            config_key: &setting.key,
            value: &setting.raw_value,
            setting_type: setting.setting_type.as_str(),
            options: setting.options.as_deref(),
        };
        match data::insert_setting(&self.pool, &row).await {
            Ok(row) => Ok(row.into()),
            Err(err) if err.is_unique_violation() => Err(ConfigError::DuplicateKey {
                key: setting.key.clone(),
            }),
            Err(source) => Err(ConfigError::DataAccess {
                operation: "insert setting",
                source,
            }),
        }
    }

    async fn update(&self, record: &SettingRecord) -> ConfigResult<SettingRecord> {
        let row = SettingRow {
            id: record.id,
            module: record.module.clone(),
            config_key: record.key.clone(),
            value: record.raw_value.clone(),
            setting_type: record.setting_type.as_str().to_string(),
            options: record.options.clone(),
        };
        data::update_setting(&self.pool, &row)
            .await
            .map_err(data_err("update setting"))?
            .map(SettingRecord::from)
            .ok_or(ConfigError::NotFound { id: record.id })
    }

    async fn delete(&self, id: i64) -> ConfigResult<bool> {
        let removed = data::delete_setting(&self.pool, id)
            .await
            .map_err(data_err("delete setting"))?;
        Ok(removed > 0)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    records: BTreeMap<i64, SettingRecord>,
}

/// In-process repository for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemorySettingsRepository {
    state: RwLock<MemoryState>,
}

impl MemorySettingsRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-populated with records, bypassing any write-path checks.
    #[must_use]
    pub fn with_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = NewSetting>,
    {
        let mut state = MemoryState::default();
        for setting in records {
            state.next_id += 1;
            let id = state.next_id;
            state.records.insert(id, materialize(id, setting));
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

fn materialize(id: i64, setting: NewSetting) -> SettingRecord {
    SettingRecord {
        id,
        module: setting.module,
        key: setting.key,
        raw_value: setting.raw_value,
        setting_type: setting.setting_type,
        options: setting.options,
    }
}

#[async_trait]
impl SettingsRepository for MemorySettingsRepository {
    async fn list(&self, filter: &SettingsFilter) -> ConfigResult<SettingsPage> {
        let state = self.state.read().await;
        let matching: Vec<&SettingRecord> = state
            .records
            .values()
            .filter(|record| {
                filter
                    .module
                    .as_deref()
                    .is_none_or(|module| record.module.as_deref() == Some(module))
            })
            .collect();
        let skip = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(filter.limit).unwrap_or(usize::MAX);
        Ok(SettingsPage {
            total: u64::try_from(matching.len()).unwrap_or(u64::MAX),
            records: matching.into_iter().skip(skip).take(take).cloned().collect(),
            page: filter.page,
            limit: filter.limit,
        })
    }

    async fn fetch_all(&self) -> ConfigResult<Vec<SettingRecord>> {
        Ok(self.state.read().await.records.values().cloned().collect())
    }

    async fn fetch(&self, id: i64) -> ConfigResult<Option<SettingRecord>> {
        Ok(self.state.read().await.records.get(&id).cloned())
    }

    async fn insert(&self, setting: &NewSetting) -> ConfigResult<SettingRecord> {
        let mut state = self.state.write().await;
        if state.records.values().any(|record| record.key == setting.key) {
            return Err(ConfigError::DuplicateKey {
                key: setting.key.clone(),
            });
        }
        state.next_id += 1;
        let record = materialize(state.next_id, setting.clone());
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update(&self, record: &SettingRecord) -> ConfigResult<SettingRecord> {
        let mut state = self.state.write().await;
        let existing = state
            .records
            .get_mut(&record.id)
            .ok_or(ConfigError::NotFound { id: record.id })?;
        existing.module.clone_from(&record.module);
        existing.raw_value.clone_from(&record.raw_value);
        existing.setting_type = record.setting_type.clone();
        existing.options.clone_from(&record.options);
        Ok(existing.clone())
    }

    async fn delete(&self, id: i64) -> ConfigResult<bool> {
        Ok(self.state.write().await.records.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SettingType;

    fn setting(module: &str, key: &str) -> NewSetting {
        NewSetting {
            module: Some(module.to_string()),
            key: key.to_string(),
            raw_value: "value".to_string(),
            setting_type: SettingType::String,
            options: None,
        }
    }

    #[tokio::test]
    async fn memory_repository_rejects_duplicate_keys() -> ConfigResult<()> {
        let repo = MemorySettingsRepository::new();
        repo.insert(&setting("App", "App.name")).await?;
        let err = repo
            .insert(&setting("App", "App.name"))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, ConfigError::DuplicateKey { key } if key == "App.name"));
        Ok(())
    }

    #[tokio::test]
    async fn memory_repository_pages_by_module() -> ConfigResult<()> {
        let repo = MemorySettingsRepository::with_records([
            setting("App", "App.a"),
            setting("Mail", "Mail.b"),
            setting("App", "App.c"),
            setting("App", "App.d"),
        ]);
        let page = repo
            .list(&SettingsFilter::new(Some("App".into()), Some(2), Some(2)))
            .await?;
        assert_eq!(page.total, 3);
        let keys: Vec<&str> = page.records.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["App.d"]);

        let everything = repo.list(&SettingsFilter::default()).await?;
        assert_eq!(everything.total, 4);
        Ok(())
    }

    #[tokio::test]
    async fn memory_update_keeps_key_and_reports_missing() -> ConfigResult<()> {
        let repo = MemorySettingsRepository::new();
        let mut record = repo.insert(&setting("App", "App.name")).await?;
        record.key = "App.renamed".into();
        record.raw_value = "changed".into();
        let updated = repo.update(&record).await?;
        assert_eq!(updated.key, "App.name");
        assert_eq!(updated.raw_value, "changed");

        assert!(repo.delete(record.id).await?);
        assert!(!repo.delete(record.id).await?);
        assert!(matches!(
            repo.update(&record).await,
            Err(ConfigError::NotFound { .. })
        ));
        Ok(())
    }
}
