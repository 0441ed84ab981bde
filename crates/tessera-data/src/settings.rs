//! `app_settings` schema migrations and stored-procedure wrappers.
//!
//! # Design
//! - All SQL lives in stored procedures under the `tessera_config` schema;
//!   this module only binds arguments and maps rows.
//! - Unique violations are classified so callers can report duplicate keys.

use crate::error::{DataError, Result};
use sqlx::{Executor, FromRow, PgPool, Postgres};
use tracing::debug;

fn map_query_err(operation: &'static str) -> impl FnOnce(sqlx::Error) -> DataError {
    move |source| DataError::from_query(operation, source)
}

/// Apply the settings schema migrations.
///
/// # Errors
///
/// Returns an error when migration execution fails.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    let migrator = sqlx::migrate!("./migrations");
    migrator
        .run(pool)
        .await
        .map_err(|source| DataError::MigrationFailed { source })?;
    debug!("settings migrations applied");
    Ok(())
}

/// Raw projection of the `app_settings` table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SettingRow {
    /// Primary key.
    pub id: i64,
    /// Optional UI grouping label.
    pub module: Option<String>,
    /// Dotted configuration key.
    pub config_key: String,
    /// Stored representation (ciphertext for encrypted rows).
    pub value: String,
    /// Type tag as stored.
    #[sqlx(rename = "type")]
    pub setting_type: String,
    /// Free-form UI metadata.
    pub options: Option<String>,
}

/// Insert payload for `app_settings`.
#[derive(Debug, Clone, Copy)]
pub struct NewSettingRow<'a> {
    /// Optional UI grouping label.
    pub module: Option<&'a str>,
    /// Dotted configuration key.
    pub config_key: &'a str,
    /// Stored representation.
    pub value: &'a str,
    /// Type tag.
    pub setting_type: &'a str,
    /// Free-form UI metadata.
    pub options: Option<&'a str>,
}

/// Load every settings row ordered by identifier.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_all_settings<'e, E>(executor: E) -> Result<Vec<SettingRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, SettingRow>("SELECT * FROM tessera_config.fetch_all_settings()")
        .fetch_all(executor)
        .await
        .map_err(map_query_err("fetch all settings"))
}

/// Load one page of settings rows, optionally restricted to a module.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn list_settings<'e, E>(
    executor: E,
    module: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<SettingRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, SettingRow>(
        "SELECT * FROM tessera_config.list_settings(_module => $1, _limit => $2, _offset => $3)",
    )
    .bind(module)
    .bind(limit)
    .bind(offset)
    .fetch_all(executor)
    .await
    .map_err(map_query_err("list settings"))
}

/// Count settings rows, optionally restricted to a module.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn count_settings<'e, E>(executor: E, module: Option<&str>) -> Result<i64>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_scalar::<_, i64>("SELECT tessera_config.count_settings(_module => $1)")
        .bind(module)
        .fetch_one(executor)
        .await
        .map_err(map_query_err("count settings"))
}

/// Load a single settings row by identifier.
///
/// # Errors
///
/// Returns an error when the query fails.
pub async fn fetch_setting<'e, E>(executor: E, id: i64) -> Result<Option<SettingRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, SettingRow>("SELECT * FROM tessera_config.fetch_setting(_id => $1)")
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(map_query_err("fetch setting"))
}

/// Insert a new settings row and return it.
///
/// No key policy is applied at this layer; callers own validation.
///
/// # Errors
///
/// Returns [`DataError::UniqueViolation`] when the key already exists, or an
/// error when the insert fails for any other reason.
pub async fn insert_setting<'e, E>(executor: E, row: &NewSettingRow<'_>) -> Result<SettingRow>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, SettingRow>(
        "SELECT * FROM tessera_config.insert_setting(_module => $1, _config_key => $2, _value => $3, _type => $4, _options => $5)",
    )
    .bind(row.module)
    .bind(row.config_key)
    .bind(row.value)
    .bind(row.setting_type)
    .bind(row.options)
    .fetch_one(executor)
    .await
    .map_err(map_query_err("insert setting"))
}

/// Replace the mutable columns of a settings row.
///
/// The key column is never rewritten.
///
/// # Errors
///
/// Returns an error when the update fails.
pub async fn update_setting<'e, E>(executor: E, row: &SettingRow) -> Result<Option<SettingRow>>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as::<_, SettingRow>(
        "SELECT * FROM tessera_config.update_setting(_id => $1, _module => $2, _value => $3, _type => $4, _options => $5)",
    )
    .bind(row.id)
    .bind(row.module.as_deref())
    .bind(&row.value)
    .bind(&row.setting_type)
    .bind(row.options.as_deref())
    .fetch_optional(executor)
    .await
    .map_err(map_query_err("update setting"))
}

/// Delete a settings row, returning the number of rows removed.
///
/// # Errors
///
/// Returns an error when the delete fails.
pub async fn delete_setting<'e, E>(executor: E, id: i64) -> Result<u64>
where
    E: Executor<'e, Database = Postgres>,
{
    let removed = sqlx::query_scalar::<_, i64>("SELECT tessera_config.delete_setting(_id => $1)")
        .bind(id)
        .fetch_one(executor)
        .await
        .map_err(map_query_err("delete setting"))?;
    Ok(u64::try_from(removed).unwrap_or_default())
}
