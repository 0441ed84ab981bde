//! Setting records, write-path inputs and typed values.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tessera_data::SettingRow;

/// Placeholder shown wherever an encrypted value would otherwise be rendered.
pub const MASKED_VALUE: &str = "********";

/// Module assigned to records created without one.
pub const DEFAULT_MODULE: &str = "App";

/// Declared type of a stored value.
///
/// Unknown tags are kept verbatim and cast as plain strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum SettingType {
    /// Plain string.
    #[default]
    String,
    /// Signed 64-bit integer (`integer` or `int`).
    Integer,
    /// Floating-point number.
    Float,
    /// Boolean (`boolean` or `bool`).
    Boolean,
    /// Structured JSON document.
    Json,
    /// String encrypted at rest.
    Encrypted,
    /// Any other tag, stored as given.
    Other(String),
}

impl SettingType {
    /// Interpret a stored type tag, case-insensitively.
    #[must_use]
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "integer" | "int" => Self::Integer,
            "float" => Self::Float,
            "boolean" | "bool" => Self::Boolean,
            "json" => Self::Json,
            "encrypted" => Self::Encrypted,
            _ => Self::Other(tag.to_string()),
        }
    }

    /// Canonical tag written to storage.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Json => "json",
            Self::Encrypted => "encrypted",
            Self::Other(tag) => tag,
        }
    }

    /// Whether values of this type are ciphertext at rest.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted)
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value as published into the live registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    /// Boolean value.
    Boolean(bool),
    /// Integer value.
    Integer(i64),
    /// Floating-point value.
    Float(f64),
    /// String value (decrypted plaintext for encrypted records).
    String(String),
    /// Structured value.
    Json(Value),
}

impl TypedValue {
    /// String view when the value is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            Self::Json(Value::String(value)) => Some(value),
            _ => None,
        }
    }

    /// Integer view when the value is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Json(value) => value.as_i64(),
            _ => None,
        }
    }

    /// Float view; integers widen.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(value) => Some(*value),
            Self::Integer(value) => Some(*value as f64),
            Self::Json(value) => value.as_f64(),
            _ => None,
        }
    }

    /// Boolean view when the value is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(value) => Some(*value),
            Self::Json(value) => value.as_bool(),
            _ => None,
        }
    }

    /// JSON rendering of the value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Boolean(value) => Value::Bool(*value),
            Self::Integer(value) => Value::from(*value),
            Self::Float(value) => Value::from(*value),
            Self::String(value) => Value::String(value.clone()),
            Self::Json(value) => value.clone(),
        }
    }
}

impl From<&str> for TypedValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for TypedValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for TypedValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// A persisted setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingRecord {
    /// Identifier assigned at creation.
    pub id: i64,
    /// UI grouping label.
    pub module: Option<String>,
    /// Dotted configuration key.
    pub key: String,
    /// Stored representation; ciphertext when the type is encrypted.
    pub raw_value: String,
    /// Declared type.
    pub setting_type: SettingType,
    /// Free-form UI metadata.
    pub options: Option<String>,
}

impl SettingRecord {
    /// Value safe to render in listings and responses.
    #[must_use]
    pub fn display_value(&self) -> &str {
        if self.setting_type.is_encrypted() {
            MASKED_VALUE
        } else {
            &self.raw_value
        }
    }
}

impl From<SettingRow> for SettingRecord {
    fn from(row: SettingRow) -> Self {
        Self {
            id: row.id,
            module: row.module,
            key: row.config_key,
            raw_value: row.value,
            setting_type: SettingType::parse(&row.setting_type),
            options: row.options,
        }
    }
}

/// A validated record ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSetting {
    /// UI grouping label.
    pub module: Option<String>,
    /// Dotted configuration key.
    pub key: String,
    /// Stored representation.
    pub raw_value: String,
    /// Declared type.
    pub setting_type: SettingType,
    /// Free-form UI metadata.
    pub options: Option<String>,
}

/// Write-path payload as submitted by a caller.
///
/// Every field is optional so that updates may omit what they keep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingInput {
    /// UI grouping label.
    #[serde(default)]
    pub module: Option<String>,
    /// Dotted configuration key; ignored on update.
    #[serde(default)]
    pub config_key: Option<String>,
    /// Plaintext value.
    #[serde(default)]
    pub value: Option<String>,
    /// Type tag.
    #[serde(default, rename = "type")]
    pub setting_type: Option<String>,
    /// Free-form UI metadata.
    #[serde(default)]
    pub options: Option<String>,
}

impl SettingInput {
    /// Convenience constructor for the common create triple.
    #[must_use]
    pub fn new(key: &str, value: &str, setting_type: &str) -> Self {
        Self {
            config_key: Some(key.to_string()),
            value: Some(value.to_string()),
            setting_type: Some(setting_type.to_string()),
            ..Self::default()
        }
    }
}

/// Listing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFilter {
    /// Restrict to one module.
    pub module: Option<String>,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

impl SettingsFilter {
    /// Page size applied when none is requested.
    pub const DEFAULT_LIMIT: u32 = 20;
    /// Largest accepted page size.
    pub const MAX_LIMIT: u32 = 100;

    /// Build a filter, clamping the page and size into range.
    #[must_use]
    pub fn new(module: Option<String>, page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            module,
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    /// Rows to skip before this page.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for SettingsFilter {
    fn default() -> Self {
        Self::new(None, None, None)
    }
}

/// One page of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsPage {
    /// Records on this page, ordered by identifier.
    pub records: Vec<SettingRecord>,
    /// Total records matching the filter.
    pub total: u64,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
}

/// Result of an update request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The record was written and the registry reloaded.
    Saved(SettingRecord),
    /// Nothing changed; storage and registry were left alone.
    Unchanged(SettingRecord),
}

impl UpdateOutcome {
    /// The record after the request.
    #[must_use]
    pub const fn record(&self) -> &SettingRecord {
        match self {
            Self::Saved(record) | Self::Unchanged(record) => record,
        }
    }
}
