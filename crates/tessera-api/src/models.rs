//! Request and response bodies for the settings API.

use serde::{Deserialize, Serialize};
use tessera_config::SettingRecord;

/// RFC9457-compatible problem document surfaced on validation/runtime errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemDetails {
    /// Problem type URI.
    #[serde(rename = "type")]
    pub kind: String,
    /// Short summary.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable explanation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Field-level validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<ProblemInvalidParam>>,
}

/// Invalid parameter pointer surfaced alongside a [`ProblemDetails`] payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProblemInvalidParam {
    /// JSON pointer to the offending field.
    pub pointer: String,
    /// Explanation of the failure.
    pub message: String,
}

/// A setting as exposed over HTTP; encrypted values are always masked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingView {
    /// Record identifier.
    pub id: i64,
    /// UI grouping label.
    pub module: Option<String>,
    /// Dotted configuration key.
    pub config_key: String,
    /// Display value.
    pub value: String,
    /// Type tag.
    #[serde(rename = "type")]
    pub setting_type: String,
    /// Free-form UI metadata.
    pub options: Option<String>,
}

impl From<&SettingRecord> for SettingView {
    fn from(record: &SettingRecord) -> Self {
        Self {
            id: record.id,
            module: record.module.clone(),
            config_key: record.key.clone(),
            value: record.display_value().to_string(),
            setting_type: record.setting_type.as_str().to_string(),
            options: record.options.clone(),
        }
    }
}

/// Settings index page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsListResponse {
    /// Records on this page.
    pub settings: Vec<SettingView>,
    /// One-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Records across all pages.
    pub total: u64,
    /// Whether edit controls should be offered.
    pub can_update: bool,
    /// Record selected for editing, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}
