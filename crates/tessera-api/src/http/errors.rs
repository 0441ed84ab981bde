//! RFC9457-style API error wrapper.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tessera_config::ConfigError;
use tracing::error;

use crate::http::constants::{
    MSG_SAVE_FAILED, PROBLEM_CONFLICT, PROBLEM_FORBIDDEN, PROBLEM_INTERNAL, PROBLEM_NOT_FOUND,
    PROBLEM_SETTING_INVALID, PROBLEM_UNAUTHORIZED,
};
use crate::models::{ProblemDetails, ProblemInvalidParam};

/// Structured API error with optional RFC9457 fields.
#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) status: StatusCode,
    pub(crate) kind: &'static str,
    title: &'static str,
    detail: Option<String>,
    pub(crate) invalid_params: Option<Vec<ProblemInvalidParam>>,
}

impl ApiError {
    const fn new(status: StatusCode, kind: &'static str, title: &'static str) -> Self {
        Self {
            status,
            kind,
            title,
            detail: None,
            invalid_params: None,
        }
    }

    pub(crate) fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn with_invalid_params(mut self, params: Vec<ProblemInvalidParam>) -> Self {
        self.invalid_params = Some(params);
        self
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            PROBLEM_INTERNAL,
            "internal server error",
        )
        .with_detail(message)
    }

    pub(crate) fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            PROBLEM_UNAUTHORIZED,
            "authentication required",
        )
        .with_detail(detail)
    }

    pub(crate) fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, PROBLEM_FORBIDDEN, "forbidden").with_detail(detail)
    }

    pub(crate) fn not_found(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            PROBLEM_NOT_FOUND,
            "resource not found",
        )
        .with_detail(detail)
    }

    pub(crate) fn conflict(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, PROBLEM_CONFLICT, "conflict").with_detail(detail)
    }

    pub(crate) fn setting_invalid(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            PROBLEM_SETTING_INVALID,
            "setting invalid",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ProblemDetails {
            kind: self.kind.to_string(),
            title: self.title.to_string(),
            status: self.status.as_u16(),
            detail: self.detail,
            invalid_params: self.invalid_params,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map a store failure onto a problem response.
///
/// Rejected input and blocked keys surface as a failed save; storage,
/// encryption and reload faults are logged and reported as internal.
pub(crate) fn map_config_error(err: &ConfigError) -> ApiError {
    match err {
        ConfigError::NotFound { id } => ApiError::not_found(format!("setting {id} not found")),
        ConfigError::DuplicateKey { key } => {
            ApiError::conflict(format!("configuration key '{key}' already exists"))
        }
        ConfigError::KeyNotAllowed { .. }
        | ConfigError::KeyBlockedAtPersistence { .. }
        | ConfigError::InvalidField { .. }
        | ConfigError::Decode { .. } => ApiError::setting_invalid(MSG_SAVE_FAILED)
            .with_invalid_params(invalid_params_for_config_error(err)),
        other => {
            error!(error = %other, "settings operation failed");
            ApiError::internal(other.to_string())
        }
    }
}

pub(crate) fn invalid_params_for_config_error(err: &ConfigError) -> Vec<ProblemInvalidParam> {
    match err {
        ConfigError::KeyNotAllowed { key } | ConfigError::KeyBlockedAtPersistence { key } => {
            vec![ProblemInvalidParam {
                pointer: "/config_key".into(),
                message: format!("configuration key '{key}' is not allowed"),
            }]
        }
        ConfigError::InvalidField { field, reason, .. } => vec![ProblemInvalidParam {
            pointer: format!("/{field}"),
            message: (*reason).to_string(),
        }],
        ConfigError::Decode { setting_type, .. } => vec![ProblemInvalidParam {
            pointer: "/value".into(),
            message: format!("value does not match type '{setting_type}'"),
        }],
        _ => Vec::new(),
    }
}
