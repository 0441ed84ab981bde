//! Settings endpoints: index, single record, create, update and delete.

use axum::{
    Extension, Form, Json,
    extract::{FromRequest, Path, Query, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tessera_config::{SettingInput, SettingsFilter, UpdateOutcome};
use tracing::info;

use crate::http::access::Access;
use crate::http::constants::{
    INDEX_MODULE, MSG_EMPTY_VALUE, MSG_SAVE_FAILED, MSG_SAVED, SETTINGS_INDEX,
};
use crate::http::errors::{ApiError, map_config_error};
use crate::http::flash::{Flash, FlashRedirect};
use crate::models::{SettingView, SettingsListResponse};
use crate::state::ApiState;

/// Index query string.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct IndexQuery {
    page: Option<u32>,
    limit: Option<u32>,
    id: Option<i64>,
}

/// Write payload accepted as JSON or as an urlencoded form.
#[derive(Debug)]
pub(crate) struct SettingPayload(SettingInput);

impl<S> FromRequest<S> for SettingPayload
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
        if is_form {
            Form::<SettingInput>::from_request(req, state)
                .await
                .map(|Form(input)| Self(input))
                .map_err(IntoResponse::into_response)
        } else {
            Json::<SettingInput>::from_request(req, state)
                .await
                .map(|Json(input)| Self(input))
                .map_err(IntoResponse::into_response)
        }
    }
}

pub(crate) async fn index(
    State(state): State<ApiState>,
    Extension(access): Extension<Access>,
    Query(query): Query<IndexQuery>,
) -> Result<Json<SettingsListResponse>, ApiError> {
    let filter = SettingsFilter::new(Some(INDEX_MODULE.to_string()), query.page, query.limit);
    let page = state
        .store
        .list(&filter)
        .await
        .map_err(|err| map_config_error(&err))?;
    Ok(Json(SettingsListResponse {
        settings: page.records.iter().map(SettingView::from).collect(),
        page: page.page,
        limit: page.limit,
        total: page.total,
        can_update: access.can_update,
        id: query.id,
    }))
}

pub(crate) async fn show(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<SettingView>, ApiError> {
    let record = state
        .store
        .get(id)
        .await
        .map_err(|err| map_config_error(&err))?;
    Ok(Json(SettingView::from(&record)))
}

pub(crate) async fn create(
    State(state): State<ApiState>,
    SettingPayload(input): SettingPayload,
) -> Result<(StatusCode, Json<SettingView>), ApiError> {
    let record = state
        .store
        .create(input)
        .await
        .map_err(|err| map_config_error(&err))?;
    Ok((StatusCode::CREATED, Json(SettingView::from(&record))))
}

pub(crate) async fn update(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    SettingPayload(input): SettingPayload,
) -> Result<Response, ApiError> {
    let current = state
        .store
        .get(id)
        .await
        .map_err(|err| map_config_error(&err))?;

    // An encrypted record submitted without a value keeps its ciphertext.
    if current.setting_type.is_encrypted() && input.value.as_deref().is_none_or(str::is_empty) {
        info!(id, key = %current.key, "encrypted setting submitted without value");
        return Ok(
            FlashRedirect::to(SETTINGS_INDEX, Flash::info(MSG_EMPTY_VALUE)).into_response(),
        );
    }

    match state.store.update(id, input).await {
        Ok(UpdateOutcome::Saved(record) | UpdateOutcome::Unchanged(record)) => {
            info!(id, key = %record.key, "setting saved");
            Ok(FlashRedirect::to(SETTINGS_INDEX, Flash::success(MSG_SAVED)).into_response())
        }
        Err(err) => {
            let api_error = map_config_error(&err);
            if api_error.status != StatusCode::UNPROCESSABLE_ENTITY {
                return Err(api_error);
            }
            let mut response = api_error.into_response();
            Flash::error(MSG_SAVE_FAILED).attach(&mut response);
            Ok(response)
        }
    }
}

pub(crate) async fn delete(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .store
        .delete(id)
        .await
        .map_err(|err| map_config_error(&err))?;
    Ok(StatusCode::NO_CONTENT)
}
