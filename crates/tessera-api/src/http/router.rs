//! Router construction and server host for the API.

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderName, Method, Request, header::CONTENT_TYPE},
    middleware,
    routing::get,
};
use tessera_telemetry::{REQUEST_ID_HEADER, build_sha};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::Span;

use crate::error::{ApiServerError, ApiServerResult};
use crate::http::access::require_settings_access;
use crate::http::constants::{HEADER_FLASH, SETTINGS_INDEX};
use crate::http::settings::{create, delete, index, show, update};
use crate::state::ApiState;

/// Axum router wrapper that hosts the settings API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Construct the server around shared state.
    #[must_use]
    pub fn new(state: ApiState) -> Self {
        let cors_layer = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([CONTENT_TYPE])
            .expose_headers([HeaderName::from_static(HEADER_FLASH)]);
        let trace_layer = TraceLayer::new_for_http()
            .make_span_with(|request: &Request<_>| {
                let request_id = request
                    .headers()
                    .get(&REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                tracing::info_span!(
                    "http.request",
                    method = %request.method(),
                    route = %request.uri().path(),
                    request_id = %request_id,
                    build_sha = %build_sha(),
                    status_code = tracing::field::Empty,
                    latency_ms = tracing::field::Empty
                )
            })
            .on_response(
                |response: &axum::response::Response, latency: Duration, span: &Span| {
                    span.record("status_code", response.status().as_u16());
                    let latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
                    span.record("latency_ms", latency_ms);
                },
            );
        let layered = ServiceBuilder::new()
            .layer(tessera_telemetry::propagate_request_id_layer())
            .layer(tessera_telemetry::set_request_id_layer())
            .layer(trace_layer);

        let router = Self::settings_routes(&state)
            .layer(cors_layer)
            .route_layer(layered)
            .with_state(state);
        Self { router }
    }

    fn settings_routes(state: &ApiState) -> Router<ApiState> {
        let gate = middleware::from_fn_with_state(state.clone(), require_settings_access);
        Router::new()
            .route(SETTINGS_INDEX, get(index).post(create))
            .route(
                "/db-config/{id}",
                get(show)
                    .post(update)
                    .put(update)
                    .patch(update)
                    .delete(delete),
            )
            .route_layer(gate)
    }

    /// Router with state applied, for embedding or in-process requests.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve the API until the listener fails.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError::Bind`] when the address is unavailable and
    /// [`ApiServerError::Serve`] when the server stops with an error.
    pub async fn serve(self, addr: SocketAddr) -> ApiServerResult<()> {
        tracing::info!(%addr, "starting settings api");
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        axum::serve(listener, self.router.into_make_service())
            .await
            .map_err(|source| ApiServerError::Serve { addr, source })
    }
}
