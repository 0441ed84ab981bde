//! Access gate in front of every settings route.
//!
//! # Design
//! - Runs as a route layer, so unknown paths are not gated.
//! - Records the request origin before deciding, for base-URL derivation.
//! - Writes without update permission go back to the index with a notice
//!   instead of a bare 403.

use axum::{
    extract::{Request, State},
    http::header::HOST,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tessera_auth::{AccessDecision, RequestContext};
use tessera_config::RequestOrigin;
use tracing::{info, warn};

use crate::http::constants::{
    HEADER_FORWARDED_PROTO, MSG_AUTH_REQUIRED, MSG_LOGIN_REQUIRED, MSG_UPDATE_FORBIDDEN,
    MSG_VIEW_FORBIDDEN, SETTINGS_INDEX,
};
use crate::http::errors::ApiError;
use crate::http::flash::{Flash, FlashRedirect};
use crate::state::ApiState;

/// Outcome of the gate, available to handlers as an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Whether the caller may change settings.
    pub can_update: bool,
}

pub(crate) async fn require_settings_access(
    State(state): State<ApiState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(origin) = request_origin(&req) {
        state.store.registry().observe_origin(origin);
    }

    let ctx = RequestContext::from_request(&req);
    let is_write = ctx.is_write();
    let decision = state.permissions.evaluate(&ctx);
    let access = match decision {
        AccessDecision::Redirect { location } => {
            info!(path = %req.uri().path(), "redirecting unauthenticated settings request");
            return FlashRedirect::to(location, Flash::error(MSG_LOGIN_REQUIRED)).into_response();
        }
        AccessDecision::Unauthorized => {
            return ApiError::unauthorized(MSG_AUTH_REQUIRED).into_response();
        }
        AccessDecision::Forbidden => {
            warn!(path = %req.uri().path(), "settings access forbidden");
            return ApiError::forbidden(MSG_VIEW_FORBIDDEN).into_response();
        }
        AccessDecision::Granted { can_update } => Access { can_update },
    };

    if is_write && !access.can_update {
        warn!(
            method = %req.method(),
            path = %req.uri().path(),
            "settings update without permission"
        );
        return FlashRedirect::to(SETTINGS_INDEX, Flash::error(MSG_UPDATE_FORBIDDEN))
            .into_response();
    }

    req.extensions_mut().insert(access);
    next.run(req).await
}

fn request_origin(req: &Request) -> Option<RequestOrigin> {
    let host = req
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| req.uri().authority().map(axum::http::uri::Authority::as_str))?
        .trim();
    if host.is_empty() {
        return None;
    }
    let forwarded_proto = req
        .headers()
        .get(HEADER_FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    Some(RequestOrigin {
        host: host.to_string(),
        tls: req.uri().scheme_str() == Some("https"),
        forwarded_proto,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn origin_reads_host_and_forwarded_proto() {
        let req = Request::builder()
            .uri("/db-config")
            .header(HOST, "settings.example.com")
            .header(HEADER_FORWARDED_PROTO, "https")
            .body(Body::empty())
            .expect("request");
        let origin = request_origin(&req).expect("origin");
        assert_eq!(origin.host, "settings.example.com");
        assert!(!origin.tls);
        assert_eq!(origin.forwarded_proto.as_deref(), Some("https"));
        assert_eq!(origin.scheme(true), "https");
        assert_eq!(origin.scheme(false), "http");
    }

    #[test]
    fn origin_is_absent_without_host() {
        let req = Request::builder()
            .uri("/db-config")
            .body(Body::empty())
            .expect("request");
        assert!(request_origin(&req).is_none());
    }
}
