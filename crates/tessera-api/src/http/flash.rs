//! One-shot notices attached to redirects.

use axum::{
    http::{HeaderName, HeaderValue, StatusCode, header::LOCATION},
    response::{IntoResponse, Response},
};

use crate::http::constants::HEADER_FLASH;

/// Notice severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashKind {
    /// Operation succeeded.
    Success,
    /// Informational; nothing went wrong.
    Info,
    /// Operation refused or failed.
    Error,
}

impl FlashKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// A notice rendered as `kind:message` in the flash header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flash {
    /// Severity.
    pub kind: FlashKind,
    /// User-facing text.
    pub message: &'static str,
}

impl Flash {
    pub(crate) const fn success(message: &'static str) -> Self {
        Self {
            kind: FlashKind::Success,
            message,
        }
    }

    pub(crate) const fn info(message: &'static str) -> Self {
        Self {
            kind: FlashKind::Info,
            message,
        }
    }

    pub(crate) const fn error(message: &'static str) -> Self {
        Self {
            kind: FlashKind::Error,
            message,
        }
    }

    fn header_value(self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!("{}:{}", self.kind.as_str(), self.message)).ok()
    }

    /// Attach this notice to an existing response.
    pub(crate) fn attach(self, response: &mut Response) {
        if let Some(value) = self.header_value() {
            response
                .headers_mut()
                .insert(HeaderName::from_static(HEADER_FLASH), value);
        }
    }
}

/// `303 See Other` to `location`, carrying a notice.
#[derive(Debug, Clone)]
pub struct FlashRedirect {
    location: String,
    flash: Flash,
}

impl FlashRedirect {
    pub(crate) fn to(location: impl Into<String>, flash: Flash) -> Self {
        Self {
            location: location.into(),
            flash,
        }
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let mut response = StatusCode::SEE_OTHER.into_response();
        if let Ok(location) = HeaderValue::from_str(&self.location) {
            response.headers_mut().insert(LOCATION, location);
        }
        self.flash.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redirect_carries_location_and_notice() {
        let response =
            FlashRedirect::to("/db-config", Flash::info("No changes made. Value was empty."))
                .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(LOCATION).and_then(|v| v.to_str().ok()),
            Some("/db-config")
        );
        assert_eq!(
            response
                .headers()
                .get(HEADER_FLASH)
                .and_then(|v| v.to_str().ok()),
            Some("info:No changes made. Value was empty.")
        );
    }
}
