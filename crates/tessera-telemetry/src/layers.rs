//! Request id layers for the settings HTTP surface.
//!
//! # Design
//! - Requests without an `x-request-id` get a UUID; a caller-supplied id is kept.
//! - The same header name is read by the API trace span, so every log line of a
//!   request carries the id that the response echoes back.

use http::HeaderName;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Layer assigning a UUID to requests that arrive without an id.
#[must_use]
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

/// Layer copying the request id onto the response.
#[must_use]
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Request;
    use tower_http::request_id::MakeRequestId;

    #[test]
    fn generated_ids_are_distinct_uuids() {
        let request = Request::new(());
        let mut make = MakeRequestUuid;
        let first = make.make_request_id(&request).expect("first id");
        let second = make.make_request_id(&request).expect("second id");
        let first = first.header_value().to_str().expect("ascii id");
        let second = second.header_value().to_str().expect("ascii id");
        assert_ne!(first, second);
        assert_eq!(first.len(), 36);
        assert_eq!(REQUEST_ID_HEADER.as_str(), "x-request-id");
    }
}
