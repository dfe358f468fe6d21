//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) unless the caller sent one
//! - Extract the pass-through target (path + query) from the inbound URI
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The inbound target is forwarded verbatim; no normalization

use axum::http::{HeaderMap, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a fresh UUID v4 for every request lacking an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Correlation ID for logging; "unknown" when absent or not text.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Path plus query string exactly as received.
pub fn path_and_query(uri: &Uri) -> &str {
    uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_query_and_encoding() {
        let uri: Uri = "/predictions?filter%5Bstop%5D=place-sstat&sort=arrival_time"
            .parse()
            .unwrap();
        assert_eq!(
            path_and_query(&uri),
            "/predictions?filter%5Bstop%5D=place-sstat&sort=arrival_time"
        );
    }

    #[test]
    fn absolute_form_uses_target_only() {
        let uri: Uri = "http://proxy.local:8080/stops/place-sstat?include=route"
            .parse()
            .unwrap();
        assert_eq!(path_and_query(&uri), "/stops/place-sstat?include=route");
    }

    #[test]
    fn request_ids_are_unique_uuids() {
        let request = Request::new(());
        let mut make = UuidRequestId;
        let a = make.make_request_id(&request).unwrap();
        let b = make.make_request_id(&request).unwrap();

        let a = a.header_value().to_str().unwrap().to_string();
        let b = b.header_value().to_str().unwrap().to_string();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn missing_request_id_is_unknown() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(request_id(&headers), "abc-123");
    }
}
