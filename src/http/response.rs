//! Response handling and transformation.
//!
//! # Responsibilities
//! - Build the reshaped success response
//! - Map proxy errors to HTTP status codes and bodies
//!
//! # Design Decisions
//! - Every response is built in full before it is returned, so a failure
//!   can never leave status and headers sent without a body
//! - Upstream fetch failures (including non-2xx answers) → 500 plain text
//! - Unusable upstream payloads → 502 with a JSON error body

use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::upstream::{PayloadError, UpstreamError};

/// Errors surfaced to the inbound caller.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Only GET is proxied.
    #[error("Unsupported method ('{0}')")]
    UnsupportedMethod(Method),

    /// The outbound call failed or returned a non-2xx status.
    #[error("Error fetching from upstream API: {0}")]
    UpstreamUnavailable(#[from] UpstreamError),

    /// The upstream answered but the payload lacks the expected field.
    #[error("Upstream returned an unusable payload: {0}")]
    MalformedPayload(#[from] PayloadError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
            ProxyError::UpstreamUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::MalformedPayload(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ProxyError::MalformedPayload(e) => (
                status,
                Json(json!({
                    "error": "bad_gateway",
                    "message": e.to_string(),
                })),
            )
                .into_response(),
            _ => (status, self.to_string()).into_response(),
        }
    }
}

/// Successful reshaped answer: upstream status, JSON content type, one body.
pub fn datetime_response(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
