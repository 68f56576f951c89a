//! Response handling and transformation.
//!
//! # Responsibilities
//! - Relay backend responses to the client without buffering the body
//! - Strip hop-by-hop headers from relayed responses
//! - Render errors raised by the proxy layer as JSON
//!
//! # Design Decisions
//! - Every error produced by this crate uses the same `{error, message, statusCode}` shape

use axum::{
    body::Body,
    http::{Response as HttpResponse, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use hyper::body::Incoming;
use serde::{Deserialize, Serialize};

use crate::http::headers::strip_hop_by_hop;

/// JSON error payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl ErrorBody {
    pub fn new(status: StatusCode, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status_code: status.as_u16(),
        }
    }

    /// 500 with the generic `Internal server error` label.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error", message)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ErrorBody {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Convert a backend response into one axum can send, streaming the body.
pub fn relay(response: HttpResponse<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
