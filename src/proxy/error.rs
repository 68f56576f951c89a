//! Proxy dispatch errors and their HTTP rendering.
//!
//! Backend-unreachable failures (connection refused, name not resolved) get a
//! fixed 500 body naming the failure code. Everything else is rendered from
//! the error itself.

use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::http::response::ErrorBody;

pub const ECONNREFUSED: &str = "ECONNREFUSED";
pub const ENOTFOUND: &str = "ENOTFOUND";

/// Header naming why a proxied call timed out.
pub const X_TIMEOUT_REASON: &str = "x-timeout-reason";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("No host to proxy")]
    NoHost,

    #[error("invalid proxy host {host:?}: {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("invalid proxy header {name:?}")]
    InvalidHeader { name: String },

    #[error("failed to build outbound request: {0}")]
    Request(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),
}

impl ProxyError {
    /// `ECONNREFUSED` / `ENOTFOUND` when the backend could not be reached at all.
    pub fn unreachable_code(&self) -> Option<&'static str> {
        match self {
            ProxyError::Upstream(e) => unreachable_code(e),
            _ => None,
        }
    }
}

/// Messages of a failed name lookup. The resolver error carries no dedicated
/// `io::ErrorKind`, so the lookup is recognized by text:
/// `hyper_util::client::legacy::connect::HttpConnector` wraps it in a
/// `ConnectError` displayed as `"dns error"`, and the cause is the platform
/// resolver message (`getaddrinfo` on Unix).
const DNS_FAILURE_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "Name or service not known",
];

/// Walk an error's source chain looking for a refused connection or a failed
/// name lookup.
pub fn unreachable_code(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            if io_err.kind() == io::ErrorKind::ConnectionRefused {
                return Some(ECONNREFUSED);
            }
        }
        let message = e.to_string();
        if DNS_FAILURE_MARKERS.iter().any(|marker| message.contains(marker)) {
            return Some(ENOTFOUND);
        }
        current = e.source();
    }
    None
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        if let Some(code) = self.unreachable_code() {
            return ErrorBody::internal(format!("Backend service is down ({code})")).into_response();
        }

        match self {
            ProxyError::NoHost | ProxyError::InvalidHost { .. } | ProxyError::InvalidHeader { .. } => {
                ErrorBody::internal(self.to_string()).into_response()
            }
            ProxyError::Request(_) => ErrorBody::internal(self.to_string()).into_response(),
            ProxyError::Timeout(_) => {
                let mut response = ErrorBody::new(
                    StatusCode::GATEWAY_TIMEOUT,
                    "Gateway timeout",
                    self.to_string(),
                )
                .into_response();
                response.headers_mut().insert(
                    X_TIMEOUT_REASON,
                    HeaderValue::from_static("route-proxy timed out the request"),
                );
                response
            }
            ProxyError::Upstream(_) => ErrorBody::new(
                StatusCode::BAD_GATEWAY,
                "Bad gateway",
                format!("HttpProxy error: {self}"),
            )
            .into_response(),
        }
    }
}
