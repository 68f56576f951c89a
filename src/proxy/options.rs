//! Proxy target configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Where and how to forward a request.
///
/// Bound to a route when the proxy layer is built, and returned by the
/// wrapped handler for each request. Per-request values win per key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyOptions {
    /// Backend base URL (`http://host:port[/base]`). Overrides the host bound to the route.
    pub url: Option<String>,

    /// Extra headers set on the outbound request. Names are case-insensitive.
    pub headers: BTreeMap<String, String>,

    /// Give up on the backend after this many milliseconds.
    pub timeout_ms: Option<u64>,

    /// Forward the client's `Host` header instead of the backend authority.
    pub preserve_host_header: Option<bool>,

    /// Log each outbound call and its outcome at info level.
    pub enable_tracing: Option<bool>,
}

impl ProxyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options pointing at `url`.
    pub fn to(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn with_preserve_host_header(mut self, preserve: bool) -> Self {
        self.preserve_host_header = Some(preserve);
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = Some(enabled);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    pub fn preserves_host(&self) -> bool {
        self.preserve_host_header.unwrap_or(false)
    }

    pub fn tracing_enabled(&self) -> bool {
        self.enable_tracing.unwrap_or(false)
    }

    /// `self` overlaid with `overrides`: set fields in `overrides` win, header
    /// maps are merged by lowercased name.
    pub fn merged_with(&self, overrides: &ProxyOptions) -> ProxyOptions {
        let mut headers: BTreeMap<String, String> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        for (name, value) in &overrides.headers {
            headers.insert(name.to_ascii_lowercase(), value.clone());
        }

        ProxyOptions {
            url: overrides.url.clone().or_else(|| self.url.clone()),
            headers,
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            preserve_host_header: overrides.preserve_host_header.or(self.preserve_host_header),
            enable_tracing: overrides.enable_tracing.or(self.enable_tracing),
        }
    }
}

/// Handlers return their options; the proxy middleware picks them up from
/// the response extensions.
impl IntoResponse for ProxyOptions {
    fn into_response(self) -> Response {
        let mut response = StatusCode::OK.into_response();
        response.extensions_mut().insert(self);
        response
    }
}
