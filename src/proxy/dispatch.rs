//! Route-level proxy dispatch.
//!
//! # Responsibilities
//! - Let the wrapped handler (and every layer in front of it) run first
//! - Pick up the [`ProxyOptions`] the handler returned
//! - Resolve the backend, replay the captured body, relay the response
//! - Turn failures into responses and log them
//!
//! # Design Decisions
//! - The per-request URL wins over the host bound to the route
//! - A missing host is an explicit 500 unless the route opts into quiet mode,
//!   where it degrades to an empty 200
//! - Responses without options (a guard rejected, the handler answered
//!   itself) pass through untouched

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::http::request::{InboundRequest, Target};
use crate::http::response::relay;
use crate::observability::metrics;
use crate::proxy::{ProxyError, ProxyOptions};

/// Outbound HTTP client shared by proxy layers.
pub type ProxyClient = Client<HttpConnector, Body>;

pub fn build_client() -> ProxyClient {
    Client::builder(TokioExecutor::new()).build(HttpConnector::new())
}

/// Proxy configuration bound to a route.
///
/// ```ignore
/// Router::new().route(
///     "/test",
///     get(|| async { ProxyOptions::new() })
///         .layer(middleware::from_fn_with_state(HttpProxy::to("http://backend:3000"), http_proxy)),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct HttpProxy {
    host: Option<Arc<str>>,
    options: Arc<ProxyOptions>,
    client: ProxyClient,
    fail_quiet: bool,
}

impl HttpProxy {
    /// A proxy whose handler must supply the URL for every request.
    pub fn new() -> Self {
        Self {
            host: None,
            options: Arc::new(ProxyOptions::default()),
            client: build_client(),
            fail_quiet: false,
        }
    }

    /// A proxy bound to `host`.
    pub fn to(host: impl AsRef<str>) -> Self {
        Self::new().with_host(Some(host.as_ref()))
    }

    pub fn with_host(mut self, host: Option<&str>) -> Self {
        self.host = host.map(Arc::from);
        self
    }

    pub fn with_options(mut self, options: ProxyOptions) -> Self {
        self.options = Arc::new(options);
        self
    }

    /// Share a client (and its connection pool) between proxies.
    pub fn with_client(mut self, client: ProxyClient) -> Self {
        self.client = client;
        self
    }

    /// Answer an empty 200 instead of an error when no host can be resolved.
    pub fn fail_quiet(mut self, quiet: bool) -> Self {
        self.fail_quiet = quiet;
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Effective backend for a request: its own URL, then the bound host,
    /// then the URL in the bound options.
    pub fn resolve_target(&self, request_options: &ProxyOptions) -> Result<Target, ProxyError> {
        let host = request_options
            .url
            .as_deref()
            .or(self.host.as_deref())
            .or(self.options.url.as_deref())
            .ok_or(ProxyError::NoHost)?;
        Target::parse(host)
    }

    /// Backend name for logs and metrics; `"none"` when nothing resolves.
    pub fn backend_label(&self, request_options: &ProxyOptions) -> String {
        self.resolve_target(request_options)
            .map(|target| target.to_string())
            .unwrap_or_else(|_| "none".to_string())
    }

    /// Forward `inbound` as described by the handler's options.
    pub async fn forward(
        &self,
        inbound: InboundRequest,
        request_options: ProxyOptions,
    ) -> Result<Response, ProxyError> {
        let target = self.resolve_target(&request_options)?;
        let options = self.options.merged_with(&request_options);
        let outbound = inbound.into_outbound(&target, &options)?;

        if options.tracing_enabled() {
            tracing::info!(
                method = %outbound.method(),
                uri = %outbound.uri(),
                "Proxying request"
            );
        }

        let start = Instant::now();
        let call = self.client.request(outbound);
        let response = match options.timeout() {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProxyError::Timeout(limit))??,
            None => call.await?,
        };

        if options.tracing_enabled() {
            tracing::info!(
                backend = %target,
                status = %response.status(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Backend responded"
            );
        }

        Ok(relay(response))
    }
}

impl Default for HttpProxy {
    fn default() -> Self {
        Self::new()
    }
}

/// Middleware forwarding requests for the handler it wraps.
pub async fn http_proxy(State(proxy): State<HttpProxy>, req: Request, next: Next) -> Response {
    let inbound = InboundRequest::snapshot(&req);
    let method = inbound.method.to_string();
    let path = inbound.uri.path().to_string();

    let response = next.run(req).await;
    let Some(request_options) = response.extensions().get::<ProxyOptions>().cloned() else {
        return response;
    };

    let start = Instant::now();
    let backend = proxy.backend_label(&request_options);

    match proxy.forward(inbound, request_options).await {
        Ok(response) => {
            tracing::debug!(
                method = %method,
                path = %path,
                backend = %backend,
                status = %response.status(),
                "Proxied request"
            );
            metrics::record_request(&method, response.status().as_u16(), &backend, start);
            response
        }
        Err(ProxyError::NoHost) if proxy.fail_quiet => {
            tracing::error!(method = %method, path = %path, error = %ProxyError::NoHost, "HttpProxy error");
            Response::new(Body::empty())
        }
        Err(e) => {
            if let Some(code) = e.unreachable_code() {
                tracing::error!(
                    method = %method,
                    path = %path,
                    backend = %backend,
                    code,
                    "Backend service is down"
                );
                metrics::record_backend_down(&backend, code);
            } else {
                tracing::error!(
                    method = %method,
                    path = %path,
                    backend = %backend,
                    error = %e,
                    "HttpProxy error"
                );
            }
            let response = e.into_response();
            metrics::record_request(&method, response.status().as_u16(), &backend, start);
            response
        }
    }
}
