//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the axum Router with one proxied route per configured route
//! - Wire up middleware (request ID, tracing, body capture, timeout)
//! - Bind server to listener and shut down gracefully

use std::time::Duration;

use axum::{middleware, routing::any, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::body::{capture_body_middleware, BodyCapture};
use crate::config::{GatewayConfig, RouteConfig};
use crate::lifecycle::{signals::shutdown_signal, triggered};
use crate::proxy::{build_client, http_proxy, HttpProxy, ProxyClient, ProxyOptions};

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let router = Self::build_router(&config);
        Self { router, config }
    }

    /// Build the axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig) -> Router {
        let client = build_client();

        let router = config
            .routes
            .iter()
            .fold(Router::new(), |router, route| {
                tracing::debug!(
                    route = %route.name,
                    path = %route.path,
                    host = route.host.as_deref().unwrap_or("<per request>"),
                    "Registering proxied route"
                );
                router.route(
                    &route.path,
                    any(forward).layer(middleware::from_fn_with_state(
                        route_proxy(route, client.clone()),
                        http_proxy,
                    )),
                )
            });

        router
            .layer(middleware::from_fn_with_state(
                BodyCapture::new(config.body.limit_bytes),
                capture_body_middleware,
            ))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The configured router, for embedding or testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires or the process is signalled.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = triggered(shutdown) => {},
                    _ = shutdown_signal() => {},
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

fn route_proxy(route: &RouteConfig, client: ProxyClient) -> HttpProxy {
    HttpProxy::new()
        .with_host(route.host.as_deref())
        .with_options(route.options.clone())
        .fail_quiet(route.fail_quiet)
        .with_client(client)
}

/// Configured routes forward with their bound options only.
async fn forward() -> ProxyOptions {
    ProxyOptions::new()
}
