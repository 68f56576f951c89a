//! Route-level HTTP proxying for axum.
//!
//! Two cooperating middlewares:
//! - [`body::capture_body_middleware`] reads each request body once, keeping
//!   the verbatim bytes and a decoded form
//! - [`proxy::http_proxy`] wraps a handler that returns [`ProxyOptions`] and
//!   forwards the original request, with its captured body, to the backend
//!
//! ```ignore
//! use axum::{middleware, routing::get, Router};
//! use route_proxy::{body::{capture_body_middleware, BodyCapture}, proxy::http_proxy, HttpProxy, ProxyOptions};
//!
//! let app = Router::new()
//!     .route(
//!         "/test",
//!         get(|| async { ProxyOptions::new() })
//!             .layer(middleware::from_fn_with_state(HttpProxy::to("http://backend:3000"), http_proxy)),
//!     )
//!     .layer(middleware::from_fn_with_state(BodyCapture::default(), capture_body_middleware));
//! ```

pub mod body;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;

pub use body::{ParsedBody, RawBody, RequestBody};
pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
pub use proxy::{HttpProxy, ProxyError, ProxyOptions};
