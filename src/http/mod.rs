//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, global layers, one proxied route per config entry)
//!     → body capture (crate::body)
//!     → proxy dispatch (crate::proxy)
//!         → request.rs (snapshot inbound, build outbound)
//!         → headers.rs (hop-by-hop hygiene)
//!         → response.rs (relay backend response / render errors)
//!     → Send to client
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{InboundRequest, Target};
pub use response::ErrorBody;
pub use server::GatewayServer;
