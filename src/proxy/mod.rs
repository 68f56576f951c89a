//! Request proxying subsystem.
//!
//! # Data Flow
//! ```text
//! request (body already captured)
//!     → dispatch.rs http_proxy: snapshot method/uri/headers/raw body
//!     → route layers + handler run, handler returns ProxyOptions
//!     → resolve target (request url → bound host → bound options url)
//!     → http/request.rs builds the outbound request
//!     → hyper-util client → backend
//!     → http/response.rs relays the backend response
//!
//! On failure:
//!     → error.rs: unreachable backend → fixed 500 JSON
//!                 anything else      → 5xx JSON from the error
//! ```

pub mod dispatch;
pub mod error;
pub mod options;

pub use dispatch::{build_client, http_proxy, HttpProxy, ProxyClient};
pub use error::ProxyError;
pub use options::ProxyOptions;
