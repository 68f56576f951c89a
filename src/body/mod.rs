//! Request body capture subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → capture.rs (has body? parser for Content-Type? drain with size bound)
//!     → parsers.rs (JSON with exact integers / nested url-encoded)
//!     → RequestBody extension { parsed, raw }
//!     → extract.rs (ParsedBody / RawBody for handlers)
//!     → proxy layer replays `raw` to the backend
//! ```

pub mod capture;
pub mod extract;
pub mod parsers;
pub mod urlencoded;

pub use capture::{
    capture_body, capture_body_middleware, BodyCapture, BodyError, RequestBody, DEFAULT_BODY_LIMIT,
};
pub use extract::{ParsedBody, RawBody};
