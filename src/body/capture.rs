//! One-shot request body capture.
//!
//! # Responsibilities
//! - Drain the request body once, before any handler runs
//! - Keep the verbatim bytes for replay to a backend
//! - Keep a decoded form for handlers
//!
//! # Design Decisions
//! - The captured state lives in a [`RequestBody`] request extension; its
//!   presence also marks capture as done, so a second pass is a no-op
//! - Bodies of unrecognized content types are never read
//! - A payload that fails to decode is not an error; the decoded form stays
//!   an empty object

use std::borrow::Cow;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::body::parsers::parser_for_headers;
use crate::http::response::ErrorBody;

/// Largest body read into memory: 100 MiB.
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024 * 1024;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Body state captured for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    parsed: Value,
    raw: Option<Bytes>,
}

impl Default for RequestBody {
    fn default() -> Self {
        Self {
            parsed: Value::Object(Map::new()),
            raw: None,
        }
    }
}

impl RequestBody {
    /// Decoded body; an empty object when nothing was decoded.
    pub fn parsed(&self) -> &Value {
        &self.parsed
    }

    pub fn raw(&self) -> Option<&Bytes> {
        self.raw.as_ref()
    }

    /// Raw bytes, empty when nothing was captured.
    pub fn raw_bytes(&self) -> Bytes {
        self.raw.clone().unwrap_or_default()
    }

    /// Raw body as text, `""` when nothing was captured.
    pub fn raw_text(&self) -> Cow<'_, str> {
        match &self.raw {
            Some(raw) => String::from_utf8_lossy(raw),
            None => Cow::Borrowed(""),
        }
    }

    /// Captured state of a request, if capture ran.
    pub fn of<B>(req: &axum::http::Request<B>) -> Option<&RequestBody> {
        req.extensions().get::<RequestBody>()
    }
}

#[derive(Debug, Error)]
pub enum BodyError {
    #[error("request body exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    Read(#[source] BoxError),
}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        match self {
            BodyError::TooLarge { .. } => ErrorBody::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Payload too large",
                self.to_string(),
            ),
            BodyError::Read(_) => {
                ErrorBody::new(StatusCode::BAD_REQUEST, "Bad request", self.to_string())
            }
        }
        .into_response()
    }
}

/// Whether the message declares a body: any `Transfer-Encoding`, or a
/// numeric `Content-Length` (zero included).
pub fn has_body(headers: &HeaderMap) -> bool {
    headers.contains_key(header::TRANSFER_ENCODING) || declared_length(headers).is_some()
}

fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

async fn read_limited(body: Body, limit: usize) -> Result<Bytes, BodyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(BodyError::TooLarge { limit })
        }
        Err(e) => Err(BodyError::Read(e)),
    }
}

/// Capture the body of `req` into a [`RequestBody`] extension.
///
/// Runs at most once per request. When the content type has a parser the body
/// stream is drained and left empty.
pub async fn capture_body(req: &mut Request, limit: usize) -> Result<(), BodyError> {
    if RequestBody::of(req).is_some() {
        return Ok(());
    }
    req.extensions_mut().insert(RequestBody::default());

    if !has_body(req.headers()) {
        return Ok(());
    }
    let Some(parser) = parser_for_headers(req.headers()) else {
        return Ok(());
    };

    if let Some(length) = declared_length(req.headers()) {
        if length > limit as u64 {
            return Err(BodyError::TooLarge { limit });
        }
    }

    let body = std::mem::take(req.body_mut());
    let raw = read_limited(body, limit).await?;

    let parsed = match parser(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring undecodable request body");
            Value::Object(Map::new())
        }
    };

    req.extensions_mut().insert(RequestBody {
        parsed,
        raw: Some(raw),
    });
    Ok(())
}

/// Body capture settings, used as middleware state.
#[derive(Debug, Clone, Copy)]
pub struct BodyCapture {
    limit: usize,
}

impl BodyCapture {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Default for BodyCapture {
    fn default() -> Self {
        Self::new(DEFAULT_BODY_LIMIT)
    }
}

/// Middleware running [`capture_body`] ahead of the rest of the stack.
///
/// ```ignore
/// Router::new()
///     .route("/users", post(create_user))
///     .layer(middleware::from_fn_with_state(BodyCapture::default(), capture_body_middleware));
/// ```
pub async fn capture_body_middleware(
    State(capture): State<BodyCapture>,
    mut req: Request,
    next: Next,
) -> Response {
    match capture_body(&mut req, capture.limit).await {
        Ok(()) => next.run(req).await,
        Err(e) => {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                error = %e,
                "Failed to capture request body"
            );
            e.into_response()
        }
    }
}
