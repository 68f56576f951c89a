//! Extractors over the captured body.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::body::capture::RequestBody;

/// Decoded request body; `{}` when nothing was captured.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBody(pub Value);

/// Verbatim request body; empty when nothing was captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawBody(pub Bytes);

impl<S> FromRequestParts<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let parsed = parts
            .extensions
            .get::<RequestBody>()
            .map(|body| body.parsed().clone())
            .unwrap_or_else(|| Value::Object(Map::new()));
        Ok(Self(parsed))
    }
}

impl<S> FromRequestParts<S> for RawBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .extensions
            .get::<RequestBody>()
            .map(RequestBody::raw_bytes)
            .unwrap_or_default();
        Ok(Self(raw))
    }
}
