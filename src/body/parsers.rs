//! Content-type parser table.
//!
//! Maps a MIME essence (`type/subtype`, no parameters) to the function that
//! decodes a captured body of that type into a JSON value.

use axum::http::{header, HeaderMap};
use serde_json::Value;
use thiserror::Error;

use crate::body::urlencoded;

/// Failure to decode a body whose content type was recognized.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decodes raw body bytes.
pub type BodyParser = fn(&[u8]) -> Result<Value, ParseError>;

/// Recognized content types. Keys are unique; order is irrelevant.
pub static CONTENT_TYPE_PARSERS: &[(&str, BodyParser)] = &[
    ("application/json", parse_json as BodyParser),
    ("application/x-www-form-urlencoded", parse_urlencoded as BodyParser),
];

/// JSON with integers kept at full precision (`serde_json` is built with
/// `arbitrary_precision`, so numbers keep their original digits).
pub fn parse_json(raw: &[u8]) -> Result<Value, ParseError> {
    Ok(serde_json::from_slice(raw)?)
}

pub fn parse_urlencoded(raw: &[u8]) -> Result<Value, ParseError> {
    Ok(urlencoded::parse(raw))
}

/// Lowercased `type/subtype` of a `Content-Type` value, parameters dropped.
pub fn mime_essence(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim();
    if essence.is_empty() || !essence.contains('/') {
        return None;
    }
    Some(essence.to_ascii_lowercase())
}

/// Look up the parser registered for a content type.
pub fn parser_for(content_type: &str) -> Option<BodyParser> {
    let essence = mime_essence(content_type)?;
    CONTENT_TYPE_PARSERS
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, parser)| *parser)
}

/// Parser for the request's `Content-Type` header, if any.
pub fn parser_for_headers(headers: &HeaderMap) -> Option<BodyParser> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(parser_for)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_essence() {
        assert_eq!(mime_essence("application/json").as_deref(), Some("application/json"));
        assert_eq!(
            mime_essence("Application/JSON; charset=utf-8").as_deref(),
            Some("application/json")
        );
        assert_eq!(mime_essence("  text/plain  ;a=b").as_deref(), Some("text/plain"));
        assert_eq!(mime_essence(""), None);
        assert_eq!(mime_essence("json"), None);
    }

    #[test]
    fn test_parser_lookup() {
        assert!(parser_for("application/json; charset=utf-8").is_some());
        assert!(parser_for("application/x-www-form-urlencoded").is_some());
        assert!(parser_for("text/plain").is_none());
        assert!(parser_for("application/vnd.api+json").is_none());
    }

    #[test]
    fn test_json_keeps_big_integers() {
        let raw = br#"{"huge":123456789012345678901234567890,"id":9223372036854775807}"#;
        let value = parse_json(raw).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), std::str::from_utf8(raw).unwrap());
        assert_eq!(value["id"].to_string(), "9223372036854775807");
    }

    #[test]
    fn test_json_rejects_malformed() {
        assert!(matches!(parse_json(b"{\"a\":"), Err(ParseError::Json(_))));
    }
}
