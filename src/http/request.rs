//! Outbound request preparation.
//!
//! # Responsibilities
//! - Snapshot what the proxy needs from the inbound request before the
//!   handler consumes it
//! - Resolve the backend base URL into scheme, authority and base path
//! - Build the request sent to the backend
//!
//! # Design Decisions
//! - The captured raw body is replayed as-is; the decoded form is never re-serialized
//! - Path and query come from the original URI, so nested routers forward the full path
//! - Hop-by-hop headers are dropped, `Content-Length` is recomputed

use axum::{
    body::Body,
    extract::OriginalUri,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri},
};
use bytes::Bytes;
use url::Url;

use crate::body::RequestBody;
use crate::http::headers::strip_hop_by_hop;
use crate::proxy::{ProxyError, ProxyOptions};

/// What the proxy keeps of the inbound request.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn snapshot(req: &Request<Body>) -> Self {
        let uri = req
            .extensions()
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| req.uri().clone());
        let body = RequestBody::of(req)
            .map(RequestBody::raw_bytes)
            .unwrap_or_default();

        Self {
            method: req.method().clone(),
            uri,
            headers: req.headers().clone(),
            body,
        }
    }

    fn declares_body(&self) -> bool {
        self.headers.contains_key(header::CONTENT_LENGTH)
            || self.headers.contains_key(header::TRANSFER_ENCODING)
    }

    /// Build the backend request for `target`.
    pub fn into_outbound(
        self,
        target: &Target,
        options: &ProxyOptions,
    ) -> Result<Request<Body>, ProxyError> {
        let path_and_query = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let path_and_query = match target.base_path() {
            Some(base) => format!("{base}{path_and_query}"),
            None => path_and_query.to_string(),
        };
        let uri = Uri::builder()
            .scheme(target.scheme())
            .authority(target.authority())
            .path_and_query(path_and_query)
            .build()?;

        let declares_body = self.declares_body();
        let mut headers = self.headers;
        let original_host = headers.remove(header::HOST);
        strip_hop_by_hop(&mut headers);
        headers.remove(header::CONTENT_LENGTH);

        let host = match original_host {
            Some(host) if options.preserves_host() => host,
            _ => HeaderValue::from_str(target.authority()).map_err(|_| ProxyError::InvalidHost {
                host: target.to_string(),
                reason: "authority is not a valid Host header".to_string(),
            })?,
        };
        headers.insert(header::HOST, host);

        for (name, value) in &options.headers {
            let invalid = || ProxyError::InvalidHeader { name: name.clone() };
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(name, value);
        }

        if declares_body || !self.body.is_empty() {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(self.body.len()));
        }

        let mut outbound = Request::builder()
            .method(self.method)
            .uri(uri)
            .body(Body::from(self.body))?;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }
}

/// A validated backend base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
    authority: String,
}

impl Target {
    /// Parse a backend base URL. Only `http` is supported.
    pub fn parse(host: &str) -> Result<Self, ProxyError> {
        let invalid = |reason: &str| ProxyError::InvalidHost {
            host: host.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(host).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "http" {
            return Err(invalid("only http backends are supported"));
        }
        let host_str = url.host_str().ok_or_else(|| invalid("missing host"))?;
        let authority = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };

        Ok(Self { url, authority })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Base path without trailing slash; `None` for the root.
    pub fn base_path(&self) -> Option<&str> {
        let path = self.url.path().trim_end_matches('/');
        (!path.is_empty()).then_some(path)
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.authority)?;
        if let Some(base) = self.base_path() {
            write!(f, "{base}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(method: Method, uri: &str, body: &'static str) -> InboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert("x-client", HeaderValue::from_static("tests"));
        if !body.is_empty() {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
        }
        InboundRequest {
            method,
            uri: uri.parse().unwrap(),
            headers,
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[test]
    fn test_target_parse() {
        let target = Target::parse("http://127.0.0.1:3000").unwrap();
        assert_eq!(target.authority(), "127.0.0.1:3000");
        assert_eq!(target.base_path(), None);

        let target = Target::parse("http://backend.internal/api/").unwrap();
        assert_eq!(target.authority(), "backend.internal");
        assert_eq!(target.base_path(), Some("/api"));
        assert_eq!(target.to_string(), "http://backend.internal/api");
    }

    #[test]
    fn test_target_rejects_unsupported() {
        assert!(matches!(
            Target::parse("https://secure.internal"),
            Err(ProxyError::InvalidHost { .. })
        ));
        assert!(matches!(
            Target::parse("not a url"),
            Err(ProxyError::InvalidHost { .. })
        ));
    }

    #[test]
    fn test_outbound_request() {
        let target = Target::parse("http://127.0.0.1:3000/v1").unwrap();
        let options = ProxyOptions::new().with_header("X-Api-Key", "k");
        let req = inbound(Method::POST, "/users?page=2", r#"{"a":1}"#)
            .into_outbound(&target, &options)
            .unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.uri(), "http://127.0.0.1:3000/v1/users?page=2");
        assert_eq!(req.headers()[header::HOST], "127.0.0.1:3000");
        assert_eq!(req.headers()[header::CONTENT_LENGTH], "7");
        assert_eq!(req.headers()["x-api-key"], "k");
        assert_eq!(req.headers()["x-client"], "tests");
        assert!(!req.headers().contains_key(header::CONNECTION));
    }

    #[test]
    fn test_outbound_preserves_host_when_asked() {
        let target = Target::parse("http://127.0.0.1:3000").unwrap();
        let options = ProxyOptions::new().with_preserve_host_header(true);
        let req = inbound(Method::GET, "/", "")
            .into_outbound(&target, &options)
            .unwrap();

        assert_eq!(req.headers()[header::HOST], "gateway.local");
        assert!(!req.headers().contains_key(header::CONTENT_LENGTH));
    }

    #[test]
    fn test_outbound_rejects_bad_header() {
        let target = Target::parse("http://127.0.0.1:3000").unwrap();
        let options = ProxyOptions::new().with_header("bad header", "v");
        let err = inbound(Method::GET, "/", "")
            .into_outbound(&target, &options)
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidHeader { .. }));
    }

    #[test]
    fn test_snapshot_prefers_original_uri() {
        let mut req = Request::builder()
            .uri("/inner")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(OriginalUri("/outer/inner?x=1".parse().unwrap()));

        let snapshot = InboundRequest::snapshot(&req);
        assert_eq!(snapshot.uri, "/outer/inner?x=1");
        assert!(snapshot.body.is_empty());
    }
}
