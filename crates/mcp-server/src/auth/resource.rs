//! Per-request resource identifier.
//!
//! The resource identifier is `https://` followed by the host the request was
//! addressed to. It is the audience every access token must carry and the
//! `realm` advertised in bearer challenges.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, Uri},
};
use std::convert::Infallible;
use std::fmt;

/// Scheme prefix applied to the request host.
pub const RESOURCE_SCHEME: &str = "https://";

/// Identifier of this resource server as seen by the current request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    /// Derive the identifier from the `Host` header, falling back to the URI
    /// authority. A request with neither yields `https://`.
    ///
    /// A `Host` containing `"` or `\` is ignored: the identifier is quoted
    /// verbatim inside bearer challenges.
    pub fn from_request(headers: &HeaderMap, uri: &Uri) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|h| !h.is_empty() && !h.contains(['"', '\\']))
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or_default();

        Self(format!("{RESOURCE_SCHEME}{host}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ResourceId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(existing) = parts.extensions.get::<ResourceId>() {
            return Ok(existing.clone());
        }
        Ok(Self::from_request(&parts.headers, &parts.uri))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, Request};

    #[test]
    fn test_from_host_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("api.example"));

        let id = ResourceId::from_request(&headers, &Uri::from_static("/mcp"));
        assert_eq!(id.as_str(), "https://api.example");
    }

    #[test]
    fn test_host_header_keeps_port() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:8080"));

        let id = ResourceId::from_request(&headers, &Uri::from_static("/mcp"));
        assert_eq!(id.to_string(), "https://localhost:8080");
    }

    #[test]
    fn test_falls_back_to_uri_authority() {
        let id = ResourceId::from_request(
            &HeaderMap::new(),
            &Uri::from_static("http://fallback.example/mcp"),
        );
        assert_eq!(id.as_str(), "https://fallback.example");
    }

    #[test]
    fn test_host_with_quote_or_backslash_is_ignored() {
        for host in ["api.example\", realm=\"x", "api.example\\"] {
            let mut headers = HeaderMap::new();
            headers.insert(header::HOST, HeaderValue::from_str(host).unwrap());

            let id = ResourceId::from_request(&headers, &Uri::from_static("/mcp"));
            assert_eq!(id.as_str(), "https://", "{host}");

            let id = ResourceId::from_request(
                &headers,
                &Uri::from_static("http://fallback.example/mcp"),
            );
            assert_eq!(id.as_str(), "https://fallback.example", "{host}");
        }
    }

    #[test]
    fn test_no_host_at_all() {
        let id = ResourceId::from_request(&HeaderMap::new(), &Uri::from_static("/mcp"));
        assert_eq!(id.as_str(), "https://");
    }

    #[tokio::test]
    async fn test_extractor_prefers_extension() {
        let request = Request::builder()
            .uri("/mcp")
            .header(header::HOST, "api.example")
            .extension(ResourceId::from("https://pinned.example"))
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();

        let id = ResourceId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id.as_str(), "https://pinned.example");
    }
}
