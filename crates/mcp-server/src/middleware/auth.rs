//! Authorization middleware for protected and metadata-proxy routes.
//!
//! `require_auth` runs the full gate and injects `TokenClaims` and
//! `ResourceId` into request extensions. `require_ready` only checks that
//! the identity provider metadata is loaded.

use crate::auth::{Authorizer, ResourceId};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Authentication middleware that verifies bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 503 if the identity provider metadata is not loaded
/// - 401 `unauthorized` with a `WWW-Authenticate` challenge if the header is
///   missing or not a bearer credential
/// - 401 `invalid_token` if verification fails
/// - Otherwise the wrapped handler's response, unchanged
#[instrument(skip_all, name = "mcp.middleware.auth")]
pub async fn require_auth(
    State(authorizer): State<Arc<Authorizer>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let resource_id = ResourceId::from_request(req.headers(), req.uri());

    let claims = authorizer
        .protect(req.headers(), &resource_id)
        .await
        .map_err(|e| {
            tracing::debug!(
                target: "mcp.middleware.auth",
                error_code = e.error_code(),
                "Request rejected by authorization gate"
            );
            e
        })?;

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(resource_id);

    Ok(next.run(req).await)
}

/// Readiness-only middleware for routes that serve cached metadata.
#[instrument(skip_all, name = "mcp.middleware.ready")]
pub async fn require_ready(
    State(authorizer): State<Arc<Authorizer>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorizer.check_readiness()?;
    Ok(next.run(req).await)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{AuthSettings, TokenClaims};
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use http_body_util::BodyExt;
    use jsonwebtoken::Algorithm;
    use mcp_test_utils::{MockIdentityProvider, TestClaims, TestKeypair};
    use std::time::Duration;
    use tower::ServiceExt;

    fn authorizer_for(discovery_url: String) -> Arc<Authorizer> {
        Arc::new(Authorizer::new(AuthSettings {
            discovery_url,
            authorization_server_url: "https://login.example".to_string(),
            supported_scopes: vec!["mcp:read".to_string()],
            allowed_algorithms: vec![Algorithm::EdDSA],
            clock_skew: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(5),
            jwks_max_age: Duration::from_secs(3600),
            jwks_refresh_cooldown: Duration::ZERO,
        }))
    }

    async fn whoami(
        Extension(claims): Extension<TokenClaims>,
        Extension(resource_id): Extension<ResourceId>,
    ) -> String {
        format!("{} @ {}", claims.sub, resource_id)
    }

    async fn teapot() -> (StatusCode, &'static str) {
        (StatusCode::IM_A_TEAPOT, "short and stout")
    }

    fn app(authorizer: Arc<Authorizer>) -> Router {
        let protected = Router::new()
            .route("/whoami", get(whoami))
            .route("/teapot", get(teapot))
            .route_layer(middleware::from_fn_with_state(
                authorizer.clone(),
                require_auth,
            ));
        let ready_only = Router::new()
            .route("/proxied", get(|| async { "metadata" }))
            .route_layer(middleware::from_fn_with_state(authorizer, require_ready));
        protected.merge(ready_only)
    }

    fn get_request(uri: &str, authorization: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .uri(uri)
            .header(header::HOST, "api.example");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_not_ready_returns_503_on_both_wrappers() {
        let app = app(authorizer_for("http://127.0.0.1:1/d".to_string()));

        for uri in ["/whoami", "/proxied"] {
            let response = app
                .clone()
                .oneshot(get_request(uri, Some("Bearer x.y.z")))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE, "{uri}");
            let body: serde_json::Value =
                serde_json::from_str(&body_string(response).await).unwrap();
            assert_eq!(body["error"], "service_unavailable");
        }
    }

    #[tokio::test]
    async fn test_claims_and_resource_reach_handler() {
        let keypair = TestKeypair::new(21, "mw-key");
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery().await;
        idp.mount_jwks(&[&keypair]).await;

        let authorizer = authorizer_for(idp.discovery_url());
        authorizer.initialize().await;

        let token = keypair.sign(&TestClaims::new(&idp.issuer(), "https://api.example").with_sub("abc"));
        let response = app(authorizer)
            .oneshot(get_request("/whoami", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "abc @ https://api.example");
    }

    #[tokio::test]
    async fn test_handler_response_passes_through_unchanged() {
        let keypair = TestKeypair::new(22, "mw-key-2");
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery().await;
        idp.mount_jwks(&[&keypair]).await;

        let authorizer = authorizer_for(idp.discovery_url());
        authorizer.initialize().await;

        let token = keypair.sign(&TestClaims::new(&idp.issuer(), "https://api.example"));
        let response = app(authorizer.clone())
            .oneshot(get_request("/teapot", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);

        let response = app(authorizer)
            .oneshot(get_request("/proxied", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "metadata");
    }

    #[tokio::test]
    async fn test_missing_header_gets_challenge() {
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery().await;

        let authorizer = authorizer_for(idp.discovery_url());
        authorizer.initialize().await;

        let response = app(authorizer)
            .oneshot(get_request("/whoami", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Bearer realm=\"https://api.example\", authorization_servers=\"https://login.example\", scopes=\"mcp:read\""
        );
    }
}
