//! The authorization gate.
//!
//! `Authorizer` owns the identity provider trust state: the discovery
//! document and the signing key cache built from it. Both are published
//! together exactly once, so no request can observe one without the other.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized --initialize() ok--> Ready
//!       |
//!       +--initialize() fails--> Degraded --initialize() ok--> Ready
//! ```
//!
//! A failed discovery fetch is logged and never retried automatically. The
//! process stays `Degraded`, answering 503 on gated routes, until restarted or
//! until the host calls `initialize()` again.

use crate::auth::claims::TokenClaims;
use crate::auth::discovery::{fetch_discovery, DiscoveryError, DiscoveryMetadata};
use crate::auth::jwks::JwksCache;
use crate::auth::jwt::JwtValidator;
use crate::auth::resource::ResourceId;
use crate::config::Config;
use crate::errors::{AuthError, METADATA_NOT_INITIALIZED, METADATA_UNAVAILABLE, MISSING_CREDENTIAL};
use crate::observability::metrics::{
    record_auth_decision, record_discovery_init, set_authorizer_ready,
};
use axum::http::{header, HeaderMap};
use jsonwebtoken::Algorithm;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::instrument;

/// Settings the authorizer needs, taken from `Config`.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub discovery_url: String,
    pub authorization_server_url: String,
    pub supported_scopes: Vec<String>,
    pub allowed_algorithms: Vec<Algorithm>,
    pub clock_skew: Duration,
    pub upstream_timeout: Duration,
    pub jwks_max_age: Duration,
    pub jwks_refresh_cooldown: Duration,
}

impl AuthSettings {
    #[allow(clippy::cast_sign_loss)] // skew is validated positive
    pub fn from_config(config: &Config) -> Self {
        Self {
            discovery_url: config.discovery_url.clone(),
            authorization_server_url: config.authorization_server_url.clone(),
            supported_scopes: config.supported_scopes.clone(),
            allowed_algorithms: config.allowed_algorithms.clone(),
            clock_skew: Duration::from_secs(config.jwt_clock_skew_seconds as u64),
            upstream_timeout: config.upstream_timeout,
            jwks_max_age: config.jwks_max_age,
            jwks_refresh_cooldown: config.jwks_refresh_cooldown,
        }
    }
}

/// Readiness of the authorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizerState {
    /// `initialize()` has not completed.
    Uninitialized,
    /// Discovery metadata and key cache are available.
    Ready,
    /// The last `initialize()` failed.
    Degraded,
}

impl AuthorizerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizerState::Uninitialized => "uninitialized",
            AuthorizerState::Ready => "ready",
            AuthorizerState::Degraded => "degraded",
        }
    }
}

/// Trust state published by a successful `initialize()`.
struct AuthContext {
    metadata: Arc<DiscoveryMetadata>,
    keys: Arc<JwksCache>,
}

/// Authorization gate for protected routes.
pub struct Authorizer {
    settings: AuthSettings,
    http_client: reqwest::Client,
    validator: JwtValidator,
    context: OnceCell<AuthContext>,
    degraded: AtomicBool,
    /// Serializes discovery attempts.
    init_lock: Mutex<()>,
    /// Completed discovery attempts, successful or not.
    attempts: AtomicU64,
}

impl Authorizer {
    /// Create an uninitialized authorizer. No network I/O happens until
    /// [`Authorizer::initialize`].
    pub fn new(settings: AuthSettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(settings.upstream_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "mcp.auth.gate", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });
        let validator = JwtValidator::new(settings.allowed_algorithms.clone(), settings.clock_skew);

        set_authorizer_ready(false);

        Self {
            settings,
            http_client,
            validator,
            context: OnceCell::new(),
            degraded: AtomicBool::new(false),
            init_lock: Mutex::new(()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Fetch the discovery document and build the key cache.
    ///
    /// Idempotent: returns immediately once ready. Callers that overlap an
    /// attempt in flight wait for it and adopt its outcome, ready or
    /// degraded, without fetching again. Failures are logged and leave the
    /// authorizer `Degraded`; they are never returned.
    #[instrument(skip(self), fields(url = %self.settings.discovery_url))]
    pub async fn initialize(&self) {
        if self.context.initialized() {
            tracing::debug!(target: "mcp.auth.discovery", "Discovery already initialized");
            return;
        }

        let observed_attempts = self.attempts.load(Ordering::Acquire);
        let _guard = self.init_lock.lock().await;

        if self.context.initialized() || self.attempts.load(Ordering::Acquire) != observed_attempts {
            tracing::debug!(
                target: "mcp.auth.discovery",
                state = self.state().as_str(),
                "Adopting outcome of concurrent discovery attempt"
            );
            return;
        }

        match self.build_context().await {
            Ok(context) => {
                let issuer = context.metadata.issuer.clone();
                let jwks_uri = context.metadata.jwks_uri.clone();
                if self.context.set(context).is_err() {
                    tracing::debug!(target: "mcp.auth.discovery", "Auth metadata already published");
                }
                self.degraded.store(false, Ordering::Release);
                record_discovery_init("success", None);
                set_authorizer_ready(true);
                tracing::info!(
                    target: "mcp.auth.discovery",
                    issuer = %issuer,
                    jwks_uri = %jwks_uri,
                    "Auth metadata initialized"
                );
            }
            Err(e) => {
                self.degraded.store(true, Ordering::Release);
                record_discovery_init("error", Some(e.kind()));
                tracing::error!(
                    target: "mcp.auth.discovery",
                    error = %e,
                    "Failed to initialize auth metadata; protected routes will return 503"
                );
            }
        }

        self.attempts.fetch_add(1, Ordering::AcqRel);
    }

    async fn build_context(&self) -> Result<AuthContext, DiscoveryError> {
        let metadata = fetch_discovery(&self.http_client, &self.settings.discovery_url).await?;
        let keys = JwksCache::new(
            metadata.jwks_uri.clone(),
            self.http_client.clone(),
            self.settings.jwks_max_age,
            self.settings.jwks_refresh_cooldown,
        );
        Ok(AuthContext {
            metadata: Arc::new(metadata),
            keys: Arc::new(keys),
        })
    }

    pub fn state(&self) -> AuthorizerState {
        if self.context.initialized() {
            AuthorizerState::Ready
        } else if self.degraded.load(Ordering::Acquire) {
            AuthorizerState::Degraded
        } else {
            AuthorizerState::Uninitialized
        }
    }

    pub fn is_ready(&self) -> bool {
        self.context.initialized()
    }

    /// The cached discovery document, once ready.
    pub fn metadata(&self) -> Option<Arc<DiscoveryMetadata>> {
        self.context.get().map(|c| c.metadata.clone())
    }

    /// Readiness gate for routes that serve cached metadata.
    pub fn check_readiness(&self) -> Result<(), AuthError> {
        if self.is_ready() {
            Ok(())
        } else {
            tracing::warn!(
                target: "mcp.auth.gate",
                state = self.state().as_str(),
                "Auth metadata not initialized"
            );
            Err(AuthError::ServiceUnavailable(
                METADATA_NOT_INITIALIZED.to_string(),
            ))
        }
    }

    /// `WWW-Authenticate` value telling a client where to obtain a token.
    pub fn challenge(&self, resource_id: &ResourceId) -> String {
        format!(
            "Bearer realm=\"{}\", authorization_servers=\"{}\", scopes=\"{}\"",
            resource_id,
            self.settings.authorization_server_url,
            self.settings.supported_scopes.join(" ")
        )
    }

    /// Authorize one request.
    ///
    /// 1. Not ready: `service_unavailable` (before looking at the request)
    /// 2. No `Bearer` credential: `unauthorized` with a challenge
    /// 3. Verification failure: `invalid_token`
    #[instrument(skip_all, fields(resource_id = %resource_id))]
    pub async fn protect(
        &self,
        headers: &HeaderMap,
        resource_id: &ResourceId,
    ) -> Result<TokenClaims, AuthError> {
        let start = Instant::now();
        let result = self.authorize(headers, resource_id).await;

        let outcome = match &result {
            Ok(_) => "allowed",
            Err(e) => e.error_code(),
        };
        record_auth_decision(outcome, start.elapsed());

        result
    }

    async fn authorize(
        &self,
        headers: &HeaderMap,
        resource_id: &ResourceId,
    ) -> Result<TokenClaims, AuthError> {
        let Some(context) = self.context.get() else {
            tracing::warn!(
                target: "mcp.auth.gate",
                state = self.state().as_str(),
                "Rejecting request: auth metadata unavailable"
            );
            return Err(AuthError::ServiceUnavailable(
                METADATA_UNAVAILABLE.to_string(),
            ));
        };

        let Some(token) = bearer_token(headers) else {
            tracing::debug!(target: "mcp.auth.gate", "Missing or non-bearer Authorization header");
            return Err(AuthError::MissingCredential {
                description: MISSING_CREDENTIAL.to_string(),
                challenge: self.challenge(resource_id),
            });
        };

        self.validator
            .verify(
                token,
                &context.keys,
                &context.metadata.issuer,
                resource_id.as_str(),
            )
            .await
            .map_err(|e| {
                tracing::debug!(target: "mcp.auth.gate", error = %e, "Token rejected");
                AuthError::InvalidToken(format!("JWT verification failed: {e}"))
            })
    }
}

/// Extract the credential from `Authorization: Bearer <token>`.
///
/// The scheme match is case-sensitive and the token is the text between the
/// first and second single space. `Bearer ` followed by nothing, or by a
/// second space, yields an empty token, which then fails verification.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let rest = value.strip_prefix("Bearer ")?;
    rest.split(' ').next()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use mcp_test_utils::{MockIdentityProvider, TestClaims, TestKeypair};

    fn settings(discovery_url: String) -> AuthSettings {
        AuthSettings {
            discovery_url,
            authorization_server_url: "https://login.example".to_string(),
            supported_scopes: vec!["mcp:read".to_string(), "profile".to_string()],
            allowed_algorithms: vec![Algorithm::EdDSA],
            clock_skew: Duration::from_secs(60),
            upstream_timeout: Duration::from_secs(5),
            jwks_max_age: Duration::from_secs(3600),
            jwks_refresh_cooldown: Duration::ZERO,
        }
    }

    fn headers_with(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers_with("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with("Bearer abc extra")), Some("abc"));
        assert_eq!(bearer_token(&headers_with("Bearer ")), Some(""));
        assert_eq!(bearer_token(&headers_with("Bearer  abc.def.ghi")), Some(""));
        assert_eq!(bearer_token(&headers_with("bearer abc")), None);
        assert_eq!(bearer_token(&headers_with("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers_with("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_challenge_format() {
        let authorizer = Authorizer::new(settings("http://127.0.0.1:1/d".to_string()));
        assert_eq!(
            authorizer.challenge(&ResourceId::from("https://api.example")),
            "Bearer realm=\"https://api.example\", authorization_servers=\"https://login.example\", scopes=\"mcp:read profile\""
        );
    }

    #[test]
    fn test_challenge_never_quotes_raw_host() {
        let authorizer = Authorizer::new(settings("http://127.0.0.1:1/d".to_string()));
        let mut headers = HeaderMap::new();
        headers.insert(
            header::HOST,
            HeaderValue::from_static("evil\", error=\"x"),
        );
        let resource = ResourceId::from_request(&headers, &"/mcp".parse().unwrap());

        let challenge = authorizer.challenge(&resource);
        assert!(challenge.starts_with("Bearer realm=\"https://\", "));
        assert!(!challenge.contains("error="));
    }

    #[tokio::test]
    async fn test_uninitialized_rejects_before_reading_headers() {
        let authorizer = Authorizer::new(settings("http://127.0.0.1:1/d".to_string()));
        assert_eq!(authorizer.state(), AuthorizerState::Uninitialized);

        // No Authorization header at all: readiness still wins over 401.
        let err = authorizer
            .protect(&HeaderMap::new(), &ResourceId::from("https://api.example"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::ServiceUnavailable(METADATA_UNAVAILABLE.to_string()));
        assert!(authorizer.metadata().is_none());
        assert!(authorizer.check_readiness().is_err());
    }

    #[tokio::test]
    async fn test_failed_discovery_degrades_without_retry() {
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery_failure(500, 1).await;

        let authorizer = Authorizer::new(settings(idp.discovery_url()));
        authorizer.initialize().await;

        assert_eq!(authorizer.state(), AuthorizerState::Degraded);
        assert!(!authorizer.is_ready());

        for _ in 0..3 {
            let err = authorizer
                .protect(
                    &headers_with("Bearer whatever"),
                    &ResourceId::from("https://api.example"),
                )
                .await
                .unwrap_err();
            assert_eq!(err.status_code(), 503);
        }
        assert_eq!(
            authorizer.check_readiness().unwrap_err(),
            AuthError::ServiceUnavailable(METADATA_NOT_INITIALIZED.to_string())
        );
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery_expecting(1).await;

        let authorizer = Authorizer::new(settings(idp.discovery_url()));
        authorizer.initialize().await;
        authorizer.initialize().await;

        assert_eq!(authorizer.state(), AuthorizerState::Ready);
        assert_eq!(authorizer.metadata().unwrap().issuer, idp.issuer());
    }

    #[tokio::test]
    async fn test_concurrent_initialize_fetches_once() {
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery_expecting(1).await;

        let authorizer = Arc::new(Authorizer::new(settings(idp.discovery_url())));
        let tasks = (0..10).map(|_| {
            let authorizer = authorizer.clone();
            tokio::spawn(async move { authorizer.initialize().await })
        });
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        assert!(authorizer.is_ready());
    }

    #[tokio::test]
    async fn test_concurrent_failing_initialize_fetches_once() {
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery_body(500, serde_json::json!({}), None).await;

        let authorizer = Arc::new(Authorizer::new(settings(idp.discovery_url())));
        let tasks = (0..10).map(|_| {
            let authorizer = authorizer.clone();
            tokio::spawn(async move { authorizer.initialize().await })
        });
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        assert_eq!(authorizer.state(), AuthorizerState::Degraded);
        assert_eq!(idp.request_count("/.well-known/openid-configuration").await, 1);
    }

    #[tokio::test]
    async fn test_hanging_discovery_fails_within_upstream_timeout() {
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery_delayed(Duration::from_secs(10)).await;

        let authorizer = Authorizer::new(AuthSettings {
            upstream_timeout: Duration::from_millis(200),
            ..settings(idp.discovery_url())
        });

        tokio::time::timeout(Duration::from_secs(3), authorizer.initialize())
            .await
            .expect("initialize should give up after the upstream timeout");

        assert_eq!(authorizer.state(), AuthorizerState::Degraded);
    }

    #[tokio::test]
    async fn test_explicit_reinitialize_recovers() {
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery_failure(503, 1).await;
        idp.mount_discovery().await;

        let authorizer = Authorizer::new(settings(idp.discovery_url()));
        authorizer.initialize().await;
        assert_eq!(authorizer.state(), AuthorizerState::Degraded);

        authorizer.initialize().await;
        assert_eq!(authorizer.state(), AuthorizerState::Ready);
    }

    #[tokio::test]
    async fn test_protect_outcomes_when_ready() {
        let keypair = TestKeypair::new(11, "gate-key");
        let idp = MockIdentityProvider::start().await;
        idp.mount_discovery().await;
        idp.mount_jwks(&[&keypair]).await;

        let authorizer = Authorizer::new(settings(idp.discovery_url()));
        authorizer.initialize().await;
        let resource = ResourceId::from("https://api.example");

        // Missing credential: 401 unauthorized with challenge
        let err = authorizer
            .protect(&HeaderMap::new(), &resource)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "unauthorized");
        assert!(err.challenge().unwrap().contains("realm=\"https://api.example\""));

        // Wrong scheme
        let err = authorizer
            .protect(&headers_with("Basic dXNlcjpwYXNz"), &resource)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "unauthorized");

        // Valid token
        let token = keypair.sign(&TestClaims::new(&idp.issuer(), "https://api.example").with_sub("abc"));
        let claims = authorizer
            .protect(&headers_with(&format!("Bearer {token}")), &resource)
            .await
            .unwrap();
        assert_eq!(claims.sub, "abc");

        // Same token presented to a different host
        let err = authorizer
            .protect(
                &headers_with(&format!("Bearer {token}")),
                &ResourceId::from("https://other.example"),
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AuthError::InvalidToken("JWT verification failed: unexpected audience".to_string())
        );

        // Empty bearer token
        let err = authorizer
            .protect(&headers_with("Bearer "), &resource)
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "invalid_token");
        assert!(err.description().starts_with("JWT verification failed: "));
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::from_vars(&std::collections::HashMap::new()).unwrap();
        let settings = AuthSettings::from_config(&config);

        assert_eq!(settings.clock_skew, Duration::from_secs(60));
        assert_eq!(settings.discovery_url, config.discovery_url);
        assert_eq!(settings.allowed_algorithms, vec![Algorithm::EdDSA]);
    }

    #[test]
    fn test_state_labels() {
        assert_eq!(AuthorizerState::Uninitialized.as_str(), "uninitialized");
        assert_eq!(AuthorizerState::Ready.as_str(), "ready");
        assert_eq!(AuthorizerState::Degraded.as_str(), "degraded");
    }
}
