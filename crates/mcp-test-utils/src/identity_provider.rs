//! Mock identity provider for authorization tests
//!
//! Serves an OIDC discovery document and a JWKS from a wiremock server, so
//! tests exercise the real HTTP fetch paths of the resource server.

use crate::crypto_fixtures::TestKeypair;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path of the discovery document on the mock provider.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Path of the key set on the mock provider.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// A wiremock-backed identity provider whose issuer is its own base URL.
///
/// # Example
/// ```rust,ignore
/// let idp = MockIdentityProvider::start().await;
/// idp.mount_discovery().await;
/// idp.mount_jwks(&[&TestKeypair::new(1, "key-1")]).await;
/// ```
pub struct MockIdentityProvider {
    server: MockServer,
}

impl MockIdentityProvider {
    /// Start a provider with nothing mounted.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer advertised in the discovery document.
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.server.uri(), DISCOVERY_PATH)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// A realistic discovery document pointing at this provider.
    pub fn discovery_document(&self) -> Value {
        let base = self.server.uri();
        json!({
            "issuer": base,
            "jwks_uri": self.jwks_url(),
            "authorization_endpoint": format!("{base}/authorize"),
            "token_endpoint": format!("{base}/oauth/token"),
            "registration_endpoint": format!("{base}/register"),
            "response_types_supported": ["code"],
            "grant_types_supported": ["authorization_code", "refresh_token"],
            "code_challenge_methods_supported": ["S256"]
        })
    }

    /// Serve the discovery document for any number of requests.
    pub async fn mount_discovery(&self) {
        self.mount_discovery_body(200, self.discovery_document(), None)
            .await;
    }

    /// Serve the discovery document and verify on drop that it was fetched
    /// exactly `times` times.
    pub async fn mount_discovery_expecting(&self, times: u64) {
        self.mount_discovery_body(200, self.discovery_document(), Some(times))
            .await;
    }

    /// Fail the next `times` discovery requests with `status`, verifying on
    /// drop that exactly that many were made.
    pub async fn mount_discovery_failure(&self, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// Serve an arbitrary discovery body.
    pub async fn mount_discovery_body(&self, status: u16, body: Value, expect: Option<u64>) {
        let mock = Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(body));
        let mock = match expect {
            Some(times) => mock.expect(times),
            None => mock,
        };
        mock.mount(&self.server).await;
    }

    /// Publish `keypairs` at the JWKS endpoint.
    pub async fn mount_jwks(&self, keypairs: &[&TestKeypair]) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keypairs)))
            .mount(&self.server)
            .await;
    }

    /// Publish `keypairs` for the next `times` JWKS requests only. Mount a
    /// later key set afterwards to simulate rotation.
    pub async fn mount_jwks_once(&self, keypairs: &[&TestKeypair], times: u64) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks_document(keypairs)))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Serve the discovery document only after `delay`, simulating a hung
    /// provider.
    pub async fn mount_discovery_delayed(&self, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(DISCOVERY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(self.discovery_document())
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Publish `keypairs` only after `delay`.
    pub async fn mount_jwks_delayed(&self, keypairs: &[&TestKeypair], delay: Duration) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(jwks_document(keypairs))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Fail every JWKS request with `status`.
    pub async fn mount_jwks_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the provider has received for `request_path`.
    pub async fn request_count(&self, request_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == request_path)
            .count()
    }
}

/// JWKS document containing the public halves of `keypairs`.
pub fn jwks_document(keypairs: &[&TestKeypair]) -> Value {
    let keys: Vec<Value> = keypairs.iter().map(|k| k.public_jwk()).collect();
    json!({ "keys": keys })
}
