//! Signing key cache backed by the identity provider's JWKS endpoint.
//!
//! Keys are fetched on demand: a lookup for an unknown `kid`, or a lookup
//! against a key set older than `max_age`, triggers a refresh. There is no
//! background refresh task.
//!
//! # Security
//!
//! - Only keys published by the configured `jwks_uri` are ever used
//! - Keys without a `kid`, or published for a use other than `sig`, are ignored
//! - Unknown-`kid` refreshes are rate limited by `refresh_cooldown` so forged
//!   key IDs cannot turn every request into an upstream fetch

use crate::observability::metrics::record_jwks_refresh;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Errors resolving a verification key.
///
/// All of these reject the current request as `invalid_token`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyResolutionError {
    #[error("no signing key found for kid '{0}'")]
    UnknownKid(String),

    #[error("failed to fetch signing keys: {0}")]
    Fetch(String),

    #[error("signing key endpoint returned HTTP {0}")]
    Status(u16),

    #[error("signing key set is malformed: {0}")]
    Malformed(String),
}

/// JSON Web Key as published by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("OKP", "RSA", "EC", ...).
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    #[serde(default)]
    pub kid: Option<String>,

    /// Curve name for OKP and EC keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key, or EC x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm the key is intended for.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use ("sig" for signing).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

#[derive(Deserialize)]
struct JwksDocument {
    keys: Vec<serde_json::Value>,
}

struct CachedJwks {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

/// Cache of the identity provider's signing keys, indexed by `kid`.
pub struct JwksCache {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: RwLock<Option<CachedJwks>>,
    /// Serializes refreshes so concurrent misses share one fetch.
    refresh_lock: Mutex<()>,
    max_age: Duration,
    refresh_cooldown: Duration,
}

impl JwksCache {
    /// Create an empty cache for `jwks_url`. Nothing is fetched until the
    /// first lookup.
    pub fn new(
        jwks_url: String,
        http_client: reqwest::Client,
        max_age: Duration,
        refresh_cooldown: Duration,
    ) -> Self {
        Self {
            jwks_url,
            http_client,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            max_age,
            refresh_cooldown,
        }
    }

    /// Resolve the key for `kid`, refreshing the key set on a miss or when
    /// the cached set is older than `max_age`.
    ///
    /// # Errors
    ///
    /// - `UnknownKid` - the key set does not contain `kid` after refresh
    /// - `Fetch`, `Status`, `Malformed` - the refresh itself failed
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn resolve(&self, kid: &str) -> Result<Jwk, KeyResolutionError> {
        if let Some(key) = self.lookup_fresh(kid).await {
            tracing::debug!(target: "mcp.auth.jwks", "JWKS cache hit");
            return Ok(key);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while this one waited for the lock.
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                let age = cached.fetched_at.elapsed();
                if age < self.max_age {
                    if let Some(key) = cached.keys.get(kid) {
                        return Ok(key.clone());
                    }
                    if age < self.refresh_cooldown {
                        tracing::debug!(
                            target: "mcp.auth.jwks",
                            "Unknown kid within refresh cooldown, not refetching"
                        );
                        return Err(KeyResolutionError::UnknownKid(kid.to_string()));
                    }
                }
            }
        }

        self.refresh().await?;

        let cache = self.cache.read().await;
        cache
            .as_ref()
            .and_then(|cached| cached.keys.get(kid))
            .cloned()
            .ok_or_else(|| {
                tracing::warn!(target: "mcp.auth.jwks", "Key not found in JWKS after refresh");
                KeyResolutionError::UnknownKid(kid.to_string())
            })
    }

    async fn lookup_fresh(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cache.read().await;
        let cached = cache.as_ref()?;
        if cached.fetched_at.elapsed() >= self.max_age {
            return None;
        }
        cached.keys.get(kid).cloned()
    }

    /// Fetch the key set and replace the cached copy.
    ///
    /// On failure the previous key set is left untouched.
    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<(), KeyResolutionError> {
        let start = Instant::now();
        let result = self.fetch().await;
        record_jwks_refresh(
            if result.is_ok() { "success" } else { "error" },
            start.elapsed(),
        );

        let keys = result.map_err(|e| {
            tracing::error!(
                target: "mcp.auth.jwks",
                url = %self.jwks_url,
                error = %e,
                "Failed to refresh JWKS"
            );
            e
        })?;

        tracing::info!(
            target: "mcp.auth.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            fetched_at: Instant::now(),
        });

        Ok(())
    }

    async fn fetch(&self) -> Result<HashMap<String, Jwk>, KeyResolutionError> {
        tracing::debug!(target: "mcp.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| KeyResolutionError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyResolutionError::Status(status.as_u16()));
        }

        let document: JwksDocument = response
            .json()
            .await
            .map_err(|e| KeyResolutionError::Malformed(e.to_string()))?;

        Ok(index_signing_keys(document.keys))
    }
}

/// Index usable signing keys by `kid`.
///
/// Entries that do not parse as a JWK, lack a `kid`, or declare a `use`
/// other than `sig` are skipped. On duplicate `kid` the first entry wins.
fn index_signing_keys(entries: Vec<serde_json::Value>) -> HashMap<String, Jwk> {
    let mut keys = HashMap::new();

    for entry in entries {
        let jwk: Jwk = match serde_json::from_value(entry) {
            Ok(jwk) => jwk,
            Err(e) => {
                tracing::debug!(target: "mcp.auth.jwks", error = %e, "Skipping unparseable JWK");
                continue;
            }
        };

        if jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            continue;
        }

        let Some(kid) = jwk.kid.clone().filter(|k| !k.is_empty()) else {
            continue;
        };

        keys.entry(kid).or_insert(jwk);
    }

    keys
}
