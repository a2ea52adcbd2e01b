//! OIDC discovery document retrieval.
//!
//! The identity provider's discovery document names the issuer that access
//! tokens must carry and the location of its signing keys. It is fetched once
//! and kept for the lifetime of the process.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

/// Errors that leave the discovery document unavailable.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("discovery request failed: {0}")]
    Request(String),

    #[error("discovery endpoint returned HTTP {0}")]
    Status(u16),

    #[error("discovery document is not valid JSON: {0}")]
    Malformed(String),

    #[error("discovery document is missing '{0}'")]
    MissingField(&'static str),

    #[error("discovery document has an invalid jwks_uri: {0}")]
    InvalidJwksUri(String),
}

impl DiscoveryError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DiscoveryError::Request(_) => "request",
            DiscoveryError::Status(_) => "status",
            DiscoveryError::Malformed(_) => "malformed",
            DiscoveryError::MissingField(_) => "missing_field",
            DiscoveryError::InvalidJwksUri(_) => "invalid_jwks_uri",
        }
    }
}

/// The identity provider's OIDC discovery document.
///
/// Only `issuer` and `jwks_uri` are interpreted; every other member is kept
/// verbatim so the document can be served back to clients unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryMetadata {
    #[serde(default)]
    pub issuer: String,

    #[serde(default)]
    pub jwks_uri: String,

    #[serde(flatten)]
    pub additional: serde_json::Map<String, serde_json::Value>,
}

impl DiscoveryMetadata {
    /// Check that the document names an issuer and an absolute key set URL.
    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.issuer.trim().is_empty() {
            return Err(DiscoveryError::MissingField("issuer"));
        }
        if self.jwks_uri.trim().is_empty() {
            return Err(DiscoveryError::MissingField("jwks_uri"));
        }

        let url = Url::parse(&self.jwks_uri)
            .map_err(|e| DiscoveryError::InvalidJwksUri(e.to_string()))?;
        if !matches!(url.scheme(), "https" | "http") {
            return Err(DiscoveryError::InvalidJwksUri(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        Ok(())
    }
}

/// Fetch and validate the discovery document at `url`.
///
/// # Errors
///
/// Returns `DiscoveryError` on transport failure, non-2xx status, a body that
/// is not a JSON object, or a document without a usable `issuer`/`jwks_uri`.
#[instrument(skip(client), fields(url = %url))]
pub async fn fetch_discovery(
    client: &reqwest::Client,
    url: &str,
) -> Result<DiscoveryMetadata, DiscoveryError> {
    tracing::debug!(target: "mcp.auth.discovery", "Fetching OIDC discovery document");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| DiscoveryError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(DiscoveryError::Status(status.as_u16()));
    }

    let metadata: DiscoveryMetadata = response
        .json()
        .await
        .map_err(|e| DiscoveryError::Malformed(e.to_string()))?;

    metadata.validate()?;

    tracing::debug!(
        target: "mcp.auth.discovery",
        issuer = %metadata.issuer,
        jwks_uri = %metadata.jwks_uri,
        "Discovery document fetched"
    );

    Ok(metadata)
}
