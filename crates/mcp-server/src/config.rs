//! MCP resource server configuration.
//!
//! Configuration is loaded from environment variables. Invalid values are
//! rejected at startup rather than silently replaced with defaults.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default authorization server (identity provider) base URL.
pub const DEFAULT_AUTHORIZATION_SERVER_URL: &str = "https://login.adventuresindevops.com";

/// Path of the OIDC discovery document relative to the authorization server.
pub const OIDC_DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// Default space-separated scopes advertised to clients.
pub const DEFAULT_SUPPORTED_SCOPES: &str = "mcp:read mcp:write profile";

/// Default comma-separated signing algorithms accepted on access tokens.
pub const DEFAULT_ALLOWED_ALGORITHMS: &str = "EdDSA";

/// Default timeout for discovery and JWKS fetches.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the upstream fetch timeout.
pub const MAX_UPSTREAM_TIMEOUT_SECONDS: u64 = 60;

/// Default maximum age of a cached key set before a lookup refreshes it.
pub const DEFAULT_JWKS_MAX_AGE_SECONDS: u64 = 3600;

/// Default minimum interval between refreshes triggered by unknown key IDs.
pub const DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS: u64 = 10;

/// Default display name in the server manifest.
pub const DEFAULT_SERVER_NAME: &str = "DCR Validator MCP Server";

/// MCP resource server configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Authorization server base URL, advertised in challenges and metadata.
    pub authorization_server_url: String,

    /// URL of the OIDC discovery document fetched at startup.
    pub discovery_url: String,

    /// Scopes advertised in challenges, the manifest and resource metadata.
    pub supported_scopes: Vec<String>,

    /// Asymmetric algorithms accepted in access token headers.
    pub allowed_algorithms: Vec<Algorithm>,

    /// Clock skew tolerance in seconds for `exp`, `nbf` and `iat`.
    pub jwt_clock_skew_seconds: i64,

    /// Timeout applied to discovery and JWKS requests.
    pub upstream_timeout: Duration,

    /// Cached key sets older than this are refreshed on the next lookup.
    pub jwks_max_age: Duration,

    /// Minimum interval between refreshes caused by unknown key IDs.
    pub jwks_refresh_cooldown: Duration,

    /// Seconds to wait after a shutdown signal before exiting.
    pub drain_seconds: u64,

    /// Display name in the server manifest.
    pub server_name: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let algorithms: Vec<String> = self
            .allowed_algorithms
            .iter()
            .map(|alg| format!("{alg:?}"))
            .collect();
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("authorization_server_url", &self.authorization_server_url)
            .field("discovery_url", &self.discovery_url)
            .field("supported_scopes", &self.supported_scopes)
            .field("allowed_algorithms", &algorithms)
            .field("jwt_clock_skew_seconds", &self.jwt_clock_skew_seconds)
            .field("upstream_timeout", &self.upstream_timeout)
            .field("jwks_max_age", &self.jwks_max_age)
            .field("jwks_refresh_cooldown", &self.jwks_refresh_cooldown)
            .field("drain_seconds", &self.drain_seconds)
            .field("server_name", &self.server_name)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid authorization server configuration: {0}")]
    InvalidAuthorizationServer(String),

    #[error("Invalid scope configuration: {0}")]
    InvalidScopes(String),

    #[error("Invalid JWT algorithm configuration: {0}")]
    InvalidAlgorithms(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid upstream timeout configuration: {0}")]
    InvalidUpstreamTimeout(String),

    #[error("Invalid JWKS cache configuration: {0}")]
    InvalidJwksCache(String),

    #[error("Invalid drain configuration: {0}")]
    InvalidDrain(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let authorization_server_url = vars
            .get("AUTHORIZATION_SERVER_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_AUTHORIZATION_SERVER_URL.to_string());
        if authorization_server_url.is_empty() {
            return Err(ConfigError::InvalidAuthorizationServer(
                "AUTHORIZATION_SERVER_URL must not be empty".to_string(),
            ));
        }

        let discovery_url = vars
            .get("OIDC_DISCOVERY_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{authorization_server_url}{OIDC_DISCOVERY_PATH}"));

        let supported_scopes: Vec<String> = vars
            .get("SUPPORTED_SCOPES")
            .map(String::as_str)
            .unwrap_or(DEFAULT_SUPPORTED_SCOPES)
            .split_whitespace()
            .map(ToString::to_string)
            .collect();
        if supported_scopes.is_empty() {
            return Err(ConfigError::InvalidScopes(
                "SUPPORTED_SCOPES must list at least one scope".to_string(),
            ));
        }

        let allowed_algorithms = parse_algorithms(
            vars.get("JWT_ALLOWED_ALGORITHMS")
                .map(String::as_str)
                .unwrap_or(DEFAULT_ALLOWED_ALGORITHMS),
        )?;

        // Parse JWT clock skew tolerance with validation
        #[allow(clippy::cast_possible_wrap)]
        let jwt_clock_skew_seconds = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: i64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value <= 0 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be positive, got {}",
                    value
                )));
            }

            if value > MAX_CLOCK_SKEW.as_secs() as i64 {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW.as_secs() as i64
        };

        let upstream_timeout_seconds = if let Some(value_str) = vars.get("UPSTREAM_TIMEOUT_SECONDS")
        {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidUpstreamTimeout(format!(
                    "UPSTREAM_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_UPSTREAM_TIMEOUT_SECONDS {
                return Err(ConfigError::InvalidUpstreamTimeout(format!(
                    "UPSTREAM_TIMEOUT_SECONDS must be between 1 and {}, got {}",
                    MAX_UPSTREAM_TIMEOUT_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_UPSTREAM_TIMEOUT_SECONDS
        };

        let jwks_max_age_seconds = if let Some(value_str) = vars.get("JWKS_MAX_AGE_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwksCache(format!(
                    "JWKS_MAX_AGE_SECONDS must be a valid positive integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidJwksCache(
                    "JWKS_MAX_AGE_SECONDS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_JWKS_MAX_AGE_SECONDS
        };

        let jwks_refresh_cooldown_seconds =
            if let Some(value_str) = vars.get("JWKS_REFRESH_COOLDOWN_SECONDS") {
                value_str.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidJwksCache(format!(
                        "JWKS_REFRESH_COOLDOWN_SECONDS must be a valid non-negative integer, got '{}': {}",
                        value_str, e
                    ))
                })?
            } else {
                DEFAULT_JWKS_REFRESH_COOLDOWN_SECONDS
            };

        if jwks_refresh_cooldown_seconds >= jwks_max_age_seconds {
            return Err(ConfigError::InvalidJwksCache(format!(
                "JWKS_REFRESH_COOLDOWN_SECONDS ({}) must be less than JWKS_MAX_AGE_SECONDS ({})",
                jwks_refresh_cooldown_seconds, jwks_max_age_seconds
            )));
        }

        let drain_seconds = if let Some(value_str) = vars.get("DRAIN_SECONDS") {
            value_str.parse::<u64>().map_err(|e| {
                ConfigError::InvalidDrain(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            0
        };

        let server_name = vars
            .get("SERVER_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SERVER_NAME.to_string());

        Ok(Config {
            bind_address,
            authorization_server_url,
            discovery_url,
            supported_scopes,
            allowed_algorithms,
            jwt_clock_skew_seconds,
            upstream_timeout: Duration::from_secs(upstream_timeout_seconds),
            jwks_max_age: Duration::from_secs(jwks_max_age_seconds),
            jwks_refresh_cooldown: Duration::from_secs(jwks_refresh_cooldown_seconds),
            drain_seconds,
            server_name,
        })
    }
}

/// Parse a comma-separated algorithm list, admitting only asymmetric algorithms.
fn parse_algorithms(value: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let mut algorithms = Vec::new();

    for name in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let algorithm = Algorithm::from_str(name).map_err(|_| {
            ConfigError::InvalidAlgorithms(format!("unknown algorithm '{name}'"))
        })?;

        if !is_asymmetric(algorithm) {
            return Err(ConfigError::InvalidAlgorithms(format!(
                "symmetric algorithm '{name}' cannot be used to verify third-party tokens"
            )));
        }

        if !algorithms.contains(&algorithm) {
            algorithms.push(algorithm);
        }
    }

    if algorithms.is_empty() {
        return Err(ConfigError::InvalidAlgorithms(
            "JWT_ALLOWED_ALGORITHMS must list at least one algorithm".to_string(),
        ));
    }

    Ok(algorithms)
}

/// Whether `algorithm` verifies with a public key.
pub fn is_asymmetric(algorithm: Algorithm) -> bool {
    !matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    )
}
