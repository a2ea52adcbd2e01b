//! Builder patterns for access token claims
//!
//! Provides a fluent API for the claims an identity provider would issue.

use chrono::{Duration, Utc};
use serde::Serialize;

/// Builder for access token claims.
///
/// Defaults to a token issued now, valid for one hour, for subject
/// `test-subject`.
///
/// # Example
/// ```rust,ignore
/// let claims = TestClaims::new("https://idp.example", "https://api.example")
///     .with_sub("alice")
///     .with_scope("mcp:read");
/// let token = keypair.sign(&claims);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct TestClaims {
    pub sub: String,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TestClaims {
    /// Claims for `issuer` addressed to `audience`.
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = Utc::now();
        Self {
            sub: "test-subject".to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            nbf: None,
            scope: None,
        }
    }

    /// Set the subject
    pub fn with_sub(mut self, sub: &str) -> Self {
        self.sub = sub.to_string();
        self
    }

    /// Set the scope (space-separated)
    pub fn with_scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    /// Set the expiration timestamp
    pub fn with_exp(mut self, exp: i64) -> Self {
        self.exp = exp;
        self
    }

    /// Set the not-before timestamp
    pub fn with_nbf(mut self, nbf: i64) -> Self {
        self.nbf = Some(nbf);
        self
    }

    /// Expired an hour ago, well beyond any allowed clock skew.
    pub fn expired(self) -> Self {
        let now = Utc::now();
        Self {
            iat: (now - Duration::seconds(7200)).timestamp(),
            exp: (now - Duration::seconds(3600)).timestamp(),
            ..self
        }
    }

    /// Not valid until an hour from now.
    pub fn not_yet_valid(self) -> Self {
        let nbf = (Utc::now() + Duration::seconds(3600)).timestamp();
        Self {
            exp: nbf + 3600,
            ..self.with_nbf(nbf)
        }
    }

    /// Issued an hour in the future.
    pub fn issued_in_future(self) -> Self {
        let now = Utc::now();
        Self {
            iat: (now + Duration::seconds(3600)).timestamp(),
            exp: (now + Duration::seconds(7200)).timestamp(),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let claims = TestClaims::new("https://idp.example", "https://api.example");
        let value = serde_json::to_value(&claims).unwrap();

        assert_eq!(value["iss"], "https://idp.example");
        assert_eq!(value["aud"], "https://api.example");
        assert_eq!(value["sub"], "test-subject");
        assert!(value.get("nbf").is_none());
        assert!(value.get("scope").is_none());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_time_shifts() {
        let now = Utc::now().timestamp();
        let base = TestClaims::new("i", "a");

        assert!(base.clone().expired().exp < now);
        assert!(base.clone().not_yet_valid().nbf.unwrap() > now);
        assert!(base.issued_in_future().iat > now);
    }
}
