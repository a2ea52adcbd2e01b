//! Access token verification.
//!
//! Verifies bearer tokens against keys from the identity provider's JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only allow-listed asymmetric algorithms are accepted; `HS*` and `none`
//!   never reach signature verification
//! - The JWK type must match the algorithm family of the token header
//! - `iss`, `aud`, `exp`, `nbf` and `iat` are validated with clock skew
//!   tolerance

use crate::auth::claims::TokenClaims;
use crate::auth::jwks::{Jwk, JwksCache, KeyResolutionError};
use crate::config::is_asymmetric;
use common::jwt::{decode_jwk_component, peek_header, validate_iat, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Claims every accepted token must carry.
const REQUIRED_CLAIMS: [&str; 4] = ["exp", "iss", "aud", "sub"];

/// Reasons a token fails verification.
///
/// The display text is returned to the client after
/// `"JWT verification failed: "`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenVerificationError {
    #[error(transparent)]
    Header(#[from] JwtValidationError),

    #[error("algorithm '{0}' is not allowed")]
    DisallowedAlgorithm(String),

    #[error(transparent)]
    Key(#[from] KeyResolutionError),

    #[error("signing key does not match token algorithm: {0}")]
    KeyMismatch(String),

    #[error("signing key is unusable: {0}")]
    InvalidKey(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("unexpected issuer")]
    InvalidIssuer,

    #[error("unexpected audience")]
    InvalidAudience,

    #[error("missing required claim '{0}'")]
    MissingClaim(String),

    #[error("invalid token: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for TokenVerificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenVerificationError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenVerificationError::Expired,
            ErrorKind::ImmatureSignature => TokenVerificationError::NotYetValid,
            ErrorKind::InvalidIssuer => TokenVerificationError::InvalidIssuer,
            ErrorKind::InvalidAudience => TokenVerificationError::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => {
                TokenVerificationError::MissingClaim(claim.clone())
            }
            ErrorKind::InvalidAlgorithm => {
                TokenVerificationError::KeyMismatch("algorithm not supported by key".to_string())
            }
            _ => TokenVerificationError::Invalid(err.to_string()),
        }
    }
}

/// Verifies access tokens for one resource server.
#[derive(Debug, Clone)]
pub struct JwtValidator {
    /// Algorithms accepted in the token header.
    allowed_algorithms: Vec<Algorithm>,

    /// Leeway for `exp`, `nbf` and `iat`.
    clock_skew: Duration,
}

impl JwtValidator {
    /// Create a validator. Symmetric algorithms are dropped from the
    /// allow-list even if passed in.
    pub fn new(allowed_algorithms: Vec<Algorithm>, clock_skew: Duration) -> Self {
        let allowed_algorithms = allowed_algorithms
            .into_iter()
            .filter(|alg| is_asymmetric(*alg))
            .collect();
        Self {
            allowed_algorithms,
            clock_skew,
        }
    }

    /// Verify `token` and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check and header inspection (`kid`, `alg`)
    /// 2. `alg` must be allow-listed
    /// 3. Key resolution by `kid` (may refresh the key set)
    /// 4. JWK type and declared algorithm must match `alg`
    /// 5. Signature, `iss`, `aud`, `exp`, `nbf` with leeway
    /// 6. `iat` no further in the future than the leeway
    #[instrument(skip_all, fields(issuer = %issuer, audience = %audience))]
    pub async fn verify(
        &self,
        token: &str,
        keys: &JwksCache,
        issuer: &str,
        audience: &str,
    ) -> Result<TokenClaims, TokenVerificationError> {
        let header = peek_header(token)?;

        let algorithm = self.allowed_algorithm(&header.alg).ok_or_else(|| {
            tracing::debug!(target: "mcp.auth.jwt", alg = %header.alg, "Token algorithm not allowed");
            TokenVerificationError::DisallowedAlgorithm(header.alg.clone())
        })?;

        let jwk = keys.resolve(&header.kid).await?;
        let decoding_key = decoding_key_for(&jwk, algorithm)?;

        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&REQUIRED_CLAIMS);
        validation.leeway = self.clock_skew.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data = decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "mcp.auth.jwt", error = %e, "Token verification failed");
            TokenVerificationError::from(e)
        })?;

        if let Some(iat) = token_data.claims.iat {
            validate_iat(iat, self.clock_skew)?;
        }

        tracing::debug!(target: "mcp.auth.jwt", kid = %header.kid, "Token verified");
        Ok(token_data.claims)
    }

    fn allowed_algorithm(&self, name: &str) -> Option<Algorithm> {
        let algorithm = Algorithm::from_str(name).ok()?;
        self.allowed_algorithms
            .contains(&algorithm)
            .then_some(algorithm)
    }
}

/// Build a decoding key from `jwk`, checking it belongs to `algorithm`'s family.
fn decoding_key_for(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, TokenVerificationError> {
    if let Some(jwk_alg) = jwk.alg.as_deref() {
        if Algorithm::from_str(jwk_alg).ok() != Some(algorithm) {
            tracing::warn!(target: "mcp.auth.jwt", jwk_alg = %jwk_alg, ?algorithm, "JWK algorithm mismatch");
            return Err(TokenVerificationError::KeyMismatch(format!(
                "key is for {jwk_alg}"
            )));
        }
    }

    match algorithm {
        Algorithm::EdDSA => {
            expect_key_type(jwk, "OKP")?;
            expect_curve(jwk, "Ed25519")?;
            let x = required_member(jwk, "x", jwk.x.as_deref())?;
            let public_key = decode_jwk_component(x)
                .map_err(|e| TokenVerificationError::InvalidKey(format!("bad 'x': {e}")))?;
            Ok(DecodingKey::from_ed_der(&public_key))
        }
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => {
            expect_key_type(jwk, "RSA")?;
            let n = required_member(jwk, "n", jwk.n.as_deref())?;
            let e = required_member(jwk, "e", jwk.e.as_deref())?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| TokenVerificationError::InvalidKey(e.to_string()))
        }
        Algorithm::ES256 | Algorithm::ES384 => {
            expect_key_type(jwk, "EC")?;
            expect_curve(
                jwk,
                if algorithm == Algorithm::ES256 {
                    "P-256"
                } else {
                    "P-384"
                },
            )?;
            let x = required_member(jwk, "x", jwk.x.as_deref())?;
            let y = required_member(jwk, "y", jwk.y.as_deref())?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| TokenVerificationError::InvalidKey(e.to_string()))
        }
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Err(
            TokenVerificationError::DisallowedAlgorithm(format!("{algorithm:?}")),
        ),
    }
}

fn expect_key_type(jwk: &Jwk, kty: &str) -> Result<(), TokenVerificationError> {
    if jwk.kty == kty {
        Ok(())
    } else {
        tracing::warn!(target: "mcp.auth.jwt", kty = %jwk.kty, expected = %kty, "Unexpected JWK key type");
        Err(TokenVerificationError::KeyMismatch(format!(
            "expected key type {kty}, found {}",
            jwk.kty
        )))
    }
}

fn expect_curve(jwk: &Jwk, crv: &str) -> Result<(), TokenVerificationError> {
    match jwk.crv.as_deref() {
        None => Ok(()),
        Some(found) if found == crv => Ok(()),
        Some(found) => Err(TokenVerificationError::KeyMismatch(format!(
            "expected curve {crv}, found {found}"
        ))),
    }
}

fn required_member<'a>(
    jwk: &Jwk,
    name: &str,
    value: Option<&'a str>,
) -> Result<&'a str, TokenVerificationError> {
    value.ok_or_else(|| {
        tracing::error!(target: "mcp.auth.jwt", kid = ?jwk.kid, member = %name, "JWK missing member");
        TokenVerificationError::InvalidKey(format!("missing '{name}'"))
    })
}
