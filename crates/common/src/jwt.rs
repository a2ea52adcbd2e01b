//! JWT utilities shared by the resource server and its test tooling.
//!
//! This module provides the pre-verification steps of bearer token handling:
//! - Size limits applied before any decoding
//! - Clock skew constants for time-based claim validation
//! - Unverified header inspection (`kid`, `alg`) for key selection
//! - `iat` validation logic
//! - JWK component decoding
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Nothing read by [`peek_header`] is trusted; it only selects a key from a
//!   key set the server fetched itself
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{peek_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let header = peek_header(token)?;
//! let key = jwks.resolve(&header.kid).await?;
//! // ... verify signature with `key` ...
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Tokens above this size are rejected before base64 decoding or any
/// cryptographic work. Typical access tokens are well under 1KB.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default clock skew tolerance applied to `exp`, `nbf` and `iat`.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(60);

/// Maximum configurable clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors produced while inspecting a token before signature verification.
///
/// Messages are safe to return to the caller: they describe the token, not
/// server internals.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("token exceeds maximum size of {MAX_JWT_SIZE_BYTES} bytes")]
    TokenTooLarge,

    /// Token is not a three-part compact JWS with a JSON header.
    #[error("token is not a well-formed JWT")]
    MalformedToken,

    /// Token header does not name a signing key.
    #[error("token header is missing 'kid'")]
    MissingKid,

    /// Token `iat` claim lies beyond the tolerated clock skew.
    #[error("token was issued in the future")]
    IatTooFarInFuture,
}

// =============================================================================
// Header inspection
// =============================================================================

/// The parts of a JWT header needed to pick a verification key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnverifiedHeader {
    /// Key identifier of the signing key.
    pub kid: String,

    /// Signing algorithm as written in the header (e.g. `EdDSA`).
    pub alg: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<serde_json::Value>,
    #[serde(default)]
    kid: Option<serde_json::Value>,
}

/// Read `kid` and `alg` from a JWT header without verifying the signature.
///
/// # Errors
///
/// - `TokenTooLarge` - token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` - wrong number of segments, bad base64, header is not a
///   JSON object, or `alg` is missing / not a string
/// - `MissingKid` - `kid` is missing, not a string, or empty
pub fn peek_header(token: &str) -> Result<UnverifiedHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT segment count");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = header
        .alg
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MalformedToken)?;

    let kid = header
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedHeader { kid, alg })
}

// =============================================================================
// Claim helpers
// =============================================================================

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` ahead of the current time.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // clock_skew is bounded by MAX_CLOCK_SKEW
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode a base64url (unpadded) JWK member such as `x`, `y`, `n` or `e`.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the value is not valid base64url.
pub fn decode_jwk_component(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        let header_b64 = URL_SAFE_NO_PAD.encode(header);
        format!("{header_b64}.payload.signature")
    }

    #[test]
    fn test_default_clock_skew_within_max() {
        assert!(DEFAULT_CLOCK_SKEW <= MAX_CLOCK_SKEW);
        assert_eq!(MAX_CLOCK_SKEW, Duration::from_secs(600));
    }

    // -------------------------------------------------------------------------
    // peek_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_peek_header_valid_token() {
        let token = token_with_header(r#"{"alg":"EdDSA","typ":"JWT","kid":"idp-key-01"}"#);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.kid, "idp-key-01");
        assert_eq!(header.alg, "EdDSA");
    }

    #[test]
    fn test_peek_header_missing_kid() {
        let token = token_with_header(r#"{"alg":"EdDSA","typ":"JWT"}"#);
        assert!(matches!(
            peek_header(&token),
            Err(JwtValidationError::MissingKid)
        ));
    }

    #[test]
    fn test_peek_header_empty_or_non_string_kid() {
        for header in [
            r#"{"alg":"EdDSA","kid":""}"#,
            r#"{"alg":"EdDSA","kid":12345}"#,
            r#"{"alg":"EdDSA","kid":null}"#,
        ] {
            assert!(
                matches!(
                    peek_header(&token_with_header(header)),
                    Err(JwtValidationError::MissingKid)
                ),
                "header {header} should be rejected"
            );
        }
    }

    #[test]
    fn test_peek_header_missing_alg() {
        let token = token_with_header(r#"{"typ":"JWT","kid":"k"}"#);
        assert!(matches!(
            peek_header(&token),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_peek_header_keeps_none_alg_for_caller_to_reject() {
        // The allow-list lives with the verifier; this layer only reports.
        let token = token_with_header(r#"{"alg":"none","kid":"k"}"#);
        assert_eq!(peek_header(&token).unwrap().alg, "none");
    }

    #[test]
    fn test_peek_header_wrong_segment_count() {
        for token in ["", "single", "only.two", "one.two.three.four"] {
            assert!(
                matches!(peek_header(token), Err(JwtValidationError::MalformedToken)),
                "token {token:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_peek_header_invalid_base64() {
        assert!(matches!(
            peek_header("!!!invalid!!!.payload.signature"),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_peek_header_invalid_json() {
        let token = token_with_header("not-json");
        assert!(matches!(
            peek_header(&token),
            Err(JwtValidationError::MalformedToken)
        ));
    }

    #[test]
    fn test_peek_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert!(matches!(
            peek_header(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        ));
    }

    #[test]
    fn test_peek_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(remaining - payload_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        assert_eq!(peek_header(&token).unwrap().kid, "key");
    }

    #[test]
    fn test_error_messages_describe_the_token() {
        assert_eq!(
            JwtValidationError::MissingKid.to_string(),
            "token header is missing 'kid'"
        );
        assert!(JwtValidationError::TokenTooLarge
            .to_string()
            .contains("8192"));
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_and_past() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
        assert!(validate_iat(now - 3600, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert!(matches!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;
        let skew = Duration::from_secs(60);

        assert!(validate_iat_at(now + 60, skew, now).is_ok());
        assert!(matches!(
            validate_iat_at(now + 61, skew, now),
            Err(JwtValidationError::IatTooFarInFuture)
        ));
    }

    // -------------------------------------------------------------------------
    // JWK component decoding
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_jwk_component() {
        let x = "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo";
        assert_eq!(decode_jwk_component(x).unwrap().len(), 32);
    }

    #[test]
    fn test_decode_jwk_component_invalid() {
        assert!(decode_jwk_component("not-valid-base64url!!!").is_err());
    }
}
