//! JWT utilities shared across the to-do backend.
//!
//! Everything that happens to a bearer token before its signature is
//! checked: the size limit, unverified decoding of header (`kid`, `alg`)
//! and payload, and the `iat` skew check applied after verification.
//!
//! # Security
//!
//! - Oversized tokens are rejected before any decoding
//! - Nothing decoded here is trusted; the signature MUST still be verified
//!   with a key looked up by `kid` from a trusted key set
//! - All errors display the same message
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{decode_unverified, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let unverified = decode_unverified::<Claims>(token)?;
//! let key = key_set.get(&unverified.header.kid)?;
//! // ... verify signature with `key` ...
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Largest accepted token, in bytes.
///
/// Identity-provider access tokens are typically 700-1500 bytes with an RSA
/// signature.
pub const MAX_JWT_SIZE_BYTES: usize = 8 * 1024;

/// Default tolerance for an `iat` in the future (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Upper bound for a configured `iat` tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Pre-verification token failure.
///
/// Every variant displays the same text; `reason()` tells them apart in logs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Longer than `MAX_JWT_SIZE_BYTES`.
    #[error("Invalid bearer token")]
    TokenTooLarge,

    /// Not three segments, empty signature, bad base64 or bad JSON.
    #[error("Invalid bearer token")]
    MalformedToken,

    /// Header has no usable `kid`.
    #[error("Invalid bearer token")]
    MissingKid,

    /// `iat` later than now plus the tolerance.
    #[error("Invalid bearer token")]
    IatTooFarInFuture,
}

impl JwtValidationError {
    /// Short, stable description used as a log field.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            JwtValidationError::TokenTooLarge => "token too large",
            JwtValidationError::MalformedToken => "malformed token structure",
            JwtValidationError::MissingKid => "missing kid header",
            JwtValidationError::IatTooFarInFuture => "iat too far in the future",
        }
    }
}

// =============================================================================
// Types
// =============================================================================

/// JWT header fields needed to select and pin a verification key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct JwtHeader {
    /// Declared signing algorithm. Untrusted until compared to configuration.
    pub alg: String,

    /// Key ID used to look up the public key in the key set.
    #[serde(default)]
    pub kid: Option<String>,

    /// Token type, usually "JWT".
    #[serde(default)]
    pub typ: Option<String>,
}

/// A token decoded without signature verification.
#[derive(Debug, Clone)]
pub struct UnverifiedJwt<C> {
    /// Key ID from the header (guaranteed non-empty).
    pub kid: String,

    /// Declared algorithm from the header.
    pub alg: String,

    /// Payload claims. NOT trusted until the signature is verified.
    pub claims: C,
}

// =============================================================================
// Functions
// =============================================================================

/// Decode a JWT's header and payload without verifying the signature.
///
/// The result is untrusted; use `kid` only to look up a key in a trusted
/// key set and `alg` only to compare against configuration.
///
/// # Errors
///
/// - `TokenTooLarge` before anything is decoded
/// - `MalformedToken` for a wrong segment count, an empty signature, bad
///   base64 or JSON that does not fit `JwtHeader` / `C`
/// - `MissingKid` if `kid` is absent or empty
pub fn decode_unverified<C: DeserializeOwned>(
    token: &str,
) -> Result<UnverifiedJwt<C>, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            "Token exceeds size limit"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let segments: Vec<&str> = token.split('.').collect();
    let [header_part, payload_part, signature_part] = segments.as_slice() else {
        tracing::debug!(
            target: "common.jwt",
            segments = segments.len(),
            "Token does not have three segments"
        );
        return Err(JwtValidationError::MalformedToken);
    };

    if signature_part.is_empty() {
        tracing::debug!(target: "common.jwt", "Token rejected: empty signature segment");
        return Err(JwtValidationError::MalformedToken);
    }

    let header: JwtHeader = decode_segment(header_part, "header")?;
    let claims: C = decode_segment(payload_part, "payload")?;

    let kid = header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(UnverifiedJwt {
        kid,
        alg: header.alg,
        claims,
    })
}

fn decode_segment<T: DeserializeOwned>(
    segment: &str,
    name: &'static str,
) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to decode JWT base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", segment = name, error = %e, "Failed to parse JWT JSON");
        JwtValidationError::MalformedToken
    })
}

/// Check that `iat` is at most `clock_skew` ahead of the current time.
///
/// # Errors
///
/// `JwtValidationError::IatTooFarInFuture` otherwise.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let skew_secs = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let latest_accepted = now.saturating_add(skew_secs);

    if iat > latest_accepted {
        tracing::debug!(
            target: "common.jwt",
            iat,
            latest_accepted,
            "Token issued in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Raw Ed25519 public key bytes from an OKP JWK's `x` member.
///
/// # Errors
///
/// Returns the base64 error if `x` is not unpadded base64url.
pub fn decode_ed25519_public_key_jwk(x: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x)
}

// =============================================================================
// Tests
// =============================================================================
