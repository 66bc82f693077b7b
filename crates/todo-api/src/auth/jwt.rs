//! JWT verification for identity-provider access tokens.
//!
//! Validates bearer tokens using public keys fetched from the identity
//! provider's JWKS endpoint.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Exactly one asymmetric algorithm is accepted; the header `alg` is
//!   checked against it before any key lookup, so forged headers never
//!   reach the key provider
//! - The JWK's key type must fit the algorithm family
//! - `exp`, `iss` and `aud` are validated with zero leeway; `iat` with the
//!   configured clock skew tolerance

use crate::auth::claims::Claims;
use crate::auth::jwks::{Jwk, JwksClient};
use crate::config::Config;
use crate::errors::AuthError;
use common::jwt::{decode_ed25519_public_key_jwk, decode_unverified, validate_iat};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// JWT verifier using the identity provider's JWKS.
pub struct JwtVerifier {
    /// Source of verification keys.
    jwks_client: Arc<JwksClient>,

    /// The single accepted signing algorithm.
    algorithm: Algorithm,

    /// Expected issuer.
    issuer: String,

    /// Expected audience.
    audience: String,

    /// Clock skew tolerance for iat validation.
    clock_skew: Duration,
}

impl JwtVerifier {
    /// Create a new JWT verifier.
    ///
    /// # Arguments
    ///
    /// * `jwks_client` - Client for fetching public keys
    /// * `algorithm` - The accepted signing algorithm (asymmetric)
    /// * `issuer` - Expected `iss` claim
    /// * `audience` - Expected `aud` claim
    /// * `clock_skew` - Clock skew tolerance for iat validation
    pub fn new(
        jwks_client: Arc<JwksClient>,
        algorithm: Algorithm,
        issuer: String,
        audience: String,
        clock_skew: Duration,
    ) -> Self {
        Self {
            jwks_client,
            algorithm,
            issuer,
            audience,
            clock_skew,
        }
    }

    /// Create a verifier from configuration.
    pub fn from_config(config: &Config, jwks_client: Arc<JwksClient>) -> Self {
        Self::new(
            jwks_client,
            config.signing_algorithm,
            config.issuer.clone(),
            config.audience.clone(),
            config.jwt_clock_skew,
        )
    }

    /// Verify a JWT and return its claims.
    ///
    /// # Security Checks
    ///
    /// 1. Size check - reject tokens > 8KB before parsing
    /// 2. Decode header and payload; `kid` must be present
    /// 3. Header `alg` must equal the configured algorithm
    /// 4. Fetch public key from JWKS (at most one refresh)
    /// 5. Verify signature, `exp`, `iss`, `aud`, `sub`
    /// 6. Validate `iat` (when present) with clock skew tolerance
    ///
    /// # Errors
    ///
    /// - `AuthError::MalformedToken` if the token cannot be decoded
    /// - `AuthError::UnknownSigningKey` / `KeyProviderUnavailable` from key lookup
    /// - `AuthError::InvalidToken` for algorithm, signature or claim failures
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let unverified = decode_unverified::<Claims>(token).map_err(|e| {
            tracing::debug!(target: "todo.auth.jwt", error = ?e, "Token decoding failed");
            AuthError::MalformedToken(e.reason().to_string())
        })?;

        check_algorithm(&unverified.alg, self.algorithm)?;

        let jwk = self.jwks_client.get_key(&unverified.kid).await?;

        let validation = build_validation(self.algorithm, &self.issuer, &self.audience);
        let claims = verify_token(token, &jwk, self.algorithm, &validation)?;

        if let Some(iat) = claims.iat {
            validate_iat(iat, self.clock_skew).map_err(|e| {
                tracing::debug!(target: "todo.auth.jwt", error = ?e, "Token iat validation failed");
                AuthError::InvalidToken(e.reason().to_string())
            })?;
        }

        tracing::debug!(target: "todo.auth.jwt", "Token verified successfully");
        Ok(claims)
    }
}

/// Reject any declared algorithm other than the configured one.
fn check_algorithm(declared: &str, expected: Algorithm) -> Result<(), AuthError> {
    match Algorithm::from_str(declared) {
        Ok(alg) if alg == expected => Ok(()),
        _ => {
            tracing::debug!(target: "todo.auth.jwt", alg = %declared, "Token algorithm not allowed");
            Err(AuthError::InvalidToken("algorithm not allowed".to_string()))
        }
    }
}

/// Validation rules for the configured issuer and audience.
fn build_validation(algorithm: Algorithm, issuer: &str, audience: &str) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation
}

/// Build the verification key from a JWK, checking it fits `algorithm`.
fn decoding_key(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, AuthError> {
    if let Some(key_use) = &jwk.key_use {
        if key_use != "sig" {
            tracing::warn!(target: "todo.auth.jwt", kid = %jwk.kid, key_use = %key_use, "JWK not published for signatures");
            return Err(AuthError::InvalidToken("key not for signing".to_string()));
        }
    }

    if let Some(alg) = &jwk.alg {
        if Algorithm::from_str(alg).ok() != Some(algorithm) {
            tracing::warn!(target: "todo.auth.jwt", kid = %jwk.kid, alg = %alg, "Unexpected JWK algorithm");
            return Err(AuthError::InvalidToken(
                "key algorithm mismatch".to_string(),
            ));
        }
    }

    let missing = |field: &str| {
        tracing::error!(target: "todo.auth.jwt", kid = %jwk.kid, field = %field, "JWK missing key parameter");
        AuthError::InvalidToken(format!("key missing '{field}'"))
    };
    let unusable = |e: &dyn std::fmt::Display| {
        tracing::error!(target: "todo.auth.jwt", kid = %jwk.kid, error = %e, "Invalid public key encoding");
        AuthError::InvalidToken("key material unusable".to_string())
    };

    match (algorithm, jwk.kty.as_str()) {
        (
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
            "RSA",
        ) => {
            let n = jwk.n.as_deref().ok_or_else(|| missing("n"))?;
            let e = jwk.e.as_deref().ok_or_else(|| missing("e"))?;
            DecodingKey::from_rsa_components(n, e).map_err(|e| unusable(&e))
        }
        (Algorithm::ES256 | Algorithm::ES384, "EC") => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            let y = jwk.y.as_deref().ok_or_else(|| missing("y"))?;
            DecodingKey::from_ec_components(x, y).map_err(|e| unusable(&e))
        }
        (Algorithm::EdDSA, "OKP") => {
            let x = jwk.x.as_deref().ok_or_else(|| missing("x"))?;
            let public_key_bytes = decode_ed25519_public_key_jwk(x).map_err(|e| unusable(&e))?;
            Ok(DecodingKey::from_ed_der(&public_key_bytes))
        }
        (_, kty) => {
            tracing::warn!(target: "todo.auth.jwt", kid = %jwk.kid, kty = %kty, "JWK key type does not fit algorithm");
            Err(AuthError::InvalidToken("key type mismatch".to_string()))
        }
    }
}

/// Verify JWT signature and registered claims with a resolved key.
fn verify_token(
    token: &str,
    jwk: &Jwk,
    algorithm: Algorithm,
    validation: &Validation,
) -> Result<Claims, AuthError> {
    let key = decoding_key(jwk, algorithm)?;

    let token_data = decode::<Claims>(token, &key, validation).map_err(|e| {
        tracing::debug!(target: "todo.auth.jwt", error = %e, "Token verification failed");
        AuthError::InvalidToken(rejection_reason(e.kind()).to_string())
    })?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(AuthError::InvalidToken("subject empty".to_string()));
    }

    Ok(token_data.claims)
}

fn rejection_reason(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ExpiredSignature => "token expired",
        ErrorKind::InvalidIssuer => "issuer mismatch",
        ErrorKind::InvalidAudience => "audience mismatch",
        ErrorKind::InvalidSignature => "signature invalid",
        ErrorKind::InvalidAlgorithm => "algorithm not allowed",
        ErrorKind::MissingRequiredClaim(_) => "required claim missing",
        ErrorKind::ImmatureSignature => "token not yet valid",
        _ => "token verification failed",
    }
}
