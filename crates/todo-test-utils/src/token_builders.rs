//! Builder patterns for test tokens
//!
//! Provides a fluent API for identity-provider style access tokens.

use crate::crypto_fixtures::{TestEd25519Key, TestRsaKey};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, Header};
use serde_json::{json, Value};

/// Issuer the test configuration expects.
pub const TEST_ISSUER: &str = "https://test-tenant.example.com/";

/// Audience the test configuration expects.
pub const TEST_AUDIENCE: &str = "todo-api";

/// Default subject of test tokens.
pub const TEST_SUBJECT: &str = "test-idp|user-1";

/// Builder for signed test JWTs
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("alice")
///     .expires_in(3600)
///     .sign_rs256(&test_rsa_key_1());
/// ```
pub struct TestTokenBuilder {
    sub: Option<String>,
    iss: String,
    aud: Value,
    exp: i64,
    iat: Option<i64>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults valid for the test configuration
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: Some(TEST_SUBJECT.to_string()),
            iss: TEST_ISSUER.to_string(),
            aud: json!(TEST_AUDIENCE),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: Some(now.timestamp()),
        }
    }

    /// Set the subject
    pub fn for_user(mut self, subject: &str) -> Self {
        self.sub = Some(subject.to_string());
        self
    }

    /// Omit the `sub` claim
    pub fn without_subject(mut self) -> Self {
        self.sub = None;
        self
    }

    /// Set the issuer
    pub fn issued_by(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set a single audience
    pub fn for_audience(mut self, audience: &str) -> Self {
        self.aud = json!(audience);
        self
    }

    /// Set a list of audiences
    pub fn for_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = json!(audiences);
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = Some(timestamp);
        self
    }

    /// Omit the `iat` claim
    pub fn without_iat(mut self) -> Self {
        self.iat = None;
        self
    }

    /// Build the claims as a JSON value
    pub fn claims(&self) -> Value {
        let mut claims = json!({
            "iss": self.iss,
            "aud": self.aud,
            "exp": self.exp,
        });
        if let Some(sub) = &self.sub {
            claims["sub"] = json!(sub);
        }
        if let Some(iat) = self.iat {
            claims["iat"] = json!(iat);
        }
        claims
    }

    /// Sign with an RSA test key (RS256, `kid` from the key)
    pub fn sign_rs256(&self, key: &TestRsaKey) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.kid.clone());
        encode(&header, &self.claims(), &key.encoding_key()).expect("RS256 signing failed")
    }

    /// Sign with an Ed25519 test key (EdDSA, `kid` from the key)
    pub fn sign_eddsa(&self, key: &TestEd25519Key) -> String {
        let mut header = Header::new(Algorithm::EdDSA);
        header.kid = Some(key.kid.clone());
        encode(&header, &self.claims(), &key.encoding_key()).expect("EdDSA signing failed")
    }

    /// Build a token with an arbitrary header `alg` and a junk signature.
    ///
    /// Used for forged-header cases such as `alg: none`.
    pub fn forge_with_alg(&self, alg: &str, kid: &str) -> String {
        let header = json!({ "alg": alg, "typ": "JWT", "kid": kid });
        format!(
            "{}.{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(self.claims().to_string()),
            URL_SAFE_NO_PAD.encode(b"forged-signature"),
        )
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the signature segment of a token with another token's.
pub fn swap_signature(token: &str, signature_from: &str) -> String {
    let head = token.rsplit_once('.').map(|(head, _)| head).unwrap_or(token);
    let signature = signature_from
        .rsplit_once('.')
        .map(|(_, sig)| sig)
        .unwrap_or("");
    format!("{head}.{signature}")
}
