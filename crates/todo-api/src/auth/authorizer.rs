//! Bearer-token authorizer.
//!
//! Turns a raw `Authorization` header value into an allow/deny decision.
//! The authorizer is total: every failure, including a panic during
//! verification, produces a Deny decision. The failure kind and reason are
//! logged and never returned to the caller.

use crate::auth::claims::Claims;
use crate::auth::jwt::JwtVerifier;
use crate::errors::AuthError;
use futures::FutureExt;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::instrument;

/// Resource every decision applies to.
pub const DECISION_RESOURCE: &str = "*";

/// Action every decision applies to.
pub const DECISION_ACTION: &str = "invoke";

/// Credential scheme, matched case-insensitively.
const BEARER_PREFIX: &str = "bearer ";

/// Decision effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// Outcome of an authorization request.
///
/// Allow and deny share one shape; only `effect` and `subject` differ.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    /// Verified token subject, present only on Allow.
    pub subject: Option<String>,
    pub effect: Effect,
    pub resource: &'static str,
    pub action: &'static str,
}

impl AuthorizationDecision {
    /// Allow `subject` to invoke any resource.
    pub fn allow(subject: String) -> Self {
        Self {
            subject: Some(subject),
            effect: Effect::Allow,
            resource: DECISION_RESOURCE,
            action: DECISION_ACTION,
        }
    }

    /// Deny with no subject.
    pub fn deny() -> Self {
        Self {
            subject: None,
            effect: Effect::Deny,
            resource: DECISION_RESOURCE,
            action: DECISION_ACTION,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }
}

impl fmt::Debug for AuthorizationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationDecision")
            .field("subject", &self.subject.as_ref().map(|_| "[REDACTED]"))
            .field("effect", &self.effect)
            .field("resource", &self.resource)
            .field("action", &self.action)
            .finish()
    }
}

/// Extract the token from a `Bearer <token>` credential.
///
/// # Errors
///
/// Returns `AuthError::MalformedCredential` if the header is absent, uses
/// another scheme, or has no token after the scheme.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header
        .ok_or_else(|| AuthError::MalformedCredential("credential missing".to_string()))?;

    let has_bearer_scheme = header
        .get(..BEARER_PREFIX.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(BEARER_PREFIX));
    if !has_bearer_scheme {
        return Err(AuthError::MalformedCredential(
            "credential is not a bearer token".to_string(),
        ));
    }

    header
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| AuthError::MalformedCredential("bearer token missing".to_string()))
}

/// Authorizer for gateway requests.
pub struct Authorizer {
    verifier: JwtVerifier,
}

impl Authorizer {
    pub fn new(verifier: JwtVerifier) -> Self {
        Self { verifier }
    }

    /// Decide whether the bearer of `credential` may invoke the API.
    ///
    /// Never fails: every error kind and any panic become Deny.
    #[instrument(skip_all)]
    pub async fn authorize(&self, credential: Option<&str>) -> AuthorizationDecision {
        decide(async {
            let token = extract_bearer_token(credential)?;
            self.verifier.verify(token).await
        })
        .await
    }
}

/// Run a verification and package its outcome.
async fn decide<F>(verification: F) -> AuthorizationDecision
where
    F: Future<Output = Result<Claims, AuthError>>,
{
    match AssertUnwindSafe(verification).catch_unwind().await {
        Ok(Ok(claims)) => {
            tracing::info!(target: "todo.auth.authorizer", effect = "Allow", "Request authorized");
            AuthorizationDecision::allow(claims.sub)
        }
        Ok(Err(e)) => {
            tracing::warn!(
                target: "todo.auth.authorizer",
                effect = "Deny",
                kind = e.kind(),
                reason = %e.reason(),
                "Request denied"
            );
            AuthorizationDecision::deny()
        }
        Err(_) => {
            tracing::error!(
                target: "todo.auth.authorizer",
                effect = "Deny",
                kind = "panic",
                "Token verification panicked"
            );
            AuthorizationDecision::deny()
        }
    }
}
