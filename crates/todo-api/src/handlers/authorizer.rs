//! Gateway token-authorizer handler.
//!
//! Renders an `AuthorizationDecision` as the IAM policy document the API
//! gateway expects. The handler is as total as the authorizer: it always
//! returns a policy.

use crate::auth::{AuthorizationDecision, Authorizer, Effect};
use common::secret::{deserialize_optional_secret, ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy language version.
pub const POLICY_VERSION: &str = "2012-10-17";

/// Gateway action covered by the policy.
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Token-authorizer event.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAuthorizerEvent {
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,

    /// Raw `Authorization` header value.
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub authorization_token: Option<SecretString>,

    #[serde(default)]
    pub method_arn: Option<String>,
}

/// Token-authorizer response.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    /// Verified subject; omitted on Deny.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<String>,
    pub policy_document: PolicyDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: &'static str,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: &'static str,
    pub effect: Effect,
    pub resource: &'static str,
}

impl AuthorizerResponse {
    pub fn is_allowed(&self) -> bool {
        let statements = &self.policy_document.statement;
        !statements.is_empty() && statements.iter().all(|s| s.effect == Effect::Allow)
    }
}

impl From<AuthorizationDecision> for AuthorizerResponse {
    fn from(decision: AuthorizationDecision) -> Self {
        Self {
            principal_id: decision.subject,
            policy_document: PolicyDocument {
                version: POLICY_VERSION,
                statement: vec![PolicyStatement {
                    action: INVOKE_ACTION,
                    effect: decision.effect,
                    resource: decision.resource,
                }],
            },
        }
    }
}

impl fmt::Debug for AuthorizerResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizerResponse")
            .field("principal_id", &self.principal_id.as_ref().map(|_| "[REDACTED]"))
            .field("policy_document", &self.policy_document)
            .finish()
    }
}

/// Handle a token-authorizer event.
pub async fn handle_token_authorizer(
    authorizer: &Authorizer,
    event: &TokenAuthorizerEvent,
) -> AuthorizerResponse {
    let credential = event
        .authorization_token
        .as_ref()
        .map(|token| token.expose_secret());

    authorizer.authorize(credential).await.into()
}
