//! API gateway proxy event and response types.
//!
//! Only the fields the handlers read are modelled; everything else in the
//! gateway event is ignored.

use crate::errors::TodoError;
use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Proxy integration event delivered to the CRUD handlers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayProxyEvent {
    #[serde(default)]
    pub request_context: RequestContext,

    #[serde(default)]
    pub path_parameters: Option<HashMap<String, String>>,

    #[serde(default)]
    pub body: Option<String>,

    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub authorizer: Option<AuthorizerContext>,
}

/// Context attached by the token authorizer on Allow.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerContext {
    #[serde(default)]
    pub principal_id: Option<String>,
}

impl ApiGatewayProxyEvent {
    /// Principal set by the authorizer, if any.
    pub fn principal_id(&self) -> Option<&str> {
        self.request_context
            .authorizer
            .as_ref()
            .and_then(|a| a.principal_id.as_deref())
            .filter(|id| !id.is_empty())
    }

    /// Non-empty path parameter `name`.
    pub fn path_parameter(&self, name: &str) -> Option<&str> {
        self.path_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Parse the request body as JSON.
    ///
    /// # Errors
    ///
    /// Returns `TodoError::BadRequest` if the body is absent, not valid
    /// base64 when flagged as such, or not valid JSON for `T`.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, TodoError> {
        let body = self
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| TodoError::BadRequest("Request body is required".to_string()))?;

        let parsed = if self.is_base64_encoded {
            let bytes = general_purpose::STANDARD
                .decode(body)
                .map_err(|_| TodoError::BadRequest("Invalid request body".to_string()))?;
            serde_json::from_slice(&bytes)
        } else {
            serde_json::from_str(body)
        };

        parsed.map_err(|_| TodoError::BadRequest("Invalid request body".to_string()))
    }
}

/// Proxy integration response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiGatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiGatewayResponse {
    /// 200 response with `body` serialized as JSON.
    pub fn ok<T: Serialize>(body: &T) -> Self {
        match serde_json::to_string(body) {
            Ok(body) => Self::with_body(200, body),
            Err(e) => {
                tracing::error!(target: "todo.handlers", error = %e, "Failed to serialize response body");
                Self::error(500, "Internal server error")
            }
        }
    }

    /// Error response with body `{"message": message}`.
    pub fn error(status_code: u16, message: &str) -> Self {
        Self::with_body(status_code, serde_json::json!({ "message": message }).to_string())
    }

    fn with_body(status_code: u16, body: String) -> Self {
        Self {
            status_code,
            headers: default_headers(),
            body,
        }
    }
}

fn default_headers() -> BTreeMap<String, String> {
    [
        ("Access-Control-Allow-Origin", "*"),
        ("Access-Control-Allow-Credentials", "true"),
        ("Content-Type", "application/json"),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .collect()
}
