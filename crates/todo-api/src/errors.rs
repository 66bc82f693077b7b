//! To-do API error types.
//!
//! `AuthError` covers every way a bearer credential can fail verification.
//! It never crosses the authorizer boundary: each kind is logged and turned
//! into a Deny decision.
//!
//! `TodoError` covers the CRUD handlers and maps to gateway status codes.
//! Messages for server-side failures are replaced with a generic,
//! per-operation message when rendered; the actual error is logged.

use thiserror::Error;

/// Credential verification failure.
///
/// The payload is a short reason kept for logs only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Header absent, wrong scheme, or no token after the scheme.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// Token structure could not be decoded.
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    /// `kid` not present in the key set, even after one refresh.
    #[error("Unknown signing key: {0}")]
    UnknownSigningKey(String),

    /// Signature, algorithm or claim check failed.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Key provider unreachable, slow, or returned an unusable response.
    #[error("Key provider unavailable: {0}")]
    KeyProviderUnavailable(String),
}

impl AuthError {
    /// Stable name of the error kind, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MalformedCredential(_) => "malformed_credential",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::UnknownSigningKey(_) => "unknown_signing_key",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::KeyProviderUnavailable(_) => "key_provider_unavailable",
        }
    }

    /// The reason recorded with this error.
    pub fn reason(&self) -> &str {
        match self {
            AuthError::MalformedCredential(reason)
            | AuthError::MalformedToken(reason)
            | AuthError::UnknownSigningKey(reason)
            | AuthError::InvalidToken(reason)
            | AuthError::KeyProviderUnavailable(reason) => reason,
        }
    }
}

/// To-do service error type.
///
/// Maps to gateway status codes:
/// - Database, Internal: 500 Internal Server Error
/// - BadRequest: 400 Bad Request
/// - Unauthenticated: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Storage: 502 Bad Gateway
#[derive(Debug, Error)]
pub enum TodoError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl TodoError {
    /// Returns the status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            TodoError::Database(_) | TodoError::Internal(_) => 500,
            TodoError::BadRequest(_) => 400,
            TodoError::Unauthenticated(_) => 403,
            TodoError::NotFound(_) => 404,
            TodoError::Storage(_) => 502,
        }
    }

    /// Whether the error originates server-side and must not be echoed to
    /// the caller.
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// Message safe to return to the caller.
    ///
    /// Client errors carry their own message; server-side errors are logged
    /// and replaced with `generic`.
    pub fn client_message(&self, generic: &str) -> String {
        match self {
            TodoError::BadRequest(msg)
            | TodoError::NotFound(msg)
            | TodoError::Unauthenticated(msg) => msg.clone(),
            TodoError::Database(err) => {
                tracing::error!(target: "todo.database", error = %err, "Database operation failed");
                generic.to_string()
            }
            TodoError::Storage(err) => {
                tracing::error!(target: "todo.storage", error = %err, "Attachment storage operation failed");
                generic.to_string()
            }
            TodoError::Internal(err) => {
                tracing::error!(target: "todo.internal", error = %err, "Internal error");
                generic.to_string()
            }
        }
    }
}

/// Convert sqlx errors to TodoError
impl From<sqlx::Error> for TodoError {
    fn from(err: sqlx::Error) -> Self {
        TodoError::Database(err.to_string())
    }
}
