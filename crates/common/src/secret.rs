//! Secret types for protecting credentials from accidental logging.
//!
//! Re-exports the [`secrecy`] types used for bearer credentials and other
//! sensitive values. `SecretString` implements `Debug` with redaction, so a
//! struct deriving `Debug` that holds one is safe to log.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct AuthorizerInput {
//!     method_arn: String,
//!     authorization_token: SecretString,
//! }
//!
//! let input = AuthorizerInput {
//!     method_arn: "arn:aws:execute-api:us-east-1:123:api/dev/GET/todos".to_string(),
//!     authorization_token: SecretString::from("Bearer eyJ..."),
//! };
//!
//! // The token is redacted
//! assert!(!format!("{input:?}").contains("eyJ"));
//! assert_eq!(input.authorization_token.expose_secret(), "Bearer eyJ...");
//! ```

pub use secrecy::{ExposeSecret, SecretString};

use serde::{Deserialize, Deserializer};

/// Deserialize an optional string straight into a `SecretString`.
///
/// Use with `#[serde(default, deserialize_with = "...")]` on
/// `Option<SecretString>` fields of inbound events.
pub fn deserialize_optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
