//! Bearer-token authentication.
//!
//! - `claims` - Typed access-token claims
//! - `jwks` - Cached, single-flight JWKS client
//! - `jwt` - Signature and claim verification
//! - `authorizer` - Allow/deny decision with fail-closed semantics

pub mod authorizer;
pub mod claims;
pub mod jwks;
pub mod jwt;

pub use authorizer::{extract_bearer_token, AuthorizationDecision, Authorizer, Effect};
pub use claims::{Audience, Claims};
pub use jwks::{Jwk, JwksClient};
pub use jwt::JwtVerifier;
