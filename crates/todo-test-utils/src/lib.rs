//! # To-do API Test Utilities
//!
//! Shared test utilities for the to-do API authorizer and handlers.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed RSA keys, seed-derived Ed25519 keys)
//! - Test token builder (TestTokenBuilder)
//! - Mock JWKS endpoint (TestJwksServer)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use todo_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let key = test_rsa_key_1();
//!     let jwks = TestJwksServer::start(vec![key.jwk()]).await;
//!
//!     let token = TestTokenBuilder::new()
//!         .for_user("alice")
//!         .sign_rs256(&key);
//!
//!     // ... authorize `Bearer {token}` against jwks.jwks_url() ...
//!     assert_eq!(jwks.fetch_count().await, 1);
//! }
//! ```

pub mod crypto_fixtures;
pub mod jwks_server;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use jwks_server::*;
pub use token_builders::*;
