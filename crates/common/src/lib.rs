//! Utilities shared by the to-do backend crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, unverified decoding, iat validation)
pub mod jwt;
