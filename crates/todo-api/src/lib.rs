//! To-do API Library
//!
//! Serverless to-do backend. A fail-closed bearer-token authorizer guards
//! the CRUD handlers; items live in PostgreSQL and attachments are uploaded
//! to S3 through presigned URLs.
//!
//! # Modules
//!
//! - `auth` - JWKS-backed token verification and allow/deny decisions
//! - `config` - Service configuration
//! - `errors` - Error types
//! - `handlers` - Gateway event handlers
//! - `models` - Data models
//! - `repositories` - Database access layer
//! - `services` - Business logic layer

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
