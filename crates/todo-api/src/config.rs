//! To-do API configuration.
//!
//! Configuration is loaded from environment variables. All sensitive
//! fields are redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use jsonwebtoken::Algorithm;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default accepted token signing algorithm.
pub const DEFAULT_SIGNING_ALGORITHM: Algorithm = Algorithm::RS256;

/// Default JWKS refresh interval in seconds (10 minutes).
pub const DEFAULT_JWKS_REFRESH_INTERVAL_SECONDS: u64 = 600;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Maximum JWKS fetch timeout in seconds.
pub const MAX_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 30;

/// Default AWS region for the attachment bucket.
pub const DEFAULT_AWS_REGION: &str = "us-east-1";

/// Default validity of a presigned upload URL in seconds.
pub const DEFAULT_UPLOAD_URL_EXPIRY_SECONDS: u64 = 300;

/// Maximum validity of a presigned upload URL (7 days, the S3 SigV4 limit).
pub const MAX_UPLOAD_URL_EXPIRY_SECONDS: u64 = 604_800;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (default, for log aggregation).
    Json,
    /// Human-readable output for local runs.
    Pretty,
}

/// To-do API configuration.
///
/// Database URL is redacted in Debug output to prevent credential leakage.
#[derive(Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,

    /// URL of the identity provider's JWKS endpoint.
    pub jwks_url: String,

    /// Expected `iss` claim, matched exactly.
    pub issuer: String,

    /// Expected `aud` claim (equal to, or contained in, the token audience).
    pub audience: String,

    /// The single accepted signing algorithm. Always asymmetric.
    pub signing_algorithm: Algorithm,

    /// Age after which the cached key set is refetched.
    pub jwks_refresh_interval: Duration,

    /// Timeout for a single JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    /// Clock skew tolerance for `iat` validation.
    pub jwt_clock_skew: Duration,

    /// Attachment bucket name.
    pub s3_bucket: String,

    /// AWS region of the attachment bucket.
    pub aws_region: String,

    /// Public URL prefix for stored attachments.
    pub attachment_base_url: String,

    /// Validity of presigned upload URLs.
    pub upload_url_expiry: Duration,

    /// Log output format.
    pub log_format: LogFormat,
}

/// `DATABASE_URL` may carry credentials, so it is printed as `[REDACTED]`.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("jwks_url", &self.jwks_url)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_algorithm", &self.signing_algorithm)
            .field("jwks_refresh_interval", &self.jwks_refresh_interval)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("s3_bucket", &self.s3_bucket)
            .field("aws_region", &self.aws_region)
            .field("attachment_base_url", &self.attachment_base_url)
            .field("upload_url_expiry", &self.upload_url_expiry)
            .field("log_format", &self.log_format)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid signing algorithm configuration: {0}")]
    InvalidSigningAlgorithm(String),

    #[error("Invalid JWKS refresh interval configuration: {0}")]
    InvalidJwksRefreshInterval(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidJwksFetchTimeout(String),

    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid upload URL expiry configuration: {0}")]
    InvalidUploadUrlExpiry(String),

    #[error("Invalid log format configuration: {0}")]
    InvalidLogFormat(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;
        let jwks_url = required(vars, "AUTH_JWKS_URL")?;
        let issuer = required(vars, "AUTH_ISSUER")?;
        let audience = required(vars, "AUTH_AUDIENCE")?;
        let s3_bucket = required(vars, "S3_BUCKET")?;

        let signing_algorithm = match vars.get("AUTH_SIGNING_ALGORITHM") {
            Some(value) => parse_signing_algorithm(value)?,
            None => DEFAULT_SIGNING_ALGORITHM,
        };

        let jwks_refresh_interval = seconds(
            vars,
            "JWKS_REFRESH_INTERVAL_SECONDS",
            DEFAULT_JWKS_REFRESH_INTERVAL_SECONDS,
            None,
            ConfigError::InvalidJwksRefreshInterval,
        )?;

        let jwks_fetch_timeout = seconds(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            Some(MAX_JWKS_FETCH_TIMEOUT_SECONDS),
            ConfigError::InvalidJwksFetchTimeout,
        )?;

        let jwt_clock_skew = seconds(
            vars,
            "JWT_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
            Some(MAX_CLOCK_SKEW.as_secs()),
            ConfigError::InvalidJwtClockSkew,
        )?;

        let upload_url_expiry = seconds(
            vars,
            "UPLOAD_URL_EXPIRY_SECONDS",
            DEFAULT_UPLOAD_URL_EXPIRY_SECONDS,
            Some(MAX_UPLOAD_URL_EXPIRY_SECONDS),
            ConfigError::InvalidUploadUrlExpiry,
        )?;

        let aws_region = vars
            .get("AWS_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

        let attachment_base_url = vars
            .get("ATTACHMENT_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| format!("https://{s3_bucket}.s3.{aws_region}.amazonaws.com"));

        let log_format = match vars.get("LOG_FORMAT").map(String::as_str) {
            None | Some("json") => LogFormat::Json,
            Some("pretty") => LogFormat::Pretty,
            Some(other) => {
                return Err(ConfigError::InvalidLogFormat(format!(
                    "LOG_FORMAT must be 'json' or 'pretty', got '{other}'"
                )))
            }
        };

        Ok(Config {
            database_url,
            jwks_url,
            issuer,
            audience,
            signing_algorithm,
            jwks_refresh_interval,
            jwks_fetch_timeout,
            jwt_clock_skew,
            s3_bucket,
            aws_region,
            attachment_base_url,
            upload_url_expiry,
            log_format,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.trim().is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

/// Parse the accepted signing algorithm. Symmetric (HS*) algorithms are
/// refused: the verifier only ever holds public keys.
fn parse_signing_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    let algorithm = Algorithm::from_str(value).map_err(|_| {
        ConfigError::InvalidSigningAlgorithm(format!(
            "AUTH_SIGNING_ALGORITHM must be a JWS algorithm name, got '{value}'"
        ))
    })?;

    if matches!(
        algorithm,
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
    ) {
        return Err(ConfigError::InvalidSigningAlgorithm(format!(
            "AUTH_SIGNING_ALGORITHM must be asymmetric, got '{value}'"
        )));
    }

    Ok(algorithm)
}

/// Parse a positive number of seconds with an optional upper bound.
fn seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    max: Option<u64>,
    err: fn(String) -> ConfigError,
) -> Result<Duration, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(Duration::from_secs(default));
    };

    let value: i64 = value_str.parse().map_err(|e| {
        err(format!(
            "{name} must be a valid integer, got '{value_str}': {e}"
        ))
    })?;

    if value <= 0 {
        return Err(err(format!("{name} must be positive, got {value}")));
    }

    // Safe: value > 0 checked above
    #[allow(clippy::cast_sign_loss)]
    let value = value as u64;

    if let Some(max) = max {
        if value > max {
            return Err(err(format!(
                "{name} must not exceed {max} seconds, got {value}"
            )));
        }
    }

    Ok(Duration::from_secs(value))
}
