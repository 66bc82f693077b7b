//! JWKS client for fetching and caching the identity provider's public keys.
//!
//! The JWKS (JSON Web Key Set) client fetches public keys from the identity
//! provider's JWKS endpoint and caches them process-wide, keyed by `kid`.
//!
//! # Caching
//!
//! - The cache is refreshed when a requested `kid` is absent or when it is
//!   older than the refresh interval, whichever comes first
//! - A request triggers at most one fetch
//! - Concurrent refreshes are coalesced: callers queue on a refresh lock and
//!   take the outcome of any fetch that completed while they waited, whether
//!   it succeeded or failed
//! - A failed refresh leaves the previous cache in place
//!
//! # Security
//!
//! - No negative caching: an unknown `kid` is looked up again on the next request
//! - Fetches are bounded by a timeout, and so is waiting on another caller's
//!   fetch
//! - The JWKS URL is expected to be HTTPS outside of tests

use crate::errors::AuthError;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// JSON Web Key from the JWKS endpoint.
///
/// Only the public parameters are modelled. Which of them are present
/// depends on `kty`: RSA keys carry `n`/`e`, EC keys `crv`/`x`/`y`, and
/// OKP (Ed25519) keys `crv`/`x`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Matched against the token header `kid`.
    pub kid: String,

    /// Algorithm the key is meant for (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use. Keys marked for anything other than "sig" are never used
    /// to verify a token.
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for EC / OKP keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// EC x coordinate, or the OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,
}

/// JWKS response from the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Cached JWKS data with its fetch time.
struct CachedJwks {
    /// Map of key ID to JWK.
    keys: HashMap<String, Jwk>,

    /// When this key set was fetched.
    fetched_at: Instant,
}

/// Cache contents plus the outcome of the most recent fetch attempt.
#[derive(Default)]
struct CacheState {
    jwks: Option<CachedJwks>,

    /// Incremented after every fetch attempt.
    attempt: u64,

    /// Error of the latest attempt, `None` if it succeeded.
    last_failure: Option<AuthError>,
}

/// Shared key cache for the identity provider JWKS.
///
/// Constructed once per process and shared by every authorization request.
pub struct JwksClient {
    /// URL to the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching JWKS.
    http_client: reqwest::Client,

    /// Cached JWKS data.
    cache: Arc<RwLock<CacheState>>,

    /// Serialises fetches so concurrent misses share one request.
    refresh_lock: Mutex<()>,

    /// Age after which the cache is refetched.
    refresh_interval: Duration,

    /// Upper bound on one fetch.
    fetch_timeout: Duration,
}

impl JwksClient {
    /// Build a client with an empty cache. Nothing is fetched until first use.
    ///
    /// # Arguments
    ///
    /// * `jwks_url` - URL of the JWKS endpoint
    /// * `refresh_interval` - How long a fetched key set is used before refetching
    /// * `fetch_timeout` - Timeout for a single fetch
    pub fn new(jwks_url: String, refresh_interval: Duration, fetch_timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "todo.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(CacheState::default())),
            refresh_lock: Mutex::new(()),
            refresh_interval,
            fetch_timeout,
        }
    }

    /// Get a JWK by key ID.
    ///
    /// Returns the cached JWK when the cache is fresh and holds `kid`;
    /// otherwise refreshes the cache (at most once) and retries the lookup.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyProviderUnavailable` if JWKS cannot be fetched.
    /// Returns `AuthError::UnknownSigningKey` if the key ID is not found after refresh.
    #[instrument(skip_all, fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthError> {
        let observed = {
            let cache = self.cache.read().await;
            match cache.jwks.as_ref() {
                Some(cached) if cached.fetched_at.elapsed() < self.refresh_interval => {
                    if let Some(key) = cached.keys.get(kid) {
                        tracing::debug!(target: "todo.auth.jwks", kid = %kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    tracing::debug!(target: "todo.auth.jwks", kid = %kid, "Key not found in JWKS cache");
                }
                Some(_) => {
                    tracing::debug!(target: "todo.auth.jwks", "JWKS cache is stale");
                }
                None => {}
            }
            cache.attempt
        };

        self.refresh_cache(observed).await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.jwks.as_ref().and_then(|cached| cached.keys.get(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "todo.auth.jwks", kid = %kid, "Key not found in JWKS after refresh");
        Err(AuthError::UnknownSigningKey(format!(
            "kid '{kid}' not in key set"
        )))
    }

    /// Refresh the cache unless a fetch attempt finished after `observed`.
    ///
    /// `observed` is the attempt counter the caller saw before deciding to
    /// refresh. If another caller's attempt completed in the meantime, its
    /// outcome is returned instead of fetching again. Waiting for the lock
    /// is bounded by the fetch timeout.
    async fn refresh_cache(&self, observed: u64) -> Result<(), AuthError> {
        let _guard = tokio::time::timeout(self.fetch_timeout, self.refresh_lock.lock())
            .await
            .map_err(|_| {
                tracing::warn!(target: "todo.auth.jwks", "Timed out waiting for in-flight JWKS fetch");
                AuthError::KeyProviderUnavailable("JWKS fetch timed out".to_string())
            })?;

        {
            let cache = self.cache.read().await;
            if cache.attempt != observed {
                tracing::debug!(target: "todo.auth.jwks", "Reusing JWKS fetch made by a concurrent request");
                return match &cache.last_failure {
                    Some(err) => Err(err.clone()),
                    None => Ok(()),
                };
            }
        }

        let result = self.fetch_keys().await;

        let mut cache = self.cache.write().await;
        cache.attempt = cache.attempt.wrapping_add(1);
        match result {
            Ok(keys) => {
                tracing::info!(
                    target: "todo.auth.jwks",
                    key_count = keys.len(),
                    "JWKS cache refreshed"
                );
                cache.jwks = Some(CachedJwks {
                    keys,
                    fetched_at: Instant::now(),
                });
                cache.last_failure = None;
                Ok(())
            }
            Err(err) => {
                cache.last_failure = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Fetch the key set from the identity provider.
    #[instrument(skip(self))]
    async fn fetch_keys(&self) -> Result<HashMap<String, Jwk>, AuthError> {
        tracing::debug!(target: "todo.auth.jwks", url = %self.jwks_url, "Fetching JWKS");

        let fetch = async {
            let response = self
                .http_client
                .get(&self.jwks_url)
                .send()
                .await
                .map_err(|e| {
                    tracing::error!(target: "todo.auth.jwks", error = %e, "Failed to fetch JWKS");
                    AuthError::KeyProviderUnavailable("JWKS request failed".to_string())
                })?;

            if !response.status().is_success() {
                tracing::error!(
                    target: "todo.auth.jwks",
                    status = %response.status(),
                    "JWKS endpoint returned error"
                );
                return Err(AuthError::KeyProviderUnavailable(format!(
                    "JWKS endpoint returned {}",
                    response.status()
                )));
            }

            response.json::<JwksResponse>().await.map_err(|e| {
                tracing::error!(target: "todo.auth.jwks", error = %e, "Failed to parse JWKS response");
                AuthError::KeyProviderUnavailable("JWKS response unparsable".to_string())
            })
        };

        let jwks = tokio::time::timeout(self.fetch_timeout, fetch)
            .await
            .map_err(|_| {
                tracing::error!(target: "todo.auth.jwks", timeout = ?self.fetch_timeout, "JWKS fetch timed out");
                AuthError::KeyProviderUnavailable("JWKS fetch timed out".to_string())
            })??;

        Ok(jwks
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect())
    }
}
