//! Mock identity-provider JWKS endpoint
//!
//! Wraps a `wiremock::MockServer` that serves a mutable key set at
//! `/.well-known/jwks.json`, counts fetches, and can simulate outages.

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the JWKS is served under.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// Mock JWKS endpoint for authorizer tests
///
/// # Example
/// ```rust,ignore
/// let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
/// let client = JwksClient::new(jwks.jwks_url(), ...);
/// // ...
/// assert_eq!(jwks.fetch_count().await, 1);
/// ```
pub struct TestJwksServer {
    server: MockServer,
}

impl TestJwksServer {
    /// Start a server publishing `keys`.
    pub async fn start(keys: Vec<Value>) -> Self {
        let jwks = Self {
            server: MockServer::start().await,
        };
        jwks.set_keys(keys).await;
        jwks
    }

    /// Full URL of the JWKS endpoint.
    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), JWKS_PATH)
    }

    /// Replace the published key set.
    ///
    /// Resets the fetch count.
    pub async fn set_keys(&self, keys: Vec<Value>) {
        self.mount(ResponseTemplate::new(200).set_body_json(json!({ "keys": keys })))
            .await;
    }

    /// Make every fetch fail with `status`.
    ///
    /// Resets the fetch count.
    pub async fn fail_with_status(&self, status: u16) {
        self.mount(ResponseTemplate::new(status)).await;
    }

    /// Serve `keys` only after `delay`, to exercise fetch timeouts.
    ///
    /// Resets the fetch count.
    pub async fn respond_slowly(&self, keys: Vec<Value>, delay: Duration) {
        self.mount(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "keys": keys }))
                .set_delay(delay),
        )
        .await;
    }

    /// Number of JWKS requests received since the last reconfiguration.
    pub async fn fetch_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn mount(&self, response: ResponseTemplate) {
        self.server.reset().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(response)
            .mount(&self.server)
            .await;
    }
}
