//! Integration tests for the bearer-token authorizer
//!
//! Every test runs the full path (header parsing, unverified decode, JWKS
//! lookup over HTTP, signature and claim checks) against a mock key
//! provider, and asserts only on the allow/deny decision and fetch counts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use jsonwebtoken::Algorithm;
use std::sync::Arc;
use std::time::Duration;
use todo_api::auth::{AuthorizationDecision, Authorizer, JwksClient, JwtVerifier};
use todo_api::handlers::{handle_token_authorizer, TokenAuthorizerEvent};
use todo_test_utils::{
    swap_signature, test_rsa_key_1, test_rsa_key_2, TestEd25519Key, TestJwksServer,
    TestTokenBuilder, TEST_AUDIENCE, TEST_ISSUER, TEST_SUBJECT,
};

fn authorizer_with(jwks: &TestJwksServer, algorithm: Algorithm, fetch_timeout: Duration) -> Authorizer {
    let client = Arc::new(JwksClient::new(
        jwks.jwks_url(),
        Duration::from_secs(600),
        fetch_timeout,
    ));
    Authorizer::new(JwtVerifier::new(
        client,
        algorithm,
        TEST_ISSUER.to_string(),
        TEST_AUDIENCE.to_string(),
        Duration::from_secs(300),
    ))
}

fn rs256_authorizer(jwks: &TestJwksServer) -> Authorizer {
    authorizer_with(jwks, Algorithm::RS256, Duration::from_secs(2))
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

// ============================================================================
// Allow correctness
// ============================================================================

#[tokio::test]
async fn test_valid_token_is_allowed() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());

    let decision = authorizer.authorize(Some(bearer(&token).as_str())).await;

    assert_eq!(decision, AuthorizationDecision::allow(TEST_SUBJECT.to_string()));
    assert_eq!(decision.resource, "*");
    assert_eq!(decision.action, "invoke");
    assert_eq!(jwks.fetch_count().await, 1);
}

#[tokio::test]
async fn test_audience_list_containing_configured_audience_is_allowed() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new()
        .for_audiences(&["other-api", TEST_AUDIENCE])
        .sign_rs256(&test_rsa_key_1());

    let decision = authorizer.authorize(Some(bearer(&token).as_str())).await;
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_token_without_iat_is_allowed() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new().without_iat().sign_rs256(&test_rsa_key_1());

    assert!(authorizer.authorize(Some(bearer(&token).as_str())).await.is_allowed());
}

#[tokio::test]
async fn test_lowercase_scheme_is_allowed() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());

    let decision = authorizer.authorize(Some(format!("bearer {token}").as_str())).await;
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_eddsa_configuration_accepts_okp_keys() {
    let ed_key = TestEd25519Key::from_seed(7, "ed-1").unwrap();
    let jwks = TestJwksServer::start(vec![ed_key.jwk()]).await;
    let authorizer = authorizer_with(&jwks, Algorithm::EdDSA, Duration::from_secs(2));
    let token = TestTokenBuilder::new().for_user("ed-user").sign_eddsa(&ed_key);

    let decision = authorizer.authorize(Some(bearer(&token).as_str())).await;
    assert_eq!(decision, AuthorizationDecision::allow("ed-user".to_string()));
}

// ============================================================================
// Claim failures
// ============================================================================

#[tokio::test]
async fn test_claim_failures_are_denied() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let key = test_rsa_key_1();

    let cases = [
        ("expired", TestTokenBuilder::new().expires_in(-60).sign_rs256(&key)),
        (
            "wrong issuer",
            TestTokenBuilder::new()
                .issued_by("https://evil.example.com/")
                .sign_rs256(&key),
        ),
        (
            "issuer without trailing slash",
            TestTokenBuilder::new()
                .issued_by("https://test-tenant.example.com")
                .sign_rs256(&key),
        ),
        (
            "wrong audience",
            TestTokenBuilder::new().for_audience("other-api").sign_rs256(&key),
        ),
        (
            "audience list without ours",
            TestTokenBuilder::new()
                .for_audiences(&["a", "b"])
                .sign_rs256(&key),
        ),
        ("missing subject", TestTokenBuilder::new().without_subject().sign_rs256(&key)),
        ("empty subject", TestTokenBuilder::new().for_user("").sign_rs256(&key)),
        (
            "iat beyond clock skew",
            TestTokenBuilder::new()
                .issued_at(Utc::now().timestamp() + 3600)
                .sign_rs256(&key),
        ),
    ];

    for (name, token) in cases {
        let decision = authorizer.authorize(Some(bearer(&token).as_str())).await;
        assert_eq!(decision, AuthorizationDecision::deny(), "{name} should be denied");
    }
}

#[tokio::test]
async fn test_signature_from_another_key_is_denied() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk(), test_rsa_key_2().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);

    let k1_token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());
    let k2_token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_2());
    let forged = swap_signature(&k1_token, &k2_token);

    assert_eq!(
        authorizer.authorize(Some(bearer(&forged).as_str())).await,
        AuthorizationDecision::deny()
    );
}

#[tokio::test]
async fn test_tampered_payload_is_denied() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);

    let real = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());
    let other_user = TestTokenBuilder::new()
        .for_user("admin")
        .forge_with_alg("RS256", "K1");
    let tampered = swap_signature(&other_user, &real);

    assert_eq!(
        authorizer.authorize(Some(bearer(&tampered).as_str())).await,
        AuthorizationDecision::deny()
    );
}

// ============================================================================
// Algorithm pinning
// ============================================================================

#[tokio::test]
async fn test_forged_algorithms_denied_without_fetch() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let builder = TestTokenBuilder::new();

    for alg in ["none", "None", "HS256", "RS512", "ES256"] {
        let token = builder.forge_with_alg(alg, "K1");
        let decision = authorizer.authorize(Some(bearer(&token).as_str())).await;
        assert_eq!(decision, AuthorizationDecision::deny(), "alg {alg} should be denied");
    }

    assert_eq!(jwks.fetch_count().await, 0);
}

#[tokio::test]
async fn test_eddsa_token_denied_when_rs256_configured() {
    let ed_key = TestEd25519Key::from_seed(7, "ed-1").unwrap();
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk(), ed_key.jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new().sign_eddsa(&ed_key);

    assert_eq!(
        authorizer.authorize(Some(bearer(&token).as_str())).await,
        AuthorizationDecision::deny()
    );
    assert_eq!(jwks.fetch_count().await, 0);
}

#[tokio::test]
async fn test_rsa_key_under_okp_kid_is_denied() {
    // An RSA-signed token whose kid names an OKP key in the set.
    let ed_key = TestEd25519Key::from_seed(9, "shared").unwrap();
    let jwks = TestJwksServer::start(vec![ed_key.jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1().with_kid("shared"));

    assert_eq!(
        authorizer.authorize(Some(bearer(&token).as_str())).await,
        AuthorizationDecision::deny()
    );
}

// ============================================================================
// Malformed credentials
// ============================================================================

#[tokio::test]
async fn test_malformed_credentials_denied_without_fetch() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let valid = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());
    let oversized = format!("Bearer {}", "a".repeat(9000));

    let headers: Vec<Option<String>> = vec![
        None,
        Some(String::new()),
        Some("Bearer".to_string()),
        Some(valid.clone()),
        Some(format!("Basic {valid}")),
        Some("Bearer not-a-jwt".to_string()),
        Some("Bearer a.b".to_string()),
        Some("Bearer !!!.???.***".to_string()),
        Some(oversized),
    ];

    for header in headers {
        let decision = authorizer.authorize(header.as_deref()).await;
        assert_eq!(decision, AuthorizationDecision::deny(), "{header:?} should be denied");
    }

    assert_eq!(jwks.fetch_count().await, 0);
}

// ============================================================================
// Key provider failures
// ============================================================================

#[tokio::test]
async fn test_key_provider_error_status_is_denied() {
    let jwks = TestJwksServer::start(vec![]).await;
    jwks.fail_with_status(500).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());

    assert_eq!(
        authorizer.authorize(Some(bearer(&token).as_str())).await,
        AuthorizationDecision::deny()
    );
    assert_eq!(jwks.fetch_count().await, 1);
}

#[tokio::test]
async fn test_key_provider_timeout_is_denied() {
    let jwks = TestJwksServer::start(vec![]).await;
    jwks.respond_slowly(vec![test_rsa_key_1().jwk()], Duration::from_secs(5))
        .await;
    let authorizer = authorizer_with(&jwks, Algorithm::RS256, Duration::from_secs(1));
    let token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());

    let started = std::time::Instant::now();
    let decision = authorizer.authorize(Some(bearer(&token).as_str())).await;

    assert_eq!(decision, AuthorizationDecision::deny());
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_failed_refresh_keeps_cached_keys() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let token = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1());
    assert!(authorizer.authorize(Some(bearer(&token).as_str())).await.is_allowed());

    jwks.fail_with_status(503).await;

    // Unknown kid forces a refresh, which fails.
    let unknown = TestTokenBuilder::new().sign_rs256(&test_rsa_key_1().with_kid("K9"));
    assert!(!authorizer.authorize(Some(bearer(&unknown).as_str())).await.is_allowed());

    // The cached K1 is still served.
    assert!(authorizer.authorize(Some(bearer(&token).as_str())).await.is_allowed());
    assert_eq!(jwks.fetch_count().await, 1);
}

// ============================================================================
// Idempotence and concurrency
// ============================================================================

#[tokio::test]
async fn test_repeated_requests_give_same_decision() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let valid = bearer(&TestTokenBuilder::new().sign_rs256(&test_rsa_key_1()));
    let expired = bearer(
        &TestTokenBuilder::new()
            .expires_in(-60)
            .sign_rs256(&test_rsa_key_1()),
    );

    let first = authorizer.authorize(Some(valid.as_str())).await;
    let second = authorizer.authorize(Some(valid.as_str())).await;
    assert_eq!(first, second);

    let first = authorizer.authorize(Some(expired.as_str())).await;
    let second = authorizer.authorize(Some(expired.as_str())).await;
    assert_eq!(first, second);

    assert_eq!(jwks.fetch_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_cold_requests_share_one_fetch() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let header = bearer(&TestTokenBuilder::new().sign_rs256(&test_rsa_key_1()));

    let decisions =
        futures::future::join_all((0..10).map(|_| authorizer.authorize(Some(header.as_str())))).await;

    assert!(decisions.iter().all(AuthorizationDecision::is_allowed));
    assert_eq!(jwks.fetch_count().await, 1);
}

// ============================================================================
// Gateway policy
// ============================================================================

fn authorizer_event(token: Option<&str>) -> TokenAuthorizerEvent {
    serde_json::from_value(serde_json::json!({
        "type": "TOKEN",
        "authorizationToken": token,
        "methodArn": "arn:aws:execute-api:us-east-1:123456789012:abc/dev/GET/todos"
    }))
    .unwrap()
}

#[tokio::test]
async fn test_gateway_policy_for_allowed_token() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);
    let header = bearer(&TestTokenBuilder::new().sign_rs256(&test_rsa_key_1()));

    let response = handle_token_authorizer(&authorizer, &authorizer_event(Some(header.as_str()))).await;
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["principalId"], TEST_SUBJECT);
    assert_eq!(json["policyDocument"]["Version"], "2012-10-17");
    assert_eq!(
        json["policyDocument"]["Statement"],
        serde_json::json!([{
            "Action": "execute-api:Invoke",
            "Effect": "Allow",
            "Resource": "*"
        }])
    );
}

#[tokio::test]
async fn test_gateway_policy_for_missing_token() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = rs256_authorizer(&jwks);

    let response = handle_token_authorizer(&authorizer, &authorizer_event(None)).await;
    let json = serde_json::to_value(&response).unwrap();

    assert!(json.get("principalId").is_none());
    assert_eq!(json["policyDocument"]["Statement"][0]["Effect"], "Deny");
    assert!(!response.is_allowed());
}
