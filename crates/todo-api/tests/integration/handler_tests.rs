//! Integration tests for the gateway handlers
//!
//! Handlers run against the in-memory repository and mock attachment
//! storage; the principal is supplied the way the gateway does after a
//! successful authorization.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use jsonwebtoken::Algorithm;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use todo_api::auth::{Authorizer, JwksClient, JwtVerifier};
use todo_api::handlers::{
    create_todo, delete_todo, generate_upload_url, get_todos, invoke, serve, update_todo,
    ApiGatewayProxyEvent, ApiGatewayResponse, AppState, Function,
};
use todo_api::repositories::todos::mock::InMemoryTodoRepository;
use todo_api::services::attachments::mock::MockAttachmentStorage;
use todo_api::services::{AttachmentService, TodoService};
use todo_test_utils::{
    test_rsa_key_1, TestJwksServer, TestTokenBuilder, TEST_AUDIENCE, TEST_ISSUER,
};

const BASE_URL: &str = "https://todo-attachments.s3.us-east-1.amazonaws.com";

fn state_with(repo: Arc<InMemoryTodoRepository>, storage: Arc<MockAttachmentStorage>) -> AppState {
    let attachments = Arc::new(AttachmentService::new(
        storage,
        BASE_URL.to_string(),
        Duration::from_secs(300),
    ));
    AppState::new(TodoService::new(repo, Arc::clone(&attachments)), attachments)
}

fn state() -> AppState {
    state_with(
        Arc::new(InMemoryTodoRepository::new()),
        Arc::new(MockAttachmentStorage::new()),
    )
}

fn event(principal: Option<&str>, todo_id: Option<&str>, body: Option<Value>) -> ApiGatewayProxyEvent {
    let mut raw = json!({});
    if let Some(principal) = principal {
        raw["requestContext"] = json!({ "authorizer": { "principalId": principal } });
    }
    if let Some(todo_id) = todo_id {
        raw["pathParameters"] = json!({ "todoId": todo_id });
    }
    if let Some(body) = body {
        raw["body"] = json!(body.to_string());
    }
    serde_json::from_value(raw).unwrap()
}

fn body(response: &ApiGatewayResponse) -> Value {
    serde_json::from_str(&response.body).unwrap()
}

async fn create(state: &AppState, user: &str, name: &str) -> Value {
    let response = create_todo(
        state,
        &event(Some(user), None, Some(json!({ "name": name, "dueDate": "2026-11-01" }))),
    )
    .await;
    assert_eq!(response.status_code, 200);
    body(&response)["res"].clone()
}

// ============================================================================
// create_todo
// ============================================================================

#[tokio::test]
async fn test_create_todo_returns_item() {
    let state = state();

    let response = create_todo(
        &state,
        &event(
            Some("alice"),
            None,
            Some(json!({ "name": "Buy milk", "dueDate": "2026-11-01" })),
        ),
    )
    .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
    assert_eq!(response.headers["Access-Control-Allow-Credentials"], "true");

    let item = &body(&response)["res"];
    assert_eq!(item["userId"], "alice");
    assert_eq!(item["name"], "Buy milk");
    assert_eq!(item["dueDate"], "2026-11-01");
    assert_eq!(item["done"], false);
    assert!(item["attachmentUrl"].is_null());
    assert!(item["todoId"].as_str().is_some_and(|id| !id.is_empty()));
    assert!(item["createdAt"].is_string());
}

#[tokio::test]
async fn test_create_todo_requires_principal() {
    let repo = Arc::new(InMemoryTodoRepository::new());
    let state = state_with(Arc::clone(&repo), Arc::new(MockAttachmentStorage::new()));

    let response = create_todo(
        &state,
        &event(None, None, Some(json!({ "name": "Buy milk", "dueDate": "2026-11-01" }))),
    )
    .await;

    assert_eq!(response.status_code, 403);
    assert_eq!(
        body(&response),
        json!({ "message": "User not authenticated for creating todo" })
    );
    assert_eq!(repo.call_count(), 0);
}

#[tokio::test]
async fn test_create_todo_validates_body() {
    let state = state();

    let missing_field = create_todo(
        &state,
        &event(Some("alice"), None, Some(json!({ "name": "Buy milk" }))),
    )
    .await;
    assert_eq!(missing_field.status_code, 400);
    assert_eq!(
        body(&missing_field),
        json!({ "message": "Name and dueDate are required" })
    );

    let no_body = create_todo(&state, &event(Some("alice"), None, None)).await;
    assert_eq!(no_body.status_code, 400);

    let mut garbage = event(Some("alice"), None, None);
    garbage.body = Some("{not json".to_string());
    assert_eq!(create_todo(&state, &garbage).await.status_code, 400);
}

#[tokio::test]
async fn test_create_todo_database_failure_is_generic() {
    let state = state_with(
        Arc::new(InMemoryTodoRepository::failing()),
        Arc::new(MockAttachmentStorage::new()),
    );

    let response = create_todo(
        &state,
        &event(
            Some("alice"),
            None,
            Some(json!({ "name": "Buy milk", "dueDate": "2026-11-01" })),
        ),
    )
    .await;

    assert_eq!(response.status_code, 500);
    assert_eq!(body(&response), json!({ "message": "Error creating TODO item" }));
}

// ============================================================================
// get_todos
// ============================================================================

#[tokio::test]
async fn test_get_todos_is_scoped_to_principal() {
    let state = state();
    create(&state, "alice", "first").await;
    create(&state, "bob", "not alice's").await;
    create(&state, "alice", "second").await;

    let response = get_todos(&state, &event(Some("alice"), None, None)).await;

    assert_eq!(response.status_code, 200);
    let items = body(&response)["items"].as_array().unwrap().clone();
    let names: Vec<_> = items.iter().map(|item| item["name"].clone()).collect();
    assert_eq!(names, vec![json!("first"), json!("second")]);
}

#[tokio::test]
async fn test_get_todos_empty() {
    let response = get_todos(&state(), &event(Some("alice"), None, None)).await;
    assert_eq!(response.status_code, 200);
    assert_eq!(body(&response), json!({ "items": [] }));
}

#[tokio::test]
async fn test_get_todos_requires_principal() {
    let response = get_todos(&state(), &event(None, None, None)).await;
    assert_eq!(response.status_code, 403);
    assert_eq!(
        body(&response),
        json!({ "message": "User not authenticated for getting todos" })
    );
}

#[tokio::test]
async fn test_get_todos_database_failure_is_generic() {
    let state = state_with(
        Arc::new(InMemoryTodoRepository::failing()),
        Arc::new(MockAttachmentStorage::new()),
    );

    let response = get_todos(&state, &event(Some("alice"), None, None)).await;
    assert_eq!(response.status_code, 500);
    assert_eq!(body(&response), json!({ "message": "Error fetching todos" }));
}

// ============================================================================
// update_todo
// ============================================================================

#[tokio::test]
async fn test_update_todo_applies_fields() {
    let state = state();
    let item = create(&state, "alice", "Buy milk").await;
    let todo_id = item["todoId"].as_str().unwrap().to_string();

    let response = update_todo(
        &state,
        &event(
            Some("alice"),
            Some(&todo_id),
            Some(json!({ "done": true, "attachmentUrl": format!("{todo_id}.png") })),
        ),
    )
    .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, "{}");

    let listed = body(&get_todos(&state, &event(Some("alice"), None, None)).await);
    let stored = &listed["items"][0];
    assert_eq!(stored["done"], true);
    assert_eq!(stored["name"], "Buy milk");
    assert_eq!(stored["attachmentUrl"], format!("{BASE_URL}/{todo_id}.png"));
}

#[tokio::test]
async fn test_update_todo_rejects_bad_requests() {
    let state = state();
    let item = create(&state, "alice", "Buy milk").await;
    let todo_id = item["todoId"].as_str().unwrap().to_string();

    let no_id = update_todo(&state, &event(Some("alice"), None, Some(json!({ "done": true })))).await;
    assert_eq!(no_id.status_code, 400);

    let no_fields = update_todo(&state, &event(Some("alice"), Some(&todo_id), Some(json!({})))).await;
    assert_eq!(no_fields.status_code, 400);
    assert_eq!(
        body(&no_fields),
        json!({ "message": "At least one of name, dueDate, attachmentUrl, or done must be provided" })
    );

    let unauthenticated = update_todo(&state, &event(None, Some(&todo_id), Some(json!({ "done": true })))).await;
    assert_eq!(unauthenticated.status_code, 403);
    assert_eq!(
        body(&unauthenticated),
        json!({ "message": "User not authenticated for updating todo" })
    );
}

#[tokio::test]
async fn test_update_todo_of_another_user_is_not_found() {
    let state = state();
    let item = create(&state, "alice", "Buy milk").await;
    let todo_id = item["todoId"].as_str().unwrap().to_string();

    let response = update_todo(
        &state,
        &event(Some("mallory"), Some(&todo_id), Some(json!({ "done": true }))),
    )
    .await;
    assert_eq!(response.status_code, 404);

    let listed = body(&get_todos(&state, &event(Some("alice"), None, None)).await);
    assert_eq!(listed["items"][0]["done"], false);
}

// ============================================================================
// delete_todo
// ============================================================================

#[tokio::test]
async fn test_delete_todo_is_idempotent() {
    let state = state();
    let item = create(&state, "alice", "Buy milk").await;
    let todo_id = item["todoId"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let response = delete_todo(&state, &event(Some("alice"), Some(&todo_id), None)).await;
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "{}");
    }

    let listed = body(&get_todos(&state, &event(Some("alice"), None, None)).await);
    assert_eq!(listed, json!({ "items": [] }));
}

#[tokio::test]
async fn test_delete_todo_requires_principal_and_id() {
    let state = state();

    let unauthenticated = delete_todo(&state, &event(None, Some("t1"), None)).await;
    assert_eq!(unauthenticated.status_code, 403);
    assert_eq!(
        body(&unauthenticated),
        json!({ "message": "User not authenticated for deleting todo" })
    );

    let no_id = delete_todo(&state, &event(Some("alice"), None, None)).await;
    assert_eq!(no_id.status_code, 400);
}

// ============================================================================
// generate_upload_url
// ============================================================================

#[tokio::test]
async fn test_generate_upload_url() {
    let storage = Arc::new(MockAttachmentStorage::new());
    let state = state_with(Arc::new(InMemoryTodoRepository::new()), Arc::clone(&storage));

    let response = generate_upload_url(&state, &event(Some("alice"), Some("t1"), None)).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(
        body(&response),
        json!({ "url": "https://uploads.test/t1.png?expires=300" })
    );
    assert_eq!(storage.call_count(), 1);
}

#[tokio::test]
async fn test_generate_upload_url_requires_principal() {
    let storage = Arc::new(MockAttachmentStorage::new());
    let state = state_with(Arc::new(InMemoryTodoRepository::new()), Arc::clone(&storage));

    let response = generate_upload_url(&state, &event(None, Some("t1"), None)).await;

    assert_eq!(response.status_code, 403);
    assert_eq!(
        body(&response),
        json!({ "message": "User not authenticated for uploading todo's attachment" })
    );
    assert_eq!(storage.call_count(), 0);
}

// ============================================================================
// invoke
// ============================================================================

fn offline_authorizer() -> Authorizer {
    // Nothing listens here; tests that reach the key provider are denied.
    let client = Arc::new(JwksClient::new(
        "http://127.0.0.1:9/.well-known/jwks.json".to_string(),
        Duration::from_secs(600),
        Duration::from_secs(1),
    ));
    Authorizer::new(JwtVerifier::new(
        client,
        Algorithm::RS256,
        TEST_ISSUER.to_string(),
        TEST_AUDIENCE.to_string(),
        Duration::from_secs(300),
    ))
}

#[tokio::test]
async fn test_invoke_routes_proxy_events() {
    let state = state();
    let authorizer = offline_authorizer();
    let input = json!({
        "requestContext": { "authorizer": { "principalId": "alice" } },
        "body": json!({ "name": "Buy milk", "dueDate": "2026-11-01" }).to_string()
    })
    .to_string();

    let output = invoke(Function::CreateTodo, &authorizer, &state, &input)
        .await
        .unwrap();
    let response: Value = serde_json::from_str(&output).unwrap();

    assert_eq!(response["statusCode"], 200);
    assert_eq!(response["headers"]["Content-Type"], "application/json");
    let created: Value = serde_json::from_str(response["body"].as_str().unwrap()).unwrap();
    assert_eq!(created["res"]["name"], "Buy milk");
}

#[tokio::test]
async fn test_invoke_unparsable_proxy_event_is_unauthenticated() {
    let output = invoke(Function::GetTodos, &offline_authorizer(), &state(), "not json")
        .await
        .unwrap();
    let response: Value = serde_json::from_str(&output).unwrap();

    assert_eq!(response["statusCode"], 403);
}

#[tokio::test]
async fn test_invoke_unparsable_authorizer_event_is_denied() {
    let output = invoke(Function::Auth, &offline_authorizer(), &state(), "[1, 2")
        .await
        .unwrap();
    let response: Value = serde_json::from_str(&output).unwrap();

    assert!(response.get("principalId").is_none());
    assert_eq!(response["policyDocument"]["Statement"][0]["Effect"], "Deny");
}

#[tokio::test]
async fn test_invoke_authorizer_denies_incomplete_claims() {
    let input = json!({
        "type": "TOKEN",
        "authorizationToken": "Bearer eyJhbGciOiJSUzI1NiIsImtpZCI6IksxIn0.eyJzdWIiOiJ4In0.c2ln",
        "methodArn": "arn:aws:execute-api:us-east-1:123456789012:abc/dev/GET/todos"
    })
    .to_string();

    let output = invoke(Function::Auth, &offline_authorizer(), &state(), &input)
        .await
        .unwrap();
    let response: Value = serde_json::from_str(&output).unwrap();

    assert_eq!(response["policyDocument"]["Statement"][0]["Effect"], "Deny");
}

// ============================================================================
// serve
// ============================================================================

fn authorizer_for(jwks: &TestJwksServer) -> Authorizer {
    let client = Arc::new(JwksClient::new(
        jwks.jwks_url(),
        Duration::from_secs(600),
        Duration::from_secs(2),
    ));
    Authorizer::new(JwtVerifier::new(
        client,
        Algorithm::RS256,
        TEST_ISSUER.to_string(),
        TEST_AUDIENCE.to_string(),
        Duration::from_secs(300),
    ))
}

fn auth_event(user: &str) -> String {
    let token = TestTokenBuilder::new().for_user(user).sign_rs256(&test_rsa_key_1());
    json!({
        "type": "TOKEN",
        "authorizationToken": format!("Bearer {token}"),
        "methodArn": "arn:aws:execute-api:us-east-1:123456789012:abc/dev/GET/todos"
    })
    .to_string()
}

fn output_lines(output: &[u8]) -> Vec<Value> {
    std::str::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_serve_shares_key_cache_across_events() {
    let jwks = TestJwksServer::start(vec![test_rsa_key_1().jwk()]).await;
    let authorizer = authorizer_for(&jwks);
    let input = format!(
        "{}\n\n{}\n{}\n",
        auth_event("alice"),
        auth_event("bob"),
        auth_event("alice")
    );
    let mut output = Vec::new();

    let handled = serve(Function::Auth, &authorizer, &state(), input.as_bytes(), &mut output)
        .await
        .unwrap();

    assert_eq!(handled, 3);
    let responses = output_lines(&output);
    assert_eq!(responses.len(), 3);
    let principals: Vec<_> = responses
        .iter()
        .map(|response| {
            assert_eq!(response["policyDocument"]["Statement"][0]["Effect"], "Allow");
            response["principalId"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(principals, ["alice", "bob", "alice"]);
    assert_eq!(jwks.fetch_count().await, 1);
}

#[tokio::test]
async fn test_serve_keeps_state_between_events() {
    let state = state();
    let authorizer = offline_authorizer();
    let create = json!({
        "requestContext": { "authorizer": { "principalId": "alice" } },
        "body": json!({ "name": "Buy milk", "dueDate": "2026-11-01" }).to_string()
    })
    .to_string();
    let list = json!({ "requestContext": { "authorizer": { "principalId": "alice" } } }).to_string();

    let mut output = Vec::new();
    let input = format!("{create}\n{create}");
    serve(Function::CreateTodo, &authorizer, &state, input.as_bytes(), &mut output)
        .await
        .unwrap();
    assert_eq!(output_lines(&output).len(), 2);

    let mut output = Vec::new();
    serve(Function::GetTodos, &authorizer, &state, list.as_bytes(), &mut output)
        .await
        .unwrap();
    let responses = output_lines(&output);
    let listed: Value =
        serde_json::from_str(responses.first().unwrap()["body"].as_str().unwrap()).unwrap();
    assert_eq!(listed["items"].as_array().unwrap().len(), 2);
}
