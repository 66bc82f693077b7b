//! To-do CRUD handlers.
//!
//! Each handler requires the principal set by the token authorizer and
//! renders every outcome, success or failure, as a gateway response.

use crate::errors::TodoError;
use crate::handlers::gateway::{ApiGatewayProxyEvent, ApiGatewayResponse};
use crate::handlers::AppState;
use crate::models::{
    CreateTodoRequest, CreateTodoResponse, EmptyResponse, TodoListResponse, UpdateTodoRequest,
    UploadUrlResponse,
};
use tracing::instrument;

/// Path parameter naming the item.
pub const TODO_ID_PARAM: &str = "todoId";

/// Create a to-do item.
///
/// POST /todos
#[instrument(skip_all)]
pub async fn create_todo(state: &AppState, event: &ApiGatewayProxyEvent) -> ApiGatewayResponse {
    let result = async {
        let user_id = require_principal(event, "User not authenticated for creating todo")?;
        let request: CreateTodoRequest = event.json_body()?;
        let todo = state.todos.create(user_id, request).await?;
        Ok::<_, TodoError>(ApiGatewayResponse::ok(&CreateTodoResponse { res: todo }))
    }
    .await;

    render(result, "Error creating TODO item")
}

/// List the caller's to-do items.
///
/// GET /todos
#[instrument(skip_all)]
pub async fn get_todos(state: &AppState, event: &ApiGatewayProxyEvent) -> ApiGatewayResponse {
    let result = async {
        let user_id = require_principal(event, "User not authenticated for getting todos")?;
        let items = state.todos.list(user_id).await?;
        Ok::<_, TodoError>(ApiGatewayResponse::ok(&TodoListResponse { items }))
    }
    .await;

    render(result, "Error fetching todos")
}

/// Update a to-do item.
///
/// PATCH /todos/{todoId}
#[instrument(skip_all)]
pub async fn update_todo(state: &AppState, event: &ApiGatewayProxyEvent) -> ApiGatewayResponse {
    let result = async {
        let user_id = require_principal(event, "User not authenticated for updating todo")?;
        let todo_id = require_todo_id(event)?;
        let request: UpdateTodoRequest = event.json_body()?;
        state.todos.update(user_id, todo_id, request).await?;
        Ok::<_, TodoError>(ApiGatewayResponse::ok(&EmptyResponse::default()))
    }
    .await;

    render(result, "Error updating TODO item")
}

/// Delete a to-do item.
///
/// DELETE /todos/{todoId}
#[instrument(skip_all)]
pub async fn delete_todo(state: &AppState, event: &ApiGatewayProxyEvent) -> ApiGatewayResponse {
    let result = async {
        let user_id = require_principal(event, "User not authenticated for deleting todo")?;
        let todo_id = require_todo_id(event)?;
        state.todos.delete(user_id, todo_id).await?;
        Ok::<_, TodoError>(ApiGatewayResponse::ok(&EmptyResponse::default()))
    }
    .await;

    render(result, "Error deleting TODO item")
}

/// Presigned upload URL for an item's attachment.
///
/// POST /todos/{todoId}/attachment
#[instrument(skip_all)]
pub async fn generate_upload_url(
    state: &AppState,
    event: &ApiGatewayProxyEvent,
) -> ApiGatewayResponse {
    let result = async {
        require_principal(
            event,
            "User not authenticated for uploading todo's attachment",
        )?;
        let todo_id = require_todo_id(event)?;
        let url = state.attachments.generate_upload_url(todo_id).await?;
        Ok::<_, TodoError>(ApiGatewayResponse::ok(&UploadUrlResponse { url }))
    }
    .await;

    render(result, "Error generating upload URL")
}

fn require_principal<'a>(
    event: &'a ApiGatewayProxyEvent,
    message: &str,
) -> Result<&'a str, TodoError> {
    event
        .principal_id()
        .ok_or_else(|| TodoError::Unauthenticated(message.to_string()))
}

fn require_todo_id(event: &ApiGatewayProxyEvent) -> Result<&str, TodoError> {
    event
        .path_parameter(TODO_ID_PARAM)
        .ok_or_else(|| TodoError::BadRequest("Missing todoId path parameter".to_string()))
}

fn render(result: Result<ApiGatewayResponse, TodoError>, generic: &str) -> ApiGatewayResponse {
    match result {
        Ok(response) => response,
        Err(e) => {
            if !e.is_server_error() {
                tracing::info!(
                    target: "todo.handlers",
                    status = e.status_code(),
                    error = %e,
                    "Request rejected"
                );
            }
            ApiGatewayResponse::error(e.status_code(), &e.client_message(generic))
        }
    }
}
