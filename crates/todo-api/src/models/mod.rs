//! To-do API models.
//!
//! Contains data types used across the to-do handlers, services and
//! repositories. Wire types are camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A to-do item owned by one user.
///
/// Items are keyed by `(user_id, todo_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Item identifier (UUID v4 string).
    pub todo_id: String,

    /// Owner, the authorizer's principal id.
    pub user_id: String,

    pub name: String,

    /// Due date as supplied by the client.
    pub due_date: String,

    pub created_at: DateTime<Utc>,

    pub done: bool,

    /// Public URL of the attachment, serialized as `null` when absent.
    pub attachment_url: Option<String>,
}

/// Request body for creating a to-do item.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub due_date: Option<String>,

    #[serde(default)]
    pub attachment_url: Option<String>,
}

/// Request body for updating a to-do item.
///
/// Every field is optional; at least one must be present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub due_date: Option<String>,

    /// Object key of an uploaded attachment (e.g. `<todoId>.png`).
    #[serde(default)]
    pub attachment_url: Option<String>,

    #[serde(default)]
    pub done: Option<bool>,
}

/// Fields to change on a stored item. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub name: Option<String>,
    pub due_date: Option<String>,
    /// Full public URL, already resolved from the object key.
    pub attachment_url: Option<String>,
    pub done: Option<bool>,
}

impl TodoPatch {
    /// Apply the present fields to `todo`.
    pub fn apply_to(&self, todo: &mut Todo) {
        if let Some(name) = &self.name {
            todo.name.clone_from(name);
        }
        if let Some(due_date) = &self.due_date {
            todo.due_date.clone_from(due_date);
        }
        if let Some(attachment_url) = &self.attachment_url {
            todo.attachment_url = Some(attachment_url.clone());
        }
        if let Some(done) = self.done {
            todo.done = done;
        }
    }
}

/// Response body for `create_todo`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateTodoResponse {
    pub res: Todo,
}

/// Response body for `get_todos`.
#[derive(Debug, Clone, Serialize)]
pub struct TodoListResponse {
    pub items: Vec<Todo>,
}

/// Empty response body (`{}`) for `update_todo` and `delete_todo`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EmptyResponse {}

/// Response body for `generate_upload_url`.
#[derive(Debug, Clone, Serialize)]
pub struct UploadUrlResponse {
    pub url: String,
}
