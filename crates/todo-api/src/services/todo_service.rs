//! To-do business rules.
//!
//! Validates requests, builds new items and resolves attachment keys before
//! handing off to the repository.

use crate::errors::TodoError;
use crate::models::{CreateTodoRequest, Todo, TodoPatch, UpdateTodoRequest};
use crate::repositories::TodoRepository;
use crate::services::attachments::AttachmentService;
use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Message for a create request without name or due date.
pub const MISSING_CREATE_FIELDS: &str = "Name and dueDate are required";

/// Message for an update request without any field.
pub const MISSING_UPDATE_FIELDS: &str =
    "At least one of name, dueDate, attachmentUrl, or done must be provided";

/// To-do service.
pub struct TodoService {
    repository: Arc<dyn TodoRepository>,
    attachments: Arc<AttachmentService>,
}

impl TodoService {
    pub fn new(repository: Arc<dyn TodoRepository>, attachments: Arc<AttachmentService>) -> Self {
        Self {
            repository,
            attachments,
        }
    }

    /// Create an item for `user_id`.
    ///
    /// # Errors
    ///
    /// `TodoError::BadRequest` if `name` or `dueDate` is missing or blank.
    #[instrument(skip_all)]
    pub async fn create(&self, user_id: &str, request: CreateTodoRequest) -> Result<Todo, TodoError> {
        let (Some(name), Some(due_date)) = (non_blank(request.name), non_blank(request.due_date))
        else {
            return Err(TodoError::BadRequest(MISSING_CREATE_FIELDS.to_string()));
        };

        let todo = Todo {
            todo_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name,
            due_date,
            created_at: Utc::now(),
            done: false,
            attachment_url: non_blank(request.attachment_url),
        };

        self.repository.create(&todo).await?;

        tracing::info!(target: "todo.services.todos", todo_id = %todo.todo_id, "Created todo");
        Ok(todo)
    }

    /// Update the present fields of an item.
    ///
    /// A given `attachmentUrl` is an object key and is stored as the public
    /// object URL.
    ///
    /// # Errors
    ///
    /// - `TodoError::BadRequest` if no field is given
    /// - `TodoError::NotFound` if the user owns no item with `todo_id`
    #[instrument(skip_all, fields(todo_id = %todo_id))]
    pub async fn update(
        &self,
        user_id: &str,
        todo_id: &str,
        request: UpdateTodoRequest,
    ) -> Result<(), TodoError> {
        let patch = TodoPatch {
            name: non_blank(request.name),
            due_date: non_blank(request.due_date),
            attachment_url: non_blank(request.attachment_url)
                .map(|key| self.attachments.attachment_url(&key)),
            done: request.done,
        };

        if patch == TodoPatch::default() {
            return Err(TodoError::BadRequest(MISSING_UPDATE_FIELDS.to_string()));
        }

        if !self.repository.update(user_id, todo_id, &patch).await? {
            return Err(TodoError::NotFound("Todo item not found".to_string()));
        }

        tracing::info!(target: "todo.services.todos", todo_id = %todo_id, "Updated todo");
        Ok(())
    }

    /// Delete an item. Deleting a missing item succeeds.
    #[instrument(skip_all, fields(todo_id = %todo_id))]
    pub async fn delete(&self, user_id: &str, todo_id: &str) -> Result<(), TodoError> {
        self.repository.delete(user_id, todo_id).await?;
        tracing::info!(target: "todo.services.todos", todo_id = %todo_id, "Deleted todo");
        Ok(())
    }

    /// All items of `user_id`, oldest first.
    #[instrument(skip_all)]
    pub async fn list(&self, user_id: &str) -> Result<Vec<Todo>, TodoError> {
        let items = self.repository.list_by_user(user_id).await?;
        tracing::debug!(target: "todo.services.todos", count = items.len(), "Listed todos");
        Ok(items)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
