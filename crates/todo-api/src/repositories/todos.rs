//! To-do repository for database operations.
//!
//! A thin pass-through persistence layer: every operation is scoped to the
//! owning user, and no business rules live here.
//!
//! # Security
//!
//! - All queries use parameterized statements (SQL injection safe)
//! - Every query filters on `user_id`, so one principal never sees another's items
//! - User ids are not logged

use crate::errors::TodoError;
use crate::models::{Todo, TodoPatch};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

/// Trait for to-do persistence (enables mocking).
#[async_trait::async_trait]
pub trait TodoRepository: Send + Sync {
    /// Insert a fully-formed item.
    async fn create(&self, todo: &Todo) -> Result<(), TodoError>;

    /// Apply the present fields of `patch` to one item.
    ///
    /// Returns `false` if the user owns no item with `todo_id`.
    async fn update(
        &self,
        user_id: &str,
        todo_id: &str,
        patch: &TodoPatch,
    ) -> Result<bool, TodoError>;

    /// Delete one item. Deleting a missing item is not an error.
    async fn delete(&self, user_id: &str, todo_id: &str) -> Result<(), TodoError>;

    /// All items of a user, oldest first.
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Todo>, TodoError>;
}

/// PostgreSQL-backed to-do repository.
#[derive(Clone)]
pub struct PgTodoRepository {
    pool: PgPool,
}

impl PgTodoRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TodoRepository for PgTodoRepository {
    #[instrument(skip_all, fields(todo_id = %todo.todo_id))]
    async fn create(&self, todo: &Todo) -> Result<(), TodoError> {
        sqlx::query(
            r#"
            INSERT INTO todos (user_id, todo_id, name, due_date, created_at, done, attachment_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&todo.user_id)
        .bind(&todo.todo_id)
        .bind(&todo.name)
        .bind(&todo.due_date)
        .bind(todo.created_at)
        .bind(todo.done)
        .bind(&todo.attachment_url)
        .execute(&self.pool)
        .await?;

        tracing::debug!(target: "todo.repositories.todos", todo_id = %todo.todo_id, "Inserted todo");
        Ok(())
    }

    #[instrument(skip_all, fields(todo_id = %todo_id))]
    async fn update(
        &self,
        user_id: &str,
        todo_id: &str,
        patch: &TodoPatch,
    ) -> Result<bool, TodoError> {
        let result = sqlx::query(
            r#"
            UPDATE todos
            SET name = COALESCE($3, name),
                due_date = COALESCE($4, due_date),
                attachment_url = COALESCE($5, attachment_url),
                done = COALESCE($6, done)
            WHERE user_id = $1 AND todo_id = $2
            "#,
        )
        .bind(user_id)
        .bind(todo_id)
        .bind(&patch.name)
        .bind(&patch.due_date)
        .bind(&patch.attachment_url)
        .bind(patch.done)
        .execute(&self.pool)
        .await?;

        let matched = result.rows_affected() > 0;
        tracing::debug!(target: "todo.repositories.todos", todo_id = %todo_id, matched, "Updated todo");
        Ok(matched)
    }

    #[instrument(skip_all, fields(todo_id = %todo_id))]
    async fn delete(&self, user_id: &str, todo_id: &str) -> Result<(), TodoError> {
        let result = sqlx::query(
            r#"
            DELETE FROM todos
            WHERE user_id = $1 AND todo_id = $2
            "#,
        )
        .bind(user_id)
        .bind(todo_id)
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            target: "todo.repositories.todos",
            todo_id = %todo_id,
            rows_affected = result.rows_affected(),
            "Deleted todo"
        );
        Ok(())
    }

    #[instrument(skip_all)]
    async fn list_by_user(&self, user_id: &str) -> Result<Vec<Todo>, TodoError> {
        let rows: Vec<TodoRow> = sqlx::query_as(
            r#"
            SELECT user_id, todo_id, name, due_date, created_at, done, attachment_url
            FROM todos
            WHERE user_id = $1
            ORDER BY created_at ASC, todo_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Todo::from).collect())
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(sqlx::FromRow)]
struct TodoRow {
    user_id: String,
    todo_id: String,
    name: String,
    due_date: String,
    created_at: DateTime<Utc>,
    done: bool,
    attachment_url: Option<String>,
}

impl From<TodoRow> for Todo {
    fn from(row: TodoRow) -> Self {
        Todo {
            todo_id: row.todo_id,
            user_id: row.user_id,
            name: row.name,
            due_date: row.due_date,
            created_at: row.created_at,
            done: row.done,
            attachment_url: row.attachment_url,
        }
    }
}

/// In-memory repository module for testing.
///
/// This module provides a mock implementation of the repository for use in
/// service and handler tests.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory to-do repository.
    pub struct InMemoryTodoRepository {
        /// Stored items in insertion order.
        todos: Mutex<Vec<Todo>>,
        /// Number of calls made.
        call_count: AtomicUsize,
        /// Whether to return errors.
        return_error: bool,
    }

    impl InMemoryTodoRepository {
        /// Create an empty repository.
        pub fn new() -> Self {
            Self {
                todos: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: false,
            }
        }

        /// Create a repository whose every operation fails.
        pub fn failing() -> Self {
            Self {
                return_error: true,
                ..Self::new()
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Snapshot of all stored items.
        pub fn all(&self) -> Vec<Todo> {
            self.lock().clone()
        }

        fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Todo>> {
            self.todos
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
        }

        fn enter(&self) -> Result<(), TodoError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.return_error {
                return Err(TodoError::Database("Mock repository error".to_string()));
            }
            Ok(())
        }
    }

    impl Default for InMemoryTodoRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl TodoRepository for InMemoryTodoRepository {
        async fn create(&self, todo: &Todo) -> Result<(), TodoError> {
            self.enter()?;
            let mut todos = self.lock();
            todos.retain(|t| !(t.user_id == todo.user_id && t.todo_id == todo.todo_id));
            todos.push(todo.clone());
            Ok(())
        }

        async fn update(
            &self,
            user_id: &str,
            todo_id: &str,
            patch: &TodoPatch,
        ) -> Result<bool, TodoError> {
            self.enter()?;
            let mut todos = self.lock();
            match todos
                .iter_mut()
                .find(|t| t.user_id == user_id && t.todo_id == todo_id)
            {
                Some(todo) => {
                    patch.apply_to(todo);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn delete(&self, user_id: &str, todo_id: &str) -> Result<(), TodoError> {
            self.enter()?;
            self.lock()
                .retain(|t| !(t.user_id == user_id && t.todo_id == todo_id));
            Ok(())
        }

        async fn list_by_user(&self, user_id: &str) -> Result<Vec<Todo>, TodoError> {
            self.enter()?;
            let mut items: Vec<Todo> = self
                .lock()
                .iter()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect();
            items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
            Ok(items)
        }
    }
}
