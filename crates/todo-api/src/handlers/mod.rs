//! Gateway-facing handlers.
//!
//! - `authorizer` - Token authorizer returning an IAM policy
//! - `todos` - CRUD and upload-URL handlers over proxy events
//! - `gateway` - Proxy event and response types
//!
//! A process runs one `Function` over a stream of JSON events, one per
//! line, sharing the authorizer and its key cache across all of them.

pub mod authorizer;
pub mod gateway;
pub mod todos;

use crate::auth::Authorizer;
use crate::services::{AttachmentService, TodoService};
use serde::de::DeserializeOwned;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub use authorizer::{handle_token_authorizer, AuthorizerResponse, TokenAuthorizerEvent};
pub use gateway::{ApiGatewayProxyEvent, ApiGatewayResponse};
pub use todos::{create_todo, delete_todo, generate_upload_url, get_todos, update_todo};

/// Application state shared across the CRUD handlers.
pub struct AppState {
    pub todos: TodoService,
    pub attachments: Arc<AttachmentService>,
}

impl AppState {
    pub fn new(todos: TodoService, attachments: Arc<AttachmentService>) -> Self {
        Self { todos, attachments }
    }
}

/// A named handler entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Auth,
    CreateTodo,
    GetTodos,
    UpdateTodo,
    DeleteTodo,
    GenerateUploadUrl,
}

impl Function {
    pub const ALL: [Function; 6] = [
        Function::Auth,
        Function::CreateTodo,
        Function::GetTodos,
        Function::UpdateTodo,
        Function::DeleteTodo,
        Function::GenerateUploadUrl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Auth => "auth",
            Function::CreateTodo => "create-todo",
            Function::GetTodos => "get-todos",
            Function::UpdateTodo => "update-todo",
            Function::DeleteTodo => "delete-todo",
            Function::GenerateUploadUrl => "generate-upload-url",
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised function name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown function '{0}'")]
pub struct UnknownFunction(pub String);

impl FromStr for Function {
    type Err = UnknownFunction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Function::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFunction(s.to_string()))
    }
}

/// Run `function` on the JSON `input` and return the JSON response.
///
/// An event that does not parse is handled as an empty event: the
/// authorizer denies it and the CRUD handlers reject it as unauthenticated.
///
/// # Errors
///
/// Returns an error only if the response cannot be serialized.
pub async fn invoke(
    function: Function,
    authorizer: &Authorizer,
    state: &AppState,
    input: &str,
) -> Result<String, serde_json::Error> {
    match function {
        Function::Auth => {
            let event: TokenAuthorizerEvent = parse_event(function, input);
            serde_json::to_string(&handle_token_authorizer(authorizer, &event).await)
        }
        Function::CreateTodo => {
            serde_json::to_string(&create_todo(state, &parse_event(function, input)).await)
        }
        Function::GetTodos => {
            serde_json::to_string(&get_todos(state, &parse_event(function, input)).await)
        }
        Function::UpdateTodo => {
            serde_json::to_string(&update_todo(state, &parse_event(function, input)).await)
        }
        Function::DeleteTodo => {
            serde_json::to_string(&delete_todo(state, &parse_event(function, input)).await)
        }
        Function::GenerateUploadUrl => {
            serde_json::to_string(&generate_upload_url(state, &parse_event(function, input)).await)
        }
    }
}

/// Run `function` on every line of `reader`, writing one response line per
/// event to `writer`. Blank lines are skipped.
///
/// Returns the number of events handled once `reader` reaches EOF.
///
/// # Errors
///
/// Returns an error if reading, writing or response serialization fails.
pub async fn serve<R, W>(
    function: Function,
    authorizer: &Authorizer,
    state: &AppState,
    reader: R,
    mut writer: W,
) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let output = invoke(function, authorizer, state, &line).await?;
        writer.write_all(output.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        handled += 1;
    }

    Ok(handled)
}

fn parse_event<T: DeserializeOwned + Default>(function: Function, input: &str) -> T {
    serde_json::from_str(input).unwrap_or_else(|e| {
        tracing::warn!(target: "todo.handlers", function = %function, error = %e, "Unparsable event");
        T::default()
    })
}
