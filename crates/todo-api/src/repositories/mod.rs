//! Repository layer for the to-do API.
//!
//! Provides database access following the Handler -> Service -> Repository
//! architecture.

pub mod todos;

pub use todos::{PgTodoRepository, TodoRepository};
