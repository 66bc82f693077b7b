//! Service layer for the to-do API.
//!
//! - `todo_service` - To-do validation and CRUD orchestration
//! - `attachments` - Presigned upload URLs and public attachment URLs

pub mod attachments;
pub mod todo_service;

pub use attachments::{AttachmentService, AttachmentStorage, S3AttachmentStorage};
pub use todo_service::TodoService;
