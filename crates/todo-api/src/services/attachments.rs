//! Attachment upload URLs.
//!
//! Attachments are uploaded by the client straight to object storage using a
//! presigned PUT URL, then linked to an item through `update_todo`.
//!
//! # Security
//!
//! - Upload URLs expire after the configured period
//! - The object key is derived from the item id, never from client input

use crate::config::Config;
use crate::errors::TodoError;
use aws_sdk_s3::presigning::PresigningConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Content type the client uploads with.
pub const UPLOAD_CONTENT_TYPE: &str = "multipart/form-data";

/// Extension of stored attachment objects.
const ATTACHMENT_EXTENSION: &str = "png";

/// Trait for object storage operations (enables mocking).
#[async_trait::async_trait]
pub trait AttachmentStorage: Send + Sync {
    /// Presign a PUT of `key` with `content_type`, valid for `expires_in`.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, TodoError>;
}

/// S3-backed attachment storage.
pub struct S3AttachmentStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3AttachmentStorage {
    /// Build a client for `bucket` in `region` using the default credential chain.
    pub async fn new(bucket: String, region: String) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region))
            .load()
            .await;
        Self {
            client: aws_sdk_s3::Client::new(&sdk_config),
            bucket,
        }
    }
}

#[async_trait::async_trait]
impl AttachmentStorage for S3AttachmentStorage {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String, TodoError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| TodoError::Storage(format!("Invalid presigning config: {e}")))?;

        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| TodoError::Storage(format!("Presigning failed: {e}")))?;

        Ok(presigned.uri().to_string())
    }
}

/// Upload URL generation and public attachment URLs.
pub struct AttachmentService {
    storage: Arc<dyn AttachmentStorage>,
    base_url: String,
    upload_url_expiry: Duration,
}

impl AttachmentService {
    /// # Arguments
    ///
    /// * `storage` - Object storage used for presigning
    /// * `base_url` - Public URL prefix of stored objects, without trailing slash
    /// * `upload_url_expiry` - Validity of generated upload URLs
    pub fn new(
        storage: Arc<dyn AttachmentStorage>,
        base_url: String,
        upload_url_expiry: Duration,
    ) -> Self {
        Self {
            storage,
            base_url,
            upload_url_expiry,
        }
    }

    pub fn from_config(config: &Config, storage: Arc<dyn AttachmentStorage>) -> Self {
        Self::new(
            storage,
            config.attachment_base_url.clone(),
            config.upload_url_expiry,
        )
    }

    /// Object key of the attachment for `todo_id`.
    pub fn object_key(todo_id: &str) -> String {
        format!("{todo_id}.{ATTACHMENT_EXTENSION}")
    }

    /// Presigned upload URL for the attachment of `todo_id`.
    #[instrument(skip_all, fields(todo_id = %todo_id))]
    pub async fn generate_upload_url(&self, todo_id: &str) -> Result<String, TodoError> {
        let key = Self::object_key(todo_id);
        let url = self
            .storage
            .presign_put(&key, UPLOAD_CONTENT_TYPE, self.upload_url_expiry)
            .await?;

        tracing::info!(
            target: "todo.services.attachments",
            todo_id = %todo_id,
            expires_in_secs = self.upload_url_expiry.as_secs(),
            "Generated attachment upload URL"
        );
        Ok(url)
    }

    /// Public URL of the stored object `key`.
    pub fn attachment_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.trim_start_matches('/'))
    }
}

/// Mock storage module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A recorded presign request.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct PresignRequest {
        pub key: String,
        pub content_type: String,
        pub expires_in: Duration,
    }

    /// Mock storage returning `https://uploads.test/<key>?expires=<secs>`.
    pub struct MockAttachmentStorage {
        requests: Mutex<Vec<PresignRequest>>,
        call_count: AtomicUsize,
        return_error: bool,
    }

    impl MockAttachmentStorage {
        pub fn new() -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
                return_error: false,
            }
        }

        /// Create a mock that returns errors.
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

        /// Requests seen so far.
        pub fn requests(&self) -> Vec<PresignRequest> {
            self.requests
                .lock()
                .map(|requests| requests.clone())
                .unwrap_or_default()
        }
    }

    impl Default for MockAttachmentStorage {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl AttachmentStorage for MockAttachmentStorage {
        async fn presign_put(
            &self,
            key: &str,
            content_type: &str,
            expires_in: Duration,
        ) -> Result<String, TodoError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            if self.return_error {
                return Err(TodoError::Storage("Mock storage error".to_string()));
            }

            if let Ok(mut requests) = self.requests.lock() {
                requests.push(PresignRequest {
                    key: key.to_string(),
                    content_type: content_type.to_string(),
                    expires_in,
                });
            }

            Ok(format!(
                "https://uploads.test/{key}?expires={}",
                expires_in.as_secs()
            ))
        }
    }
}
