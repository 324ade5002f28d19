//! Receipt storage facade.

use chrono::Utc;
use uuid::Uuid;

use crate::backend::Backend;
use crate::error::Result;
use crate::models::ReceiptFile;

/// Bucket holding all receipt images.
pub(crate) const RECEIPTS_BUCKET: &str = "receipts";

/// Object key namespaced by user, with a millisecond timestamp suffix.
/// Two uploads in the same millisecond can collide; accepted, not mitigated.
pub(crate) fn receipt_object_path(user_id: Uuid, file_name: &str) -> String {
    format!("{}/{}-{}", user_id, Utc::now().timestamp_millis(), file_name)
}

/// Thin facade over the blob store.
#[derive(Clone)]
pub struct StorageFacade {
    backend: Backend,
}

impl StorageFacade {
    pub(crate) fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Public URL for a stored receipt; `None` for an absent or empty path.
    pub fn receipt_url(&self, path: Option<&str>) -> Option<String> {
        match path {
            Some(p) if !p.is_empty() => Some(self.backend.blobs.public_url(RECEIPTS_BUCKET, p)),
            _ => None,
        }
    }

    /// Upload a receipt and return its stored path.
    pub async fn upload_receipt(&self, user_id: Uuid, file: ReceiptFile) -> Result<String> {
        let path = receipt_object_path(user_id, &file.file_name);
        self.backend
            .blobs
            .upload(RECEIPTS_BUCKET, &path, &file.content_type, file.data)
            .await
    }
}
