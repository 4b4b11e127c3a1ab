//! Signed-access resolver.
//!
//! Rewrites stored blob references into time-limited URLs on the way out.
//! Only the response copy is touched; persisted rows keep their references.

use std::sync::Arc;
use std::time::Duration;

use workdesk_types::attachment::Attachments;
use workdesk_types::error::ResourceError;

use crate::storage::blob_store::BlobStore;

pub struct SignedAccessResolver<B: BlobStore> {
    blobs: Arc<B>,
    ttl: Duration,
}

impl<B: BlobStore> SignedAccessResolver<B> {
    pub fn new(blobs: Arc<B>, ttl: Duration) -> Self {
        Self { blobs, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace every reference slot of `entity` with a signed URL.
    pub async fn sign<T: Attachments + Send>(&self, mut entity: T) -> Result<T, ResourceError> {
        for slot in entity.attachment_slots() {
            let url = self.blobs.signed_url(slot.as_str(), self.ttl).await?;
            *slot = url;
        }
        Ok(entity)
    }

    pub async fn sign_all<T: Attachments + Send>(
        &self,
        entities: Vec<T>,
    ) -> Result<Vec<T>, ResourceError> {
        let mut signed = Vec::with_capacity(entities.len());
        for entity in entities {
            signed.push(self.sign(entity).await?);
        }
        Ok(signed)
    }
}
