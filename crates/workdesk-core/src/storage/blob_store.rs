//! Blob store trait.
//!
//! Defines the interface for binary attachment storage with time-limited
//! access links. Implementations live in workdesk-infra.

use std::time::Duration;

use workdesk_types::error::BlobError;

/// Trait for attachment object storage.
///
/// A blob reference is the key the object was stored under; it stays valid
/// for the object's lifetime and is what rows persist. Signed URLs are only
/// ever produced on read.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`. Returns the blob reference.
    fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> impl std::future::Future<Output = Result<String, BlobError>> + Send;

    /// Produce a time-limited access URL for a stored reference.
    fn signed_url(
        &self,
        reference: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<String, BlobError>> + Send;

    /// Delete a blob. Deleting a missing blob succeeds.
    fn delete(
        &self,
        reference: &str,
    ) -> impl std::future::Future<Output = Result<(), BlobError>> + Send;
}
