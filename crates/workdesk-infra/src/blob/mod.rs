//! Blob storage infrastructure.
//!
//! Implements the `BlobStore` trait from `workdesk-core` on the local
//! filesystem, with HMAC-signed download links served by the API.

use std::path::Path;

pub mod local;

pub use local::{LocalBlobStore, load_or_create_signing_key};

/// Detect MIME type from file extension.
///
/// Used at the upload boundary to cross-check the declared content type, and
/// when serving a blob back.
pub fn detect_mime(filename: &str) -> String {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}
