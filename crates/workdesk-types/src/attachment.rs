//! Attachment uploads, the boundary upload policy, and the accessor trait
//! shared by every entity that carries blob references.

use serde::{Deserialize, Serialize};

/// Default cap on files per request.
pub const DEFAULT_MAX_FILES: usize = 5;

/// Default cap on a single file (2 MiB).
pub const DEFAULT_MAX_FILE_BYTES: usize = 2 * 1024 * 1024;

/// A file received from a client, not yet stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }
}

/// Entities that hold blob references.
///
/// The writer reads the id and references; the signed-access resolver
/// rewrites the reference slots of a response copy in place.
pub trait Attachments {
    fn entity_id(&self) -> i64;

    fn attachment_refs(&self) -> Vec<String>;

    fn attachment_slots(&mut self) -> Vec<&mut String>;
}

/// Limits applied to uploads before anything is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPolicy {
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: usize,

    /// Accepted MIME types (matched case-insensitively).
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

fn default_max_file_bytes() -> usize {
    DEFAULT_MAX_FILE_BYTES
}

fn default_allowed_types() -> Vec<String> {
    vec!["image/jpeg".to_string(), "image/png".to_string()]
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_bytes: default_max_file_bytes(),
            allowed_types: default_allowed_types(),
        }
    }
}

impl AttachmentPolicy {
    pub fn allows_type(&self, content_type: &str) -> bool {
        let normalized = normalize_mime(content_type);
        self.allowed_types
            .iter()
            .any(|t| normalize_mime(t) == normalized)
    }

    /// Check a single file as it is received.
    pub fn check_file(&self, upload: &Upload, extension_mime: &str) -> Result<(), String> {
        if upload.data.is_empty() {
            return Err(format!("file '{}' is empty", upload.filename));
        }
        if upload.data.len() > self.max_file_bytes {
            return Err(format!(
                "file '{}' is {} bytes, the limit is {} bytes",
                upload.filename,
                upload.data.len(),
                self.max_file_bytes
            ));
        }
        if !self.allows_type(&upload.content_type) || !self.allows_type(extension_mime) {
            return Err(format!(
                "file '{}' has a disallowed type '{}'; only {} are accepted",
                upload.filename,
                upload.content_type,
                self.allowed_types.join(", ")
            ));
        }
        Ok(())
    }

    pub fn check_count(&self, count: usize) -> Result<(), String> {
        if count > self.max_files {
            return Err(format!(
                "too many files: {count} provided, at most {} allowed",
                self.max_files
            ));
        }
        Ok(())
    }
}

/// `image/jpg` is common in the wild; treat it as `image/jpeg`.
fn normalize_mime(mime: &str) -> String {
    let base = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    if base == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(len: usize) -> Upload {
        Upload::new("photo.png", "image/png", vec![0u8; len])
    }

    #[test]
    fn test_default_policy() {
        let policy = AttachmentPolicy::default();
        assert_eq!(policy.max_files, 5);
        assert_eq!(policy.max_file_bytes, 2_097_152);
        assert!(policy.allows_type("image/png"));
        assert!(policy.allows_type("IMAGE/JPG"));
        assert!(!policy.allows_type("application/pdf"));
    }

    #[test]
    fn test_check_file_accepts_image() {
        let policy = AttachmentPolicy::default();
        assert!(policy.check_file(&png(10), "image/png").is_ok());
    }

    #[test]
    fn test_check_file_rejects_oversize() {
        let policy = AttachmentPolicy {
            max_file_bytes: 4,
            ..Default::default()
        };
        let err = policy.check_file(&png(5), "image/png").unwrap_err();
        assert!(err.contains("limit is 4 bytes"));
    }

    #[test]
    fn test_check_file_rejects_mismatched_extension() {
        let policy = AttachmentPolicy::default();
        let upload = Upload::new("script.sh", "image/png", vec![1]);
        assert!(policy.check_file(&upload, "text/x-shellscript").is_err());
    }

    #[test]
    fn test_check_count() {
        let policy = AttachmentPolicy::default();
        assert!(policy.check_count(5).is_ok());
        assert!(policy.check_count(6).is_err());
    }

    #[test]
    fn test_policy_deserialize_partial() {
        let policy: AttachmentPolicy = toml::from_str("max_files = 2").unwrap();
        assert_eq!(policy.max_files, 2);
        assert_eq!(policy.max_file_bytes, DEFAULT_MAX_FILE_BYTES);
    }
}
