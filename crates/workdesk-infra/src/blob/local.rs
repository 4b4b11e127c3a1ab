//! Filesystem blob store with HMAC-SHA256 signed links.
//!
//! Objects live under `{root_dir}/{bucket}/{key}`. A signed link is
//! `{public_base_url}/blobs/{key}?expires={unix}&signature={hex}` where the
//! signature is HMAC-SHA256 over `"{key}\n{expires}"`.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tokio::fs;
use tracing::{debug, info};
use workdesk_core::storage::blob_store::BlobStore;
use workdesk_types::error::BlobError;

type HmacSha256 = Hmac<Sha256>;

const SIGNING_KEY_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    public_base_url: String,
    signing_key: Vec<u8>,
}

impl LocalBlobStore {
    /// Open (creating if needed) the bucket directory under `root_dir`.
    pub async fn open(
        root_dir: &Path,
        bucket: &str,
        public_base_url: &str,
        signing_key: Vec<u8>,
    ) -> Result<Self, BlobError> {
        validate_key(bucket)?;
        let base_path = root_dir.join(bucket);
        fs::create_dir_all(&base_path).await.map_err(|e| {
            BlobError::Io(format!(
                "failed to create blob directory '{}': {e}",
                base_path.display()
            ))
        })?;

        info!(path = %base_path.display(), "blob store initialized");

        Ok(Self {
            base_path,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            signing_key,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Read a stored object.
    pub async fn read(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(BlobError::NotFound),
            Err(e) => Err(BlobError::Io(format!("failed to read blob {key}: {e}"))),
        }
    }

    /// Check a signed link's signature, then its expiry.
    pub fn verify(&self, key: &str, expires: i64, signature: &str) -> Result<(), BlobError> {
        self.verify_at(key, expires, signature, Utc::now().timestamp())
    }

    fn verify_at(&self, key: &str, expires: i64, signature: &str, now: i64) -> Result<(), BlobError> {
        let expected = hex_decode(signature).map_err(|_| BlobError::InvalidSignature)?;
        self.mac(key, expires)?
            .verify_slice(&expected)
            .map_err(|_| BlobError::InvalidSignature)?;
        if expires < now {
            return Err(BlobError::Expired);
        }
        Ok(())
    }

    fn sign_at(&self, key: &str, expires: i64) -> Result<String, BlobError> {
        let signature = hex_encode(&self.mac(key, expires)?.finalize().into_bytes());
        Ok(format!(
            "{}/blobs/{key}?expires={expires}&signature={signature}",
            self.public_base_url
        ))
    }

    fn mac(&self, key: &str, expires: i64) -> Result<HmacSha256, BlobError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .map_err(|e| BlobError::Io(format!("invalid signing key: {e}")))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }
}

/// Keys are relative paths made of normal components only.
fn validate_key(key: &str) -> Result<(), BlobError> {
    if key.is_empty() || key.contains('\\') || key.contains('\0') {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    let path = Path::new(key);
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Io(format!("failed to create {}: {e}", parent.display())))?;
        }

        let size = data.len();
        fs::write(&path, data)
            .await
            .map_err(|e| BlobError::Io(format!("failed to write blob {key}: {e}")))?;

        debug!(key, size, content_type, "stored blob");
        Ok(key.to_string())
    }

    async fn signed_url(&self, reference: &str, ttl: Duration) -> Result<String, BlobError> {
        validate_key(reference)?;
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        self.sign_at(reference, expires)
    }

    async fn delete(&self, reference: &str) -> Result<(), BlobError> {
        let path = self.path_for(reference)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = reference, "deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Io(format!("failed to delete blob {reference}: {e}"))),
        }
    }
}

/// Load the hex-encoded signing key at `path`, generating one on first run.
pub async fn load_or_create_signing_key(path: &Path) -> Result<Vec<u8>, BlobError> {
    match fs::read_to_string(path).await {
        Ok(contents) => hex_decode(contents.trim())
            .map_err(|_| BlobError::Io(format!("malformed signing key at {}", path.display()))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let mut key = vec![0u8; SIGNING_KEY_BYTES];
            rand::thread_rng().fill_bytes(&mut key);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| BlobError::Io(e.to_string()))?;
            }
            fs::write(path, hex_encode(&key))
                .await
                .map_err(|e| BlobError::Io(format!("failed to write signing key: {e}")))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o600);
                fs::set_permissions(path, perms)
                    .await
                    .map_err(|e| BlobError::Io(e.to_string()))?;
            }

            info!(path = %path.display(), "generated blob signing key");
            Ok(key)
        }
        Err(e) => Err(BlobError::Io(format!("failed to read signing key: {e}"))),
    }
}

fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return Err(());
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
