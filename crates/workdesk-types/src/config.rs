//! Service configuration types.
//!
//! `ServiceConfig` represents `{data_dir}/config.toml`. Every field has a
//! default, so an empty or missing file yields a runnable configuration.

use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentPolicy;

/// Top-level configuration for the Workdesk service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Deployment environment; prefixes every blob key.
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub blob: BlobConfig,

    #[serde(default)]
    pub attachments: AttachmentPolicy,

    /// Concurrent uploads within one attachment batch.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_upload_concurrency() -> usize {
    4
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            blob: BlobConfig::default(),
            attachments: AttachmentPolicy::default(),
            upload_concurrency: default_upload_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Writer operations past this deadline are cancelled and compensated.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle lifetime of a chat session; every admitted message slides it.
    #[serde(default = "default_session_ttl")]
    pub ttl_seconds: u64,
}

fn default_session_ttl() -> u64 {
    1800
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_session_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    /// Base URL that signed links are built on.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_seconds: u64,

    /// Blob root directory. Defaults to `{data_dir}/blobs`.
    #[serde(default)]
    pub root_dir: Option<String>,
}

fn default_bucket() -> String {
    "workdesk".to_string()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_signed_url_ttl() -> u64 {
    3600
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            public_base_url: default_public_base_url(),
            signed_url_ttl_seconds: default_signed_url_ttl(),
            root_dir: None,
        }
    }
}
