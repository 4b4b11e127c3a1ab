//! Service configuration loader for Workdesk.
//!
//! Reads `config.toml` from the data directory (`~/.workdesk/` by default)
//! and deserializes it into [`ServiceConfig`]. Falls back to defaults when
//! the file is missing or malformed.

use std::path::{Path, PathBuf};

use workdesk_types::config::ServiceConfig;

/// File name of the blob signing key inside the data directory.
pub const SIGNING_KEY_FILE: &str = "blob-signing.key";

/// Resolve the data directory.
///
/// Priority:
/// 1. `WORKDESK_DATA_DIR` environment variable
/// 2. `~/.workdesk`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WORKDESK_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".workdesk");
    }

    PathBuf::from(".workdesk")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: [`ServiceConfig::default()`].
/// - Unreadable or unparsable file: a warning, then the default.
pub async fn load_service_config(data_dir: &Path) -> ServiceConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ServiceConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ServiceConfig::default();
        }
    };

    match toml::from_str::<ServiceConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ServiceConfig::default()
        }
    }
}

/// Blob root: `blob.root_dir` when set, else `{data_dir}/blobs`.
pub fn blob_root(config: &ServiceConfig, data_dir: &Path) -> PathBuf {
    config
        .blob
        .root_dir
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(|| data_dir.join("blobs"))
}
