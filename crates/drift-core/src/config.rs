use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{DriftError, DriftResult, MAX_FILE_SIZE};

/// Top-level client configuration (loaded from drift.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub server: ServerConfig,
    pub upload: UploadConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the share API (default: http://localhost:8080/api)
    pub api_url: String,
    /// Base URL that shareable links are rendered against
    pub share_url: String,
    /// Refuse plaintext HTTP API endpoints
    pub enforce_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Hours until the server expires the upload (default: 24)
    pub expiration_hours: u32,
    /// Number of downloads the server allows (default: 1)
    pub download_limit: u32,
    /// Request multipart transfer for payloads at or above the part size
    pub multipart: bool,
    /// Plaintext size ceiling in bytes (default: 1 GiB)
    pub max_file_size: u64,
    /// Interval of the coarse single-shot progress estimate
    pub progress_tick_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8080/api".into(),
            share_url: "http://localhost:5173".into(),
            enforce_tls: false,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            expiration_hours: 24,
            download_limit: 1,
            multipart: true,
            max_file_size: MAX_FILE_SIZE,
            progress_tick_ms: 300,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl DriftConfig {
    /// Load a config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> DriftResult<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: DriftConfig = toml::from_str(&content)
            .map_err(|e| DriftError::Config(format!("parsing {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DriftResult<()> {
        for (name, value) in [
            ("server.api_url", &self.server.api_url),
            ("server.share_url", &self.server.share_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| DriftError::Config(format!("{name} is not a URL ({value}): {e}")))?;
        }
        if self.upload.expiration_hours == 0 {
            return Err(DriftError::Config(
                "upload.expiration_hours must be at least 1".into(),
            ));
        }
        if self.upload.download_limit == 0 {
            return Err(DriftError::Config(
                "upload.download_limit must be at least 1".into(),
            ));
        }
        if self.upload.max_file_size == 0 {
            return Err(DriftError::Config(
                "upload.max_file_size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
