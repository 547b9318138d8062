use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::validation::PROVIDER_MAX_UPLOAD_BYTES;
use crate::provider::types::ChunkingConfig;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Typed view of the merged `config.yml` + `secrets.yaml` tree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub server: ServerSettings,
    pub provider: ProviderSettings,
    pub upload: UploadSettings,
    pub chunking: ChunkingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
            static_dir: Some(PathBuf::from("static")),
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub request_timeout_secs: u64,
    pub upload_timeout_secs: u64,
    pub page_size: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_PROVIDER_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            request_timeout_secs: 60,
            upload_timeout_secs: 300,
            page_size: 20,
        }
    }
}

impl ProviderSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub max_upload_bytes: u64,
    pub wait_for_indexing: bool,
    pub poll_interval_secs: u64,
    pub max_poll_attempts: u32,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: PROVIDER_MAX_UPLOAD_BYTES,
            wait_for_indexing: true,
            poll_interval_secs: 5,
            max_poll_attempts: 60,
        }
    }
}

impl UploadSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
