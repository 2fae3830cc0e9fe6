use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ServiceError, ServiceResult};
use crate::filter::DEFAULT_LOGO_KEYWORDS;

/// Service configuration, read once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_server")]
    pub server: ServerConfig,

    #[serde(default = "default_storage")]
    pub storage: StorageConfig,

    #[serde(default = "default_vision")]
    pub vision: VisionConfig,

    #[serde(default = "default_ingestion")]
    pub ingestion: IngestionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Holds the SQLite database and the `blobs/` directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Vision description service (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_vision_url")]
    pub base_url: String,

    /// Bearer token; empty means no Authorization header
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_vision_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_prompt")]
    pub prompt: String,
}

impl VisionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IngestionConfig {
    #[serde(default = "default_max_document_size")]
    pub max_document_size_bytes: u64,

    /// Description calls in flight per document. 1 processes pictures strictly in order.
    #[serde(default = "default_description_concurrency")]
    pub description_concurrency: usize,

    /// Descriptions containing any of these (case-insensitive) are discarded
    #[serde(default = "default_logo_keywords")]
    pub logo_keywords: Vec<String>,
}

/// Load configuration from the optional `config` file and `FOLIO__*` env vars
pub fn load_config() -> ServiceResult<AppConfig> {
    Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::with_prefix("FOLIO")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("ingestion.logo_keywords")
                .try_parsing(true),
        )
        .build()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to build config: {}", e),
        })?
        .try_deserialize()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to deserialize config: {}", e),
        })
}

// ==================== Default Value Functions ====================

fn default_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_port(),
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_storage() -> StorageConfig {
    StorageConfig {
        data_dir: default_data_dir(),
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

pub(crate) fn default_vision() -> VisionConfig {
    VisionConfig {
        base_url: default_vision_url(),
        api_key: String::new(),
        model: default_vision_model(),
        max_tokens: default_max_tokens(),
        request_timeout_secs: default_request_timeout_secs(),
        prompt: default_prompt(),
    }
}

fn default_vision_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_vision_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    300
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_prompt() -> String {
    "describe all objects in the picture".to_string()
}

pub(crate) fn default_ingestion() -> IngestionConfig {
    IngestionConfig {
        max_document_size_bytes: default_max_document_size(),
        description_concurrency: default_description_concurrency(),
        logo_keywords: default_logo_keywords(),
    }
}

fn default_max_document_size() -> u64 {
    100 * 1024 * 1024 // 100 MB
}

fn default_description_concurrency() -> usize {
    1
}

fn default_logo_keywords() -> Vec<String> {
    DEFAULT_LOGO_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}
