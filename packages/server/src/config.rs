use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub max_age: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors: CorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

fn default_token_ttl_hours() -> i64 {
    24 * 7
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    /// When set, principals need at least one verified email address to pass
    /// the verified-email gate.
    pub email_required: bool,
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            email_required: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub blob_dir: PathBuf,
    /// Largest single blob accepted, in bytes.
    pub max_blob_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_dir: PathBuf::from("./data/blobs"),
            max_blob_size: 256 * 1024 * 1024,
        }
    }
}

/// Limits applied while unpacking a challenge bundle.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ImportConfig {
    pub max_upload_size: usize,
    pub max_file_size: u64,
    pub max_total_size: u64,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 128 * 1024 * 1024,
            max_file_size: 256 * 1024 * 1024,
            max_total_size: 1024 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Deployment name embedded in every challenge queue name.
    pub environment: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            environment: "dev".into(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub queue: QueueConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.cors.allow_origins", Vec::<String>::new())?
            .set_default("server.cors.max_age", 3600)?
            .set_default("account.email_required", true)?
            .set_default("storage.blob_dir", "./data/blobs")?
            .set_default("storage.max_blob_size", 256 * 1024 * 1024)?
            .set_default("queue.environment", "dev")?
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., PODIUM__AUTH__JWT_SECRET)
            .add_source(Environment::with_prefix("PODIUM").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
