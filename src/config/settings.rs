//! Application settings and configuration management

use crate::error::{AppError, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit_mb")]
    pub body_limit_mb: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

fn default_body_limit_mb() -> usize {
    50
}

/// Hosted inference provider configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// API token; inference endpoints are disabled when absent
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_provider_url")]
    pub base_url: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_wait")]
    pub max_wait_secs: u64,
    #[serde(default)]
    pub models: ModelConfig,
}

impl ProviderConfig {
    /// The API token, if one is configured and non-blank
    pub fn token(&self) -> Option<&str> {
        self.api_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

fn default_provider_url() -> String {
    "https://api.replicate.com/v1".to_string()
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_max_wait() -> u64 {
    600
}

/// Model references (`owner/name`) used for each kind of edit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelConfig {
    #[serde(default = "default_inpainting_model")]
    pub inpainting: String,
    #[serde(default = "default_generation_model")]
    pub generation: String,
    #[serde(default = "default_instruct_model")]
    pub instruct: String,
}

fn default_inpainting_model() -> String {
    "zsxkib/flux-dev-inpainting".to_string()
}

fn default_generation_model() -> String {
    "black-forest-labs/flux-dev".to_string()
}

fn default_instruct_model() -> String {
    "timothybrooks/instruct-pix2pix".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            inpainting: default_inpainting_model(),
            generation: default_generation_model(),
            instruct: default_instruct_model(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

fn default_upload_dir() -> String {
    "uploads".to_string()
}

/// Document store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection URL; the in-memory store is used when absent
    #[serde(default)]
    pub url: Option<String>,
    /// Database name, overriding the one in the URL
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

/// CORS configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CorsConfig {
    /// Allowed origins; empty allows any origin
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Settings {
    /// Load settings from configuration files and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/default.toml")
    }

    /// Load settings from a specific configuration file path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut builder = Config::builder()
            // Start with default values
            .set_default("server.host", default_host())?
            .set_default("server.port", default_port() as i64)?
            .set_default("server.body_limit_mb", default_body_limit_mb() as i64)?
            .set_default("provider.base_url", default_provider_url())?
            .set_default("provider.poll_interval_ms", default_poll_interval() as i64)?
            .set_default("provider.max_wait_secs", default_max_wait() as i64)?
            .set_default("storage.upload_dir", default_upload_dir())?
            .set_default("database.max_connections", default_max_connections() as i64)?
            .set_default("cors.allowed_origins", Vec::<String>::new())?
            .set_default("logging.level", default_log_level())?
            .set_default("logging.format", default_log_format())?;

        // Conventional variable names, below the file and prefixed variables
        for (var, key) in [
            ("REPLICATE_API_KEY", "provider.api_token"),
            ("DATABASE_URL", "database.url"),
            ("DB_NAME", "database.name"),
        ] {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    builder = builder.set_default(key, value)?;
                }
            }
        }

        let config = builder
            // Load from configuration file
            .add_source(File::with_name(path.as_ref().to_str().unwrap_or("config/default")).required(false))
            // Override with environment variables (prefixed with IMAGE_EDITOR__)
            .add_source(
                Environment::with_prefix("IMAGE_EDITOR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Server port cannot be 0".to_string(),
            )));
        }

        if self.storage.upload_dir.trim().is_empty() {
            return Err(AppError::Config(config::ConfigError::Message(
                "Upload directory cannot be empty".to_string(),
            )));
        }

        if self.provider.poll_interval_ms == 0 {
            return Err(AppError::Config(config::ConfigError::Message(
                "Provider poll interval must be greater than 0".to_string(),
            )));
        }

        if reqwest::Url::parse(&self.provider.base_url).is_err() {
            return Err(AppError::Config(config::ConfigError::Message(format!(
                "Provider base URL '{}' is not a valid URL",
                self.provider.base_url
            ))));
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                body_limit_mb: default_body_limit_mb(),
            },
            provider: ProviderConfig {
                api_token: None,
                base_url: default_provider_url(),
                poll_interval_ms: default_poll_interval(),
                max_wait_secs: default_max_wait(),
                models: ModelConfig::default(),
            },
            storage: StorageConfig {
                upload_dir: default_upload_dir(),
            },
            database: DatabaseConfig {
                url: None,
                name: None,
                max_connections: default_max_connections(),
            },
            cors: CorsConfig::default(),
            logging: LoggingConfig {
                level: default_log_level(),
                format: default_log_format(),
            },
        }
    }
}
