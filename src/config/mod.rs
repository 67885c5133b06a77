//! Configuration module - settings loaded from files and environment

pub mod settings;

pub use settings::{
    CorsConfig, DatabaseConfig, LoggingConfig, ModelConfig, ProviderConfig, ServerConfig, Settings,
    StorageConfig,
};
