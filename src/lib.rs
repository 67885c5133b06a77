//! AI image editor gateway
//!
//! Forwards image editing requests (object removal, object addition,
//! text-guided edits) to a hosted inference provider, records the outcome in a
//! document store and returns results as base64 image data.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod mask;
pub mod response;
pub mod store;

pub use error::{AppError, Result};

use std::sync::Arc;
use tracing::{error, info};

use backend::{InferenceBackend, ReplicateBackend};
use response::file::UploadDir;
use store::DocumentStore;

/// Application state shared across all handlers
pub struct AppState {
    pub settings: Arc<config::Settings>,
    /// `None` when no provider credential was configured at startup
    pub backend: Option<Arc<dyn InferenceBackend>>,
    pub store: Arc<dyn DocumentStore>,
    pub uploads: Arc<UploadDir>,
}

impl AppState {
    pub fn new(
        settings: config::Settings,
        backend: Option<Arc<dyn InferenceBackend>>,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        let uploads = Arc::new(UploadDir::new(settings.storage.upload_dir.clone()));
        Self {
            settings: Arc::new(settings),
            backend,
            store,
            uploads,
        }
    }

    /// The configured inference backend
    pub fn backend(&self) -> Result<&Arc<dyn InferenceBackend>> {
        self.backend.as_ref().ok_or_else(|| {
            AppError::NotConfigured(
                "Replicate API not configured. Please set REPLICATE_API_KEY.".to_string(),
            )
        })
    }
}

/// Build the provider backend, or `None` when it cannot be used
pub fn build_backend(settings: &config::Settings) -> Option<Arc<dyn InferenceBackend>> {
    match ReplicateBackend::new(&settings.provider) {
        Ok(backend) => {
            info!(base_url = %settings.provider.base_url, "Replicate client initialized");
            Some(Arc::new(backend))
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize Replicate client; edit endpoints are disabled");
            None
        }
    }
}

/// Connect the configured document store, falling back to memory without a database URL
pub async fn build_store(settings: &config::Settings) -> Result<Arc<dyn DocumentStore>> {
    if settings.database.url.is_some() {
        let store = store::PostgresStore::connect(&settings.database).await?;
        Ok(Arc::new(store))
    } else {
        info!("No database URL configured; using in-memory store");
        Ok(Arc::new(store::MemoryStore::new()))
    }
}
