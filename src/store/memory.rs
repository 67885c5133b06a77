//! In-memory document store
//!
//! Used when no database is configured, and by tests.

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{AgeVerification, DocumentStore, EditRecord, ImageRecord};
use crate::error::Result;

#[derive(Default)]
pub struct MemoryStore {
    age_verifications: RwLock<Vec<AgeVerification>>,
    images: RwLock<Vec<ImageRecord>>,
    edits: RwLock<Vec<EditRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn age_verifications(&self) -> Vec<AgeVerification> {
        self.age_verifications.read().clone()
    }

    pub fn images(&self) -> Vec<ImageRecord> {
        self.images.read().clone()
    }

    pub fn edit_count(&self) -> usize {
        self.edits.read().len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn insert_age_verification(&self, record: &AgeVerification) -> Result<()> {
        self.age_verifications.write().push(record.clone());
        Ok(())
    }

    async fn insert_image(&self, record: &ImageRecord) -> Result<()> {
        self.images.write().push(record.clone());
        Ok(())
    }

    async fn insert_edit(&self, record: &EditRecord) -> Result<()> {
        self.edits.write().push(record.clone());
        Ok(())
    }

    async fn recent_edits(&self, limit: usize) -> Result<Vec<EditRecord>> {
        let mut edits = self.edits.read().clone();
        edits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        edits.truncate(limit);
        Ok(edits)
    }
}
