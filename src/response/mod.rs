//! Response handling module - Base64 codec, upload files and response bodies

pub mod base64;
pub mod file;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{EditOperation, EditRecord};

/// Liveness message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Acknowledgement of an age verification
#[derive(Debug, Serialize, Deserialize)]
pub struct AgeVerifyResponse {
    pub status: String,
    pub message: String,
}

/// Uploaded image, echoed back as base64
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: Uuid,
    pub filename: String,
    pub base64: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MaskResponse {
    pub mask_base64: String,
}

/// Result of one edit operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditResponse {
    pub id: Uuid,
    pub result_image_base64: String,
    pub operation_type: EditOperation,
    /// Seconds spent decoding, calling the provider and downloading
    pub processing_time: f64,
}

impl From<&EditRecord> for EditResponse {
    fn from(record: &EditRecord) -> Self {
        Self {
            id: record.id,
            result_image_base64: record.result_image_base64.clone(),
            operation_type: record.operation_type,
            processing_time: record.processing_time,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<EditRecord>,
}
