//! HTTP endpoint handlers

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::api::form::FormFields;
use crate::backend::InferenceRequest;
use crate::error::{AppError, Result};
use crate::mask;
use crate::response::{
    base64, file::upload_extension, AgeVerifyResponse, EditResponse, HistoryResponse, MaskResponse,
    MessageResponse, UploadResponse,
};
use crate::store::{AgeVerification, EditOperation, EditRecord, ImageRecord, HISTORY_LIMIT};
use crate::AppState;

const DEFAULT_REMOVE_PROMPT: &str = "remove the selected object";
const DEFAULT_NEGATIVE_PROMPT: &str = "blurry, low quality";

/// Liveness check
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "AI Image Editor API - Ready to process images!".to_string(),
    })
}

/// Record an age verification
pub async fn age_verify(
    State(state): State<Arc<AppState>>,
    payload: std::result::Result<Json<AgeVerification>, JsonRejection>,
) -> Result<Json<AgeVerifyResponse>> {
    let Json(verification) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    state.store.insert_age_verification(&verification).await?;
    info!(verified = verification.verified, "Age verification recorded");

    Ok(Json(AgeVerifyResponse {
        status: "verified".to_string(),
        message: "Age verification completed".to_string(),
    }))
}

/// Store an uploaded image and echo it back as base64
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    fields: FormFields,
) -> Result<Json<UploadResponse>> {
    let file = fields.require_file()?;

    let content_type = file.content_type.clone().unwrap_or_default();
    if !content_type.starts_with("image/") {
        return Err(AppError::Validation("File must be an image".to_string()));
    }

    let id = Uuid::new_v4();
    let original_name = file.file_name.clone().unwrap_or_default();
    let filename = format!("{}.{}", id, upload_extension(&original_name));

    state.uploads.save(&filename, &file.data).await?;

    let encoded = base64::encode(&file.data);
    let size = file.data.len() as u64;

    let record = ImageRecord {
        id,
        filename: filename.clone(),
        original_name,
        content_type,
        size,
        base64_data: encoded.clone(),
        timestamp: Utc::now(),
    };
    state.store.insert_image(&record).await?;

    info!(image_id = %id, size = size, "Image uploaded");

    Ok(Json(UploadResponse {
        id,
        filename,
        base64: encoded,
        size,
    }))
}

/// Rasterize user-drawn rectangles into a mask matching the image size
pub async fn create_mask(fields: FormFields) -> Result<Json<MaskResponse>> {
    let image_base64 = fields.require("image_base64")?;
    let mask_data = fields.require("mask_data")?;

    build_mask(image_base64, mask_data)
        .map(|mask_base64| Json(MaskResponse { mask_base64 }))
        .map_err(|e| e.during("create mask"))
}

fn build_mask(image_base64: &str, mask_data: &str) -> Result<String> {
    let image = base64::decode(image_base64)?;
    let rects = mask::parse_mask_data(mask_data)?;
    let png = mask::create_mask(&image, &rects)?;
    Ok(base64::encode(&png))
}

/// Remove the masked object by inpainting
pub async fn remove_object(
    State(state): State<Arc<AppState>>,
    fields: FormFields,
) -> Result<Json<EditResponse>> {
    let job = EditJob {
        operation: EditOperation::RemoveObject,
        image_base64: fields.require("image_base64")?,
        mask_base64: Some(fields.require("mask_base64")?),
        prompt: fields.optional("prompt").unwrap_or(DEFAULT_REMOVE_PROMPT),
        negative_prompt: None,
    };

    job.run(&state).await.map(Json)
}

/// Add an object, inpainting when a mask is given
pub async fn add_object(
    State(state): State<Arc<AppState>>,
    fields: FormFields,
) -> Result<Json<EditResponse>> {
    let job = EditJob {
        operation: EditOperation::AddObject,
        image_base64: fields.require("image_base64")?,
        mask_base64: fields.optional("mask_base64"),
        prompt: fields.require("prompt")?,
        negative_prompt: None,
    };

    job.run(&state).await.map(Json)
}

/// Edit the whole image following a text instruction
pub async fn text_guided_edit(
    State(state): State<Arc<AppState>>,
    fields: FormFields,
) -> Result<Json<EditResponse>> {
    let job = EditJob {
        operation: EditOperation::TextGuidedEdit,
        image_base64: fields.require("image_base64")?,
        mask_base64: None,
        prompt: fields.require("prompt")?,
        negative_prompt: Some(fields.optional("negative_prompt").unwrap_or(DEFAULT_NEGATIVE_PROMPT)),
    };

    job.run(&state).await.map(Json)
}

/// Most recent edits, newest first
pub async fn edit_history(State(state): State<Arc<AppState>>) -> Result<Json<HistoryResponse>> {
    let history = state.store.recent_edits(HISTORY_LIMIT).await?;
    Ok(Json(HistoryResponse { history }))
}

/// Validated inputs of one edit request
struct EditJob<'a> {
    operation: EditOperation,
    image_base64: &'a str,
    mask_base64: Option<&'a str>,
    prompt: &'a str,
    negative_prompt: Option<&'a str>,
}

impl EditJob<'_> {
    async fn run(self, state: &AppState) -> Result<EditResponse> {
        let operation = self.operation;
        // Checked before anything touches the disk or the network
        let backend = state.backend()?;

        self.execute(state, backend.as_ref())
            .await
            .map_err(|e| e.during(operation.describe()))
    }

    async fn execute(
        self,
        state: &AppState,
        backend: &dyn crate::backend::InferenceBackend,
    ) -> Result<EditResponse> {
        let started = Instant::now();

        let image = base64::decode(self.image_base64)?;
        let mask = self.mask_base64.map(base64::decode).transpose()?;

        // Scratch files are removed when these guards drop, on every path
        let image_file = state.uploads.scratch("image", &image).await?;
        let mask_file = match &mask {
            Some(bytes) => Some(state.uploads.scratch("mask", bytes).await?),
            None => None,
        };
        let mask_path = mask_file.as_ref().map(|file| file.path());

        let models = &state.settings.provider.models;
        let request = match (self.operation, mask_path) {
            (EditOperation::RemoveObject, Some(mask_path)) => {
                InferenceRequest::remove_object(models, image_file.path(), mask_path, self.prompt)
            }
            (EditOperation::RemoveObject, None) => {
                return Err(AppError::Validation("Missing required field 'mask_base64'".to_string()));
            }
            (EditOperation::AddObject, mask_path) => {
                InferenceRequest::add_object(models, image_file.path(), mask_path, self.prompt)
            }
            (EditOperation::TextGuidedEdit, _) => InferenceRequest::text_guided_edit(
                models,
                image_file.path(),
                self.prompt,
                self.negative_prompt,
            ),
        };

        let result = backend.edit(&request).await?;
        let processing_time = started.elapsed().as_secs_f64();

        let record = EditRecord::new(
            self.operation,
            self.prompt,
            base64::encode(&result),
            processing_time,
        );
        state.store.insert_edit(&record).await?;

        info!(
            edit_id = %record.id,
            operation = %record.operation_type,
            backend = backend.name(),
            model = %request.model,
            processing_time = processing_time,
            "Edit completed"
        );

        Ok(EditResponse::from(&record))
    }
}
