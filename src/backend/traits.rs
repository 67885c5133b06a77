//! Common traits and types for inference backends

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::ModelConfig;
use crate::error::Result;

/// Fixed hyperparameters sent with each kind of edit
#[derive(Debug, Clone, PartialEq)]
pub struct EditParameters {
    /// How far the result may drift from the source image
    pub strength: Option<f32>,

    /// Guidance scale / CFG scale
    pub guidance_scale: f32,

    /// How closely an instruct model follows the source image
    pub image_guidance_scale: Option<f32>,

    /// Number of inference steps
    pub num_inference_steps: u32,
}

/// One model invocation. Image and mask live in scratch files owned by the caller.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Model reference, `owner/name` or `owner/name:version`
    pub model: String,

    pub image: PathBuf,

    pub mask: Option<PathBuf>,

    pub prompt: String,

    /// Negative prompt (things to avoid)
    pub negative_prompt: Option<String>,

    pub params: EditParameters,
}

impl InferenceRequest {
    /// Inpaint the masked region away
    pub fn remove_object(models: &ModelConfig, image: &Path, mask: &Path, prompt: &str) -> Self {
        Self {
            model: models.inpainting.clone(),
            image: image.to_path_buf(),
            mask: Some(mask.to_path_buf()),
            prompt: prompt.to_string(),
            negative_prompt: None,
            params: EditParameters {
                strength: Some(0.95),
                guidance_scale: 7.5,
                image_guidance_scale: None,
                num_inference_steps: 50,
            },
        }
    }

    /// Inpaint when a mask is given, otherwise run image-to-image generation
    pub fn add_object(models: &ModelConfig, image: &Path, mask: Option<&Path>, prompt: &str) -> Self {
        let model = match mask {
            Some(_) => models.inpainting.clone(),
            None => models.generation.clone(),
        };

        Self {
            model,
            image: image.to_path_buf(),
            mask: mask.map(Path::to_path_buf),
            prompt: prompt.to_string(),
            negative_prompt: None,
            params: EditParameters {
                strength: Some(0.7),
                guidance_scale: 7.5,
                image_guidance_scale: None,
                num_inference_steps: 50,
            },
        }
    }

    /// Instruction-driven edit of the whole image
    pub fn text_guided_edit(
        models: &ModelConfig,
        image: &Path,
        prompt: &str,
        negative_prompt: Option<&str>,
    ) -> Self {
        Self {
            model: models.instruct.clone(),
            image: image.to_path_buf(),
            mask: None,
            prompt: prompt.to_string(),
            negative_prompt: negative_prompt.map(str::to_string),
            params: EditParameters {
                strength: None,
                guidance_scale: 7.5,
                image_guidance_scale: Some(1.2),
                num_inference_steps: 50,
            },
        }
    }
}

/// Trait for hosted inference backends
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Get the backend name
    fn name(&self) -> &str;

    /// Run the model and return the URL of the produced image
    async fn predict(&self, request: &InferenceRequest) -> Result<String>;

    /// Fetch the bytes behind a result URL
    async fn download(&self, url: &str) -> Result<Vec<u8>>;

    /// Run the model and download its result
    async fn edit(&self, request: &InferenceRequest) -> Result<Vec<u8>> {
        let url = self.predict(request).await?;
        self.download(&url).await
    }
}
