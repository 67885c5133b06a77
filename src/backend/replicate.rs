//! Replicate predictions API client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::backend::traits::{InferenceBackend, InferenceRequest};
use crate::config::ProviderConfig;
use crate::error::{AppError, Result};
use crate::response::{base64, file::detect_image_format};

/// Backend running models on Replicate
pub struct ReplicateBackend {
    client: Client,
    base_url: String,
    api_token: String,
    poll_interval: Duration,
    max_wait: Duration,
}

/// Prediction creation body
#[derive(Debug, Serialize)]
struct CreatePrediction {
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    input: PredictionInput,
}

#[derive(Debug, Serialize)]
struct PredictionInput {
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    mask: Option<String>,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strength: Option<f32>,
    guidance_scale: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_guidance_scale: Option<f32>,
    num_inference_steps: u32,
}

/// Prediction state as returned by the API
#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    #[serde(default)]
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }
}

impl ReplicateBackend {
    /// Create a new backend from the provider configuration
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let api_token = config
            .token()
            .ok_or_else(|| AppError::NotConfigured("Replicate API token is not set".to_string()))?
            .to_string();

        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            max_wait: Duration::from_secs(config.max_wait_secs),
        })
    }

    /// Endpoint and optional version for a model reference
    fn prediction_target(&self, model: &str) -> (String, Option<String>) {
        match model.split_once(':') {
            Some((_, version)) => (format!("{}/predictions", self.base_url), Some(version.to_string())),
            None => (format!("{}/models/{}/predictions", self.base_url, model), None),
        }
    }

    async fn build_input(&self, request: &InferenceRequest) -> Result<PredictionInput> {
        let mask = match &request.mask {
            Some(path) => Some(read_data_url(path).await?),
            None => None,
        };

        let image = read_data_url(&request.image).await?;
        debug!(
            image_bytes = image.len(),
            mask_bytes = mask.as_ref().map_or(0, String::len),
            "Inlined prediction inputs as data URLs"
        );

        Ok(PredictionInput {
            image,
            mask,
            prompt: request.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            strength: request.params.strength,
            guidance_scale: request.params.guidance_scale,
            image_guidance_scale: request.params.image_guidance_scale,
            num_inference_steps: request.params.num_inference_steps,
        })
    }

    async fn create(&self, request: &InferenceRequest) -> Result<Prediction> {
        let (url, version) = self.prediction_target(&request.model);
        let body = CreatePrediction {
            version,
            input: self.build_input(request).await?,
        };

        debug!(model = %request.model, url = %url, "Creating prediction");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        response
            .json::<Prediction>()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse prediction: {}", e)))
    }

    async fn refresh(&self, prediction: &Prediction) -> Result<Prediction> {
        let url = prediction
            .urls
            .as_ref()
            .and_then(|urls| urls.get.clone())
            .unwrap_or_else(|| format!("{}/predictions/{}", self.base_url, prediction.id));

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        let response = ensure_success(response).await?;
        response
            .json::<Prediction>()
            .await
            .map_err(|e| AppError::Provider(format!("Failed to parse prediction: {}", e)))
    }
}

#[async_trait]
impl InferenceBackend for ReplicateBackend {
    fn name(&self) -> &str {
        "replicate"
    }

    async fn predict(&self, request: &InferenceRequest) -> Result<String> {
        let started = Instant::now();
        let mut prediction = self.create(request).await?;

        while !prediction.is_terminal() {
            if started.elapsed() >= self.max_wait {
                warn!(prediction = %prediction.id, status = %prediction.status, "Prediction did not finish in time");
                return Err(AppError::Provider(format!(
                    "Prediction {} still '{}' after {}s",
                    prediction.id,
                    prediction.status,
                    self.max_wait.as_secs()
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
            prediction = self.refresh(&prediction).await?;
            debug!(prediction = %prediction.id, status = %prediction.status, "Polled prediction");
        }

        if prediction.status != "succeeded" {
            let reason = match &prediction.error {
                Some(Value::String(message)) => message.clone(),
                Some(other) if !other.is_null() => other.to_string(),
                _ => "no error message".to_string(),
            };
            return Err(AppError::Provider(format!(
                "Prediction {} {}: {}",
                prediction.id, prediction.status, reason
            )));
        }

        let url = first_output_url(&prediction.output)?;
        debug!(
            prediction = %prediction.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prediction succeeded"
        );
        Ok(url)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;

        debug!(url = %url, size = bytes.len(), "Downloaded result image");

        Ok(bytes.to_vec())
    }
}

/// Normalize a prediction output: a single URL, or the first of a list
pub fn first_output_url(output: &Value) -> Result<String> {
    match output {
        Value::String(url) => Ok(url.clone()),
        Value::Array(items) => match items.first() {
            Some(Value::String(url)) => Ok(url.clone()),
            _ => Err(AppError::Provider(
                "Prediction output list does not start with a URL".to_string(),
            )),
        },
        Value::Null => Err(AppError::Provider("Prediction returned no output".to_string())),
        other => Err(AppError::Provider(format!(
            "Unexpected prediction output: {}",
            other
        ))),
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AppError::Provider(format!("Replicate returned {}: {}", status, body)))
}

async fn read_data_url(path: &Path) -> Result<String> {
    let data = tokio::fs::read(path).await?;
    let format = detect_image_format(&data).unwrap_or("png");
    Ok(base64::create_data_url(&data, format))
}
