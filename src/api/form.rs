//! Form field extraction
//!
//! Edit endpoints take their inputs as form fields. Browsers send these as
//! `multipart/form-data`, scripts often as `application/x-www-form-urlencoded`;
//! both end up in the same [`FormFields`].

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Form,
};

use crate::error::AppError;

/// Represents a file uploaded via multipart form
#[derive(Debug, Clone)]
pub struct FileField {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Parsed form fields
#[derive(Debug, Default)]
pub struct FormFields {
    /// File field (named "file")
    file: Option<FileField>,
    /// Text fields indexed by name
    text_fields: HashMap<String, String>,
}

impl FormFields {
    pub fn from_text(text_fields: HashMap<String, String>) -> Self {
        Self {
            file: None,
            text_fields,
        }
    }

    /// Parse all fields from a multipart request
    pub async fn parse_multipart(multipart: &mut Multipart) -> Result<Self, AppError> {
        let mut fields = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if name == "file" {
                let content_type = field.content_type().map(|s| s.to_string());
                let file_name = field.file_name().map(|s| s.to_string());

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e)))?
                    .to_vec();

                fields.file = Some(FileField {
                    data,
                    content_type,
                    file_name,
                });
            } else {
                let value = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read field '{}': {}", name, e))
                })?;
                fields.text_fields.insert(name, value);
            }
        }

        Ok(fields)
    }

    /// Get the file field (required)
    pub fn require_file(&self) -> Result<&FileField, AppError> {
        self.file.as_ref().ok_or_else(|| {
            AppError::Validation("No file provided. Use 'file' field in multipart form.".to_string())
        })
    }

    /// Get a text field value, blank values included
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.text_fields.get(name).map(|s| s.as_str())
    }

    /// Get a non-blank text field value
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.get_text(name).filter(|value| !value.trim().is_empty())
    }

    /// Get a non-blank text field value, failing when it is missing
    pub fn require(&self, name: &str) -> Result<&str, AppError> {
        self.optional(name)
            .ok_or_else(|| AppError::Validation(format!("Missing required field '{}'", name)))
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("")
            .to_ascii_lowercase();

        if content_type.starts_with("multipart/form-data") {
            let mut multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            Self::parse_multipart(&mut multipart).await
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(text_fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|e| AppError::Validation(e.body_text()))?;
            Ok(Self::from_text(text_fields))
        } else {
            Err(AppError::Validation(
                "Expected a multipart/form-data or application/x-www-form-urlencoded body".to_string(),
            ))
        }
    }
}
