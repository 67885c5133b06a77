//! Document store module - records and the persistence trait
//!
//! Records are written once and never updated or deleted. The only read path
//! is the edit history, newest first.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Number of records returned by the edit history
pub const HISTORY_LIMIT: usize = 50;

/// Kind of edit performed by the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditOperation {
    RemoveObject,
    AddObject,
    TextGuidedEdit,
}

impl EditOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoveObject => "remove_object",
            Self::AddObject => "add_object",
            Self::TextGuidedEdit => "text_guided_edit",
        }
    }

    /// Human readable name used in failure messages
    pub fn describe(&self) -> &'static str {
        match self {
            Self::RemoveObject => "remove object",
            Self::AddObject => "add object",
            Self::TextGuidedEdit => "perform text-guided edit",
        }
    }
}

impl fmt::Display for EditOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EditOperation {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "remove_object" => Ok(Self::RemoveObject),
            "add_object" => Ok(Self::AddObject),
            "text_guided_edit" => Ok(Self::TextGuidedEdit),
            other => Err(AppError::Store(format!("unknown operation type '{}'", other))),
        }
    }
}

/// Age verification log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgeVerification {
    pub verified: bool,
    #[serde(default = "Utc::now", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Parse an RFC 3339 timestamp; values without an offset are taken as UTC
pub fn parse_timestamp(raw: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| raw.parse::<NaiveDateTime>().map(|t| t.and_utc()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Metadata and payload of an uploaded image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub content_type: String,
    pub size: u64,
    pub base64_data: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of one successful provider call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditRecord {
    pub id: Uuid,
    pub operation_type: EditOperation,
    pub prompt: String,
    pub timestamp: DateTime<Utc>,
    pub result_image_base64: String,
    pub processing_time: f64,
}

impl EditRecord {
    pub fn new(
        operation_type: EditOperation,
        prompt: impl Into<String>,
        result_image_base64: String,
        processing_time: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation_type,
            prompt: prompt.into(),
            timestamp: Utc::now(),
            result_image_base64,
            processing_time,
        }
    }
}

/// Insert/find access to the document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Backend name, for logs
    fn name(&self) -> &str;

    async fn insert_age_verification(&self, record: &AgeVerification) -> Result<()>;

    async fn insert_image(&self, record: &ImageRecord) -> Result<()>;

    async fn insert_edit(&self, record: &EditRecord) -> Result<()>;

    /// Most recent edit records, newest first
    async fn recent_edits(&self, limit: usize) -> Result<Vec<EditRecord>>;
}
