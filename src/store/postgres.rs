//! PostgreSQL implementation of the document store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use super::{AgeVerification, DocumentStore, EditOperation, EditRecord, ImageRecord};
use crate::config::DatabaseConfig;
use crate::error::{AppError, Result};

/// PostgreSQL-backed document store
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// Row type for edit history queries
#[derive(FromRow)]
struct EditRow {
    id: Uuid,
    operation_type: String,
    prompt: String,
    timestamp: DateTime<Utc>,
    result_image_base64: String,
    processing_time: f64,
}

impl TryFrom<EditRow> for EditRecord {
    type Error = AppError;

    fn try_from(row: EditRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            operation_type: EditOperation::from_str(&row.operation_type)?,
            prompt: row.prompt,
            timestamp: row.timestamp,
            result_image_base64: row.result_image_base64,
            processing_time: row.processing_time,
        })
    }
}

impl PostgresStore {
    /// Connect using the database configuration and apply migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| AppError::Store("database URL is not configured".to_string()))?;

        let mut options = PgConnectOptions::from_str(url)?;
        if let Some(name) = config.name.as_deref() {
            options = options.database(name);
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Document store connected and migrations applied");

        Ok(Self { pool })
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn insert_age_verification(&self, record: &AgeVerification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO age_verifications (verified, timestamp)
            VALUES ($1, $2)
            "#,
        )
        .bind(record.verified)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_image(&self, record: &ImageRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO images (id, filename, original_name, content_type, size, base64_data, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.filename)
        .bind(&record.original_name)
        .bind(&record.content_type)
        .bind(record.size as i64)
        .bind(&record.base64_data)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await?;

        debug!(image_id = %record.id, "Stored image record");

        Ok(())
    }

    async fn insert_edit(&self, record: &EditRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO image_edits (id, operation_type, prompt, timestamp, result_image_base64, processing_time)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(record.operation_type.as_str())
        .bind(&record.prompt)
        .bind(record.timestamp)
        .bind(&record.result_image_base64)
        .bind(record.processing_time)
        .execute(&self.pool)
        .await?;

        debug!(edit_id = %record.id, operation = %record.operation_type, "Stored edit record");

        Ok(())
    }

    async fn recent_edits(&self, limit: usize) -> Result<Vec<EditRecord>> {
        let rows: Vec<EditRow> = sqlx::query_as(
            r#"
            SELECT id, operation_type, prompt, timestamp, result_image_base64, processing_time
            FROM image_edits
            ORDER BY timestamp DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EditRecord::try_from).collect()
    }
}
