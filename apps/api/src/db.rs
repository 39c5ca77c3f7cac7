use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::MatchResult;

/// Creates a PostgreSQL connection pool and applies pending migrations.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// A persisted match. Serializes with the stored payload under `result`.
#[derive(Debug, FromRow, Serialize)]
pub struct MatchResultRow {
    pub id: Uuid,
    pub resume_id: String,
    pub job_id: String,
    pub overall_score: i32,
    pub recommendation: String,
    #[serde(rename = "result")]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Stores a finished match. The full result is kept as JSONB; the scalar
/// columns are there for listing and filtering.
pub async fn insert_match_result(db: &PgPool, result: &MatchResult) -> Result<Uuid, sqlx::Error> {
    let payload = serde_json::to_value(result).map_err(|e| sqlx::Error::Encode(Box::new(e)))?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO match_results
            (id, resume_id, job_id, overall_score, recommendation, payload, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&result.resume_id)
    .bind(&result.job_id)
    .bind(result.overall_score as i32)
    .bind(result.recommendation.label())
    .bind(payload)
    .bind(result.timestamp)
    .fetch_one(db)
    .await?;

    Ok(id)
}

pub async fn fetch_match_result(db: &PgPool, id: Uuid) -> Result<Option<MatchResultRow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM match_results WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}
