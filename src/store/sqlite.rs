//! SQLite-backed [`RecordStore`].
//!
//! The issue list lives in a TEXT column as the exact JSON returned to
//! clients, so the stored report and the API response cannot drift apart.

use super::RecordStore;
use crate::error::StoreError;
use crate::model::{AnalysisStatus, PdfRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pdf_records (
    id                  TEXT PRIMARY KEY,
    owner_id            TEXT NOT NULL,
    file_name           TEXT NOT NULL,
    file_url            TEXT NOT NULL,
    analysis_status     TEXT NOT NULL,
    external_source_id  TEXT,
    report_url          TEXT,
    raw_report          TEXT NOT NULL,
    accessibility_score INTEGER,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pdf_records_owner ON pdf_records (owner_id);
"#;

pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Open (creating if needed) the database at `url` and apply the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        // In-memory databases are per-connection; keep exactly one, forever.
        let in_memory = url.contains(":memory:");
        let mut pool_options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool_options
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!("Record store ready at {}", url);
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<PdfRecord, StoreError> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("analysis_status")?;
    let raw_report: String = row.try_get("raw_report")?;
    let score: Option<i64> = row.try_get("accessibility_score")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let corrupt = |detail: String| StoreError::CorruptReport {
        id: id.clone(),
        detail,
    };

    Ok(PdfRecord {
        owner_id: row.try_get("owner_id")?,
        file_name: row.try_get("file_name")?,
        file_url: row.try_get("file_url")?,
        analysis_status: AnalysisStatus::from_str(&status).map_err(corrupt)?,
        external_source_id: row.try_get("external_source_id")?,
        report_url: row.try_get("report_url")?,
        raw_report: serde_json::from_str(&raw_report).map_err(|e| corrupt(e.to_string()))?,
        accessibility_score: score.map(|s| s.clamp(0, 100) as u8),
        created_at: parse_timestamp(&created_at).map_err(corrupt)?,
        updated_at: parse_timestamp(&updated_at).map_err(corrupt)?,
        id: id.clone(),
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("bad timestamp '{s}': {e}"))
}

fn report_json(record: &PdfRecord) -> Result<String, StoreError> {
    serde_json::to_string(&record.raw_report).map_err(|e| StoreError::CorruptReport {
        id: record.id.clone(),
        detail: e.to_string(),
    })
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &PdfRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO pdf_records
            (id, owner_id, file_name, file_url, analysis_status, external_source_id,
             report_url, raw_report, accessibility_score, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.file_name)
        .bind(&record.file_url)
        .bind(record.analysis_status.as_str())
        .bind(&record.external_source_id)
        .bind(&record.report_url)
        .bind(report_json(record)?)
        .bind(record.accessibility_score.map(i64::from))
        .bind(record.created_at.to_rfc3339())
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::AlreadyExists(record.id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, id: &str) -> Result<Option<PdfRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM pdf_records WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn update(&self, record: &PdfRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE pdf_records SET
                owner_id = ?, file_name = ?, file_url = ?, analysis_status = ?,
                external_source_id = ?, report_url = ?, raw_report = ?,
                accessibility_score = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.owner_id)
        .bind(&record.file_name)
        .bind(&record.file_url)
        .bind(record.analysis_status.as_str())
        .bind(&record.external_source_id)
        .bind(&record.report_url)
        .bind(report_json(record)?)
        .bind(record.accessibility_score.map(i64::from))
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing(record.id.clone()));
        }
        Ok(())
    }
}
