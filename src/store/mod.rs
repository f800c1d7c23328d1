//! Metadata store: one [`PdfRecord`] row per uploaded file.
//!
//! Updates are last-write-wins on the whole row; there is no optimistic
//! concurrency token. Every read on behalf of a caller goes through
//! [`load_owned`], which hides records the caller does not own.

pub mod sqlite;

use crate::error::{ApiError, StoreError};
use crate::model::PdfRecord;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub use sqlite::SqliteRecordStore;

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(&self, record: &PdfRecord) -> Result<(), StoreError>;
    async fn get(&self, id: &str) -> Result<Option<PdfRecord>, StoreError>;
    /// Overwrite the stored row. The record must already exist.
    async fn update(&self, record: &PdfRecord) -> Result<(), StoreError>;
}

/// Load a record on behalf of `owner_id`.
///
/// A record owned by someone else is reported exactly like a missing one so
/// callers cannot probe for other users' ids.
pub async fn load_owned(
    store: &dyn RecordStore,
    pdf_id: &str,
    owner_id: &str,
) -> Result<PdfRecord, ApiError> {
    match store.get(pdf_id).await? {
        Some(record) if record.is_owned_by(owner_id) => Ok(record),
        _ => Err(ApiError::NotFound(format!("PDF '{pdf_id}'"))),
    }
}

/// Stamp `updated_at` and persist.
pub async fn save(store: &dyn RecordStore, record: &mut PdfRecord) -> Result<(), StoreError> {
    record.updated_at = Utc::now();
    store.update(record).await
}

/// In-process store for tests and single-node development.
#[derive(Default)]
pub struct MemoryRecordStore {
    rows: RwLock<HashMap<String, PdfRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &PdfRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id.clone()));
        }
        rows.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PdfRecord>, StoreError> {
        Ok(self.rows.read().await.get(id).cloned())
    }

    async fn update(&self, record: &PdfRecord) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&record.id) {
            Some(row) => {
                *row = record.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(record.id.clone())),
        }
    }
}
