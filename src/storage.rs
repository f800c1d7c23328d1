//! Object storage for PDF bytes.
//!
//! A record's `fileUrl` is a key into an [`ObjectStore`]. Each successful fix
//! writes a new key; old variants are kept so earlier versions remain
//! downloadable.

use crate::error::StorageError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Build the key for a file owned by `owner` and belonging to record `pdf_id`.
pub fn object_key(owner: &str, pdf_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", sanitise_segment(owner), pdf_id, sanitise_segment(file_name))
}

fn sanitise_segment(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// Keys are relative paths with no `..`, root, or prefix components.
fn validate_key(key: &str) -> Result<(), StorageError> {
    let path = Path::new(key);
    let ok = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// Filesystem backend rooted at a base directory.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

fn io_err(key: &str, source: std::io::Error) -> StorageError {
    if source.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.full_path(key)?;
        debug!(key, size = bytes.len(), "storage: put");

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(key, e))?;
        }

        // Atomic write: temp file + rename
        let tmp = path.with_extension("part");
        tokio::fs::write(&tmp, bytes).await.map_err(|e| io_err(key, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            warn!(key, error = %e, "storage: rename failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(key, e));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.full_path(key)?;
        tokio::fs::read(&path).await.map_err(|e| io_err(key, e))
    }
}

/// In-process backend for tests and single-node development.
#[derive(Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        self.objects
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        validate_key(key)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}
