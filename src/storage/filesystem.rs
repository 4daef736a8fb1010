//! File System Document Storage
//!
//! Information Hiding:
//! - File paths and identifier encoding hidden from users
//! - Directory structure management hidden behind interface
//! - Persistence mechanism independent of storage trait users

use super::{document_id, DocumentClient, DocumentStore};
use crate::error::DocumentError;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Longest encoded segment used verbatim. Leaves room for the ".json" and
/// temp-file suffixes under the usual 255-byte file name limit.
const MAX_SEGMENT_LEN: usize = 150;
const HASHED_PREFIX_LEN: usize = 64;

/// File system backend - each document is a JSON file
/// Files are stored as {base_path}/{database}/{container}/{partition}/{id}.json
pub struct FileSystemDocumentClient {
    base_path: PathBuf,
}

impl FileSystemDocumentClient {
    pub async fn new(base_path: PathBuf) -> Result<Self, DocumentError> {
        fs::create_dir_all(&base_path).await?;
        Ok(Self { base_path })
    }
}

#[async_trait]
impl DocumentClient for FileSystemDocumentClient {
    fn container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<Arc<dyn DocumentStore>, DocumentError> {
        Ok(Arc::new(FileSystemContainer {
            root: self
                .base_path
                .join(encode_segment(database_id))
                .join(encode_segment(container_id)),
            database_id: database_id.to_string(),
            container_id: container_id.to_string(),
        }))
    }

    async fn create_container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<(), DocumentError> {
        let root = self
            .base_path
            .join(encode_segment(database_id))
            .join(encode_segment(container_id));
        fs::create_dir_all(&root).await?;
        tracing::debug!("[FileSystemStorage] Provisioned container at {:?}", root);
        Ok(())
    }
}

struct FileSystemContainer {
    root: PathBuf,
    database_id: String,
    container_id: String,
}

impl FileSystemContainer {
    fn document_path(&self, partition_key: &str, id: &str) -> PathBuf {
        self.root
            .join(encode_segment(partition_key))
            .join(format!("{}.json", encode_segment(id)))
    }

    async fn ensure_container(&self) -> Result<(), DocumentError> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(self.missing()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(self.missing()),
            Err(e) => Err(e.into()),
        }
    }

    fn missing(&self) -> DocumentError {
        DocumentError::ContainerNotFound {
            database_id: self.database_id.clone(),
            container_id: self.container_id.clone(),
        }
    }

    /// Map a file-level NotFound to either a missing document or a missing container
    async fn not_found(&self, err: std::io::Error, partition_key: &str, id: &str) -> DocumentError {
        if err.kind() != ErrorKind::NotFound {
            return err.into();
        }
        match self.ensure_container().await {
            Ok(()) => DocumentError::NotFound {
                partition_key: partition_key.to_string(),
                id: id.to_string(),
            },
            Err(e) => e,
        }
    }
}

#[async_trait]
impl DocumentStore for FileSystemContainer {
    async fn upsert(&self, partition_key: &str, document: &[u8]) -> Result<(), DocumentError> {
        let id = document_id(partition_key, document)?;
        self.ensure_container().await?;

        let path = self.document_path(partition_key, &id);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        write_replace(&path, document).await?;

        tracing::debug!(
            "[FileSystemStorage] Upserted '{}' in partition '{}' to {:?}",
            id,
            partition_key,
            path
        );
        Ok(())
    }

    async fn read(&self, partition_key: &str, id: &str) -> Result<Vec<u8>, DocumentError> {
        let path = self.document_path(partition_key, id);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(self.not_found(e, partition_key, id).await),
        }
    }

    async fn delete(&self, partition_key: &str, id: &str) -> Result<(), DocumentError> {
        let path = self.document_path(partition_key, id);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("[FileSystemStorage] Deleted {:?}", path);
                Ok(())
            }
            Err(e) => Err(self.not_found(e, partition_key, id).await),
        }
    }
}

/// Write to a sibling temp file, then rename over the target so readers
/// never observe a half-written document.
async fn write_replace(path: &Path, bytes: &[u8]) -> Result<(), DocumentError> {
    let tmp = path.with_extension(format!(
        "json.{}.{}.tmp",
        std::process::id(),
        TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::write(&tmp, bytes).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

/// Percent-encode everything outside [A-Za-z0-9_-] so any identifier is a
/// single safe path segment. Encodings longer than `MAX_SEGMENT_LEN` become
/// `{prefix}~{sha256}`; `~` never appears in a verbatim encoding.
fn encode_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }

    if out.len() <= MAX_SEGMENT_LEN {
        return out;
    }

    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{}~{:x}", &out[..HASHED_PREFIX_LEN], hasher.finalize())
}
