//! Document Storage Abstraction
//!
//! Information Hiding:
//! - Backend implementation details hidden behind the client/store traits
//! - Allows swapping between memory, filesystem and SQLite without API changes
//! - Each backend encapsulates its own addressing, layout and I/O

use crate::config::{BackendKind, StorageConfig};
use crate::error::DocumentError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

pub mod filesystem;
pub mod memory;
pub mod sqlite;

/// Entry point of a backend. Hands out container handles.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Resolve a handle for a container. Local only: never touches storage,
    /// so it succeeds for containers that do not exist yet.
    fn container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<Arc<dyn DocumentStore>, DocumentError>;

    /// Provision a container. Idempotent.
    async fn create_container(&self, database_id: &str, container_id: &str)
        -> Result<(), DocumentError>;
}

/// Partitioned point storage for documents inside one container
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or fully replace a document. The id and partition key are
    /// embedded in the payload.
    async fn upsert(&self, partition_key: &str, document: &[u8]) -> Result<(), DocumentError>;

    /// Point read. `DocumentError::NotFound` if absent.
    async fn read(&self, partition_key: &str, id: &str) -> Result<Vec<u8>, DocumentError>;

    /// Point delete. `DocumentError::NotFound` if absent.
    async fn delete(&self, partition_key: &str, id: &str) -> Result<(), DocumentError>;
}

#[derive(Deserialize)]
struct DocumentKey {
    id: Option<String>,
    userid: Option<String>,
}

/// Pull the document id out of an upsert payload and check it belongs to
/// `partition_key`.
pub(crate) fn document_id(partition_key: &str, document: &[u8]) -> Result<String, DocumentError> {
    let key: DocumentKey = serde_json::from_slice(document)?;

    let id = match key.id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(DocumentError::MalformedDocument("missing 'id'".to_string())),
    };

    match key.userid {
        Some(userid) if userid == partition_key => Ok(id),
        Some(userid) => Err(DocumentError::PartitionKeyMismatch {
            expected: partition_key.to_string(),
            actual: userid,
        }),
        None => Err(DocumentError::MalformedDocument("missing 'userid'".to_string())),
    }
}

/// Build the configured backend and, if asked to, provision its container
pub async fn connect(config: &StorageConfig) -> Result<Arc<dyn DocumentClient>> {
    let client: Arc<dyn DocumentClient> = match config.backend {
        BackendKind::Memory => Arc::new(memory::InMemoryDocumentClient::new()),
        BackendKind::Filesystem => Arc::new(
            filesystem::FileSystemDocumentClient::new(config.path.clone())
                .await
                .context("Failed to open filesystem document store")?,
        ),
        BackendKind::Sqlite => Arc::new(
            sqlite::SqliteDocumentClient::open(&config.path)
                .await
                .context(format!("Failed to open SQLite document store: {:?}", config.path))?,
        ),
    };

    if config.create_if_missing {
        client
            .create_container(&config.database_id, &config.container_id)
            .await
            .context(format!(
                "Failed to provision container '{}/{}'",
                config.database_id, config.container_id
            ))?;
    }

    tracing::info!(
        "[storage] Connected {:?} backend for '{}/{}'",
        config.backend,
        config.database_id,
        config.container_id
    );
    Ok(client)
}
