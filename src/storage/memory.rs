//! In-Memory Document Storage
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via RwLock hidden behind async interface
//! - Suitable for testing and ephemeral sessions

use super::{document_id, DocumentClient, DocumentStore};
use crate::error::DocumentError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type ContainerKey = (String, String);
type Documents = HashMap<(String, String), Vec<u8>>;

/// In-memory backend. Data is lost when the process terminates.
/// Cloning shares the same underlying containers.
#[derive(Clone, Default)]
pub struct InMemoryDocumentClient {
    containers: Arc<RwLock<HashMap<ContainerKey, Documents>>>,
}

impl InMemoryDocumentClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentClient for InMemoryDocumentClient {
    fn container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<Arc<dyn DocumentStore>, DocumentError> {
        Ok(Arc::new(InMemoryContainer {
            containers: Arc::clone(&self.containers),
            key: (database_id.to_string(), container_id.to_string()),
        }))
    }

    async fn create_container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<(), DocumentError> {
        let mut containers = self.containers.write().await;
        containers
            .entry((database_id.to_string(), container_id.to_string()))
            .or_default();
        tracing::debug!(
            "[InMemoryStorage] Provisioned container '{}/{}'",
            database_id,
            container_id
        );
        Ok(())
    }
}

/// Handle onto one container. The container is looked up on every call.
struct InMemoryContainer {
    containers: Arc<RwLock<HashMap<ContainerKey, Documents>>>,
    key: ContainerKey,
}

impl InMemoryContainer {
    fn missing(&self) -> DocumentError {
        DocumentError::ContainerNotFound {
            database_id: self.key.0.clone(),
            container_id: self.key.1.clone(),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryContainer {
    async fn upsert(&self, partition_key: &str, document: &[u8]) -> Result<(), DocumentError> {
        let id = document_id(partition_key, document)?;
        let mut containers = self.containers.write().await;
        let docs = containers.get_mut(&self.key).ok_or_else(|| self.missing())?;
        docs.insert((partition_key.to_string(), id.clone()), document.to_vec());
        tracing::debug!(
            "[InMemoryStorage] Upserted '{}' in partition '{}' ({} bytes)",
            id,
            partition_key,
            document.len()
        );
        Ok(())
    }

    async fn read(&self, partition_key: &str, id: &str) -> Result<Vec<u8>, DocumentError> {
        let containers = self.containers.read().await;
        let docs = containers.get(&self.key).ok_or_else(|| self.missing())?;
        docs.get(&(partition_key.to_string(), id.to_string()))
            .cloned()
            .ok_or_else(|| DocumentError::NotFound {
                partition_key: partition_key.to_string(),
                id: id.to_string(),
            })
    }

    async fn delete(&self, partition_key: &str, id: &str) -> Result<(), DocumentError> {
        let mut containers = self.containers.write().await;
        let docs = containers.get_mut(&self.key).ok_or_else(|| self.missing())?;
        match docs.remove(&(partition_key.to_string(), id.to_string())) {
            Some(_) => {
                tracing::debug!("[InMemoryStorage] Deleted '{}' in partition '{}'", id, partition_key);
                Ok(())
            }
            None => Err(DocumentError::NotFound {
                partition_key: partition_key.to_string(),
                id: id.to_string(),
            }),
        }
    }
}
