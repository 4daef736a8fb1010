//! SQLite Document Storage
//!
//! Information Hiding:
//! - Table layout and SQL hidden behind the document traits
//! - Blocking rusqlite calls moved off the async runtime
//! - One connection shared by every container handle

use super::{document_id, DocumentClient, DocumentStore};
use crate::error::DocumentError;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS containers (
    database_id TEXT NOT NULL,
    container_id TEXT NOT NULL,
    PRIMARY KEY (database_id, container_id)
);
CREATE TABLE IF NOT EXISTS documents (
    database_id TEXT NOT NULL,
    container_id TEXT NOT NULL,
    partition_key TEXT NOT NULL,
    id TEXT NOT NULL,
    body BLOB NOT NULL,
    PRIMARY KEY (database_id, container_id, partition_key, id)
);
"#;

/// SQLite backend. Cloning shares the same connection.
#[derive(Clone)]
pub struct SqliteDocumentClient {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDocumentClient {
    /// Open or create a database file at the given path
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref().to_path_buf();
        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, DocumentError> {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let conn = Connection::open(&path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Private in-memory database (useful for testing)
    pub fn in_memory() -> Result<Self, DocumentError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

/// Run a closure against the shared connection on the blocking pool
async fn with_conn<T, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T, DocumentError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, DocumentError> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let guard = conn.lock().map_err(|_| DocumentError::LockPoisoned)?;
        f(&guard)
    })
    .await?
}

fn container_exists(conn: &Connection, database_id: &str, container_id: &str) -> rusqlite::Result<bool> {
    conn.prepare_cached("SELECT 1 FROM containers WHERE database_id = ?1 AND container_id = ?2")?
        .exists(params![database_id, container_id])
}

#[async_trait]
impl DocumentClient for SqliteDocumentClient {
    fn container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<Arc<dyn DocumentStore>, DocumentError> {
        Ok(Arc::new(SqliteContainer {
            conn: Arc::clone(&self.conn),
            database_id: database_id.to_string(),
            container_id: container_id.to_string(),
        }))
    }

    async fn create_container(
        &self,
        database_id: &str,
        container_id: &str,
    ) -> Result<(), DocumentError> {
        let (db, container) = (database_id.to_string(), container_id.to_string());
        with_conn(&self.conn, move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO containers (database_id, container_id) VALUES (?1, ?2)",
                params![db, container],
            )?;
            Ok(())
        })
        .await?;
        tracing::debug!(
            "[SqliteStorage] Provisioned container '{}/{}'",
            database_id,
            container_id
        );
        Ok(())
    }
}

struct SqliteContainer {
    conn: Arc<Mutex<Connection>>,
    database_id: String,
    container_id: String,
}

impl SqliteContainer {
    fn missing(database_id: String, container_id: String) -> DocumentError {
        DocumentError::ContainerNotFound {
            database_id,
            container_id,
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteContainer {
    async fn upsert(&self, partition_key: &str, document: &[u8]) -> Result<(), DocumentError> {
        let id = document_id(partition_key, document)?;
        let (db, container) = (self.database_id.clone(), self.container_id.clone());
        let (pk, body, doc_id) = (partition_key.to_string(), document.to_vec(), id.clone());

        with_conn(&self.conn, move |conn| {
            if !container_exists(conn, &db, &container)? {
                return Err(Self::missing(db, container));
            }
            conn.execute(
                "INSERT INTO documents (database_id, container_id, partition_key, id, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (database_id, container_id, partition_key, id)
                 DO UPDATE SET body = excluded.body",
                params![db, container, pk, doc_id, body],
            )?;
            Ok(())
        })
        .await?;

        tracing::debug!(
            "[SqliteStorage] Upserted '{}' in partition '{}' ({} bytes)",
            id,
            partition_key,
            document.len()
        );
        Ok(())
    }

    async fn read(&self, partition_key: &str, id: &str) -> Result<Vec<u8>, DocumentError> {
        let (db, container) = (self.database_id.clone(), self.container_id.clone());
        let (pk, doc_id) = (partition_key.to_string(), id.to_string());

        with_conn(&self.conn, move |conn| {
            if !container_exists(conn, &db, &container)? {
                return Err(Self::missing(db, container));
            }
            let body: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT body FROM documents
                     WHERE database_id = ?1 AND container_id = ?2 AND partition_key = ?3 AND id = ?4",
                    params![db, container, pk, doc_id],
                    |row| row.get(0),
                )
                .optional()?;
            body.ok_or(DocumentError::NotFound {
                partition_key: pk,
                id: doc_id,
            })
        })
        .await
    }

    async fn delete(&self, partition_key: &str, id: &str) -> Result<(), DocumentError> {
        let (db, container) = (self.database_id.clone(), self.container_id.clone());
        let (pk, doc_id) = (partition_key.to_string(), id.to_string());

        with_conn(&self.conn, move |conn| {
            if !container_exists(conn, &db, &container)? {
                return Err(Self::missing(db, container));
            }
            let rows = conn.execute(
                "DELETE FROM documents
                 WHERE database_id = ?1 AND container_id = ?2 AND partition_key = ?3 AND id = ?4",
                params![db, container, pk, doc_id],
            )?;
            if rows == 0 {
                return Err(DocumentError::NotFound {
                    partition_key: pk,
                    id: doc_id,
                });
            }
            Ok(())
        })
        .await?;

        tracing::debug!("[SqliteStorage] Deleted '{}' in partition '{}'", id, partition_key);
        Ok(())
    }
}
