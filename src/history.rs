//! Session History - one document per (user, session)
//!
//! Information Hiding:
//! - Document layout and codec hidden from history users
//! - Container resolution and partition addressing internalized
//! - In-memory cache kept as a disposable mirror of the stored document
//!
//! The whole message list is rewritten on every mutation with an
//! unconditional upsert, so concurrent writers to the same session follow
//! last-writer-wins. `messages()` is the only point where the cache is
//! reconciled with storage.

use crate::core::{ConversationDocument, Message};
use crate::error::{DocumentError, HistoryError, HistoryResult, Operation};
use crate::storage::{DocumentClient, DocumentStore};
use async_trait::async_trait;
use std::sync::Arc;

/// Ordered chat history for a single conversation
#[async_trait]
pub trait ChatMessageHistory: Send {
    /// Append one message and persist the full history
    async fn add_message(&mut self, message: Message) -> HistoryResult<()>;

    async fn add_user_message(&mut self, text: &str) -> HistoryResult<()> {
        self.add_message(Message::human(text)).await
    }

    async fn add_ai_message(&mut self, text: &str) -> HistoryResult<()> {
        self.add_message(Message::ai(text)).await
    }

    /// Fetch the stored history, refreshing any local state
    async fn messages(&mut self) -> HistoryResult<Vec<Message>>;

    /// Replace the whole history
    async fn set_messages(&mut self, messages: Vec<Message>) -> HistoryResult<()>;

    /// Drop the whole history. Clearing an empty session succeeds.
    async fn clear(&mut self) -> HistoryResult<()>;
}

/// Chat history persisted as a single document in a partitioned store.
///
/// Partition key is the user id, document id is the session id. Both are
/// fixed for the lifetime of the value.
///
/// Not internally synchronized: wrap in a lock to share one instance.
pub struct SessionHistory {
    database_id: String,
    container_id: String,
    session_id: String,
    user_id: String,
    container: Arc<dyn DocumentStore>,
    messages: Vec<Message>,
}

impl std::fmt::Debug for SessionHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHistory")
            .field("database_id", &self.database_id)
            .field("container_id", &self.container_id)
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

impl SessionHistory {
    /// Bind a history to `(user_id, session_id)` inside a container.
    ///
    /// Only resolves a local container handle: succeeds even if the
    /// database or container does not exist yet.
    pub fn new(
        client: Arc<dyn DocumentClient>,
        database_id: impl Into<String>,
        container_id: impl Into<String>,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> HistoryResult<Self> {
        SessionHistoryBuilder::new()
            .client(client)
            .database(database_id)
            .container(container_id)
            .session_id(session_id)
            .user_id(user_id)
            .build()
    }

    pub fn builder() -> SessionHistoryBuilder {
        SessionHistoryBuilder::new()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// Local cache as of the last operation. May be ahead of storage after
    /// a failed `add_message`; call `messages()` to reconcile.
    pub fn cached_messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    fn storage_error(&self, operation: Operation, source: DocumentError) -> HistoryError {
        tracing::warn!(
            "[SessionHistory] {} failed for user '{}' session '{}': {}",
            operation,
            self.user_id,
            self.session_id,
            source
        );
        HistoryError::Storage {
            operation,
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            source,
        }
    }

    fn codec_error(&self, source: serde_json::Error) -> HistoryError {
        tracing::warn!(
            "[SessionHistory] Codec failed for user '{}' session '{}': {}",
            self.user_id,
            self.session_id,
            source
        );
        HistoryError::Codec {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            source,
        }
    }

    async fn write(&self, messages: &[Message]) -> HistoryResult<()> {
        let document = ConversationDocument::new(&self.session_id, &self.user_id, messages);
        let bytes = document.to_bytes().map_err(|e| self.codec_error(e))?;

        self.container
            .upsert(&self.user_id, &bytes)
            .await
            .map_err(|e| self.storage_error(Operation::Upsert, e))?;

        tracing::debug!(
            "[SessionHistory] Wrote {} messages for user '{}' session '{}'",
            messages.len(),
            self.user_id,
            self.session_id
        );
        Ok(())
    }
}

#[async_trait]
impl ChatMessageHistory for SessionHistory {
    async fn add_message(&mut self, message: Message) -> HistoryResult<()> {
        // Cache advances first; on a failed write it is ahead of storage.
        self.messages.push(message);
        self.write(&self.messages).await
    }

    async fn messages(&mut self) -> HistoryResult<Vec<Message>> {
        let bytes = match self.container.read(&self.user_id, &self.session_id).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    "[SessionHistory] No history for user '{}' session '{}'",
                    self.user_id,
                    self.session_id
                );
                self.messages.clear();
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.storage_error(Operation::Read, e)),
        };

        let document = ConversationDocument::from_bytes(&bytes).map_err(|e| self.codec_error(e))?;

        tracing::debug!(
            "[SessionHistory] Loaded {} messages for user '{}' session '{}'",
            document.messages.len(),
            self.user_id,
            self.session_id
        );
        self.messages = document.messages;
        Ok(self.messages.clone())
    }

    async fn set_messages(&mut self, messages: Vec<Message>) -> HistoryResult<()> {
        self.clear().await?;

        if messages.is_empty() {
            return Ok(());
        }

        self.write(&messages).await?;
        self.messages = messages;
        Ok(())
    }

    async fn clear(&mut self) -> HistoryResult<()> {
        self.messages.clear();

        match self.container.delete(&self.user_id, &self.session_id).await {
            Ok(()) => {
                tracing::debug!(
                    "[SessionHistory] Cleared user '{}' session '{}'",
                    self.user_id,
                    self.session_id
                );
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(self.storage_error(Operation::Delete, e)),
        }
    }
}

/// Fluent construction of a [`SessionHistory`]. `build()` validates that
/// the client and all four identifiers are present.
#[derive(Default)]
pub struct SessionHistoryBuilder {
    client: Option<Arc<dyn DocumentClient>>,
    database_id: String,
    container_id: String,
    session_id: String,
    user_id: String,
}

impl SessionHistoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(mut self, client: Arc<dyn DocumentClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn database(mut self, database_id: impl Into<String>) -> Self {
        self.database_id = database_id.into();
        self
    }

    pub fn container(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = container_id.into();
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn build(self) -> HistoryResult<SessionHistory> {
        let client = self.client.ok_or_else(|| {
            HistoryError::InvalidArgument("document client cannot be absent".to_string())
        })?;

        if self.database_id.is_empty()
            || self.container_id.is_empty()
            || self.session_id.is_empty()
            || self.user_id.is_empty()
        {
            return Err(HistoryError::InvalidArgument(
                "database_id, container_id, session_id and user_id are mandatory".to_string(),
            ));
        }

        let container = client
            .container(&self.database_id, &self.container_id)
            .map_err(|e| {
                HistoryError::InvalidArgument(format!(
                    "cannot resolve container '{}/{}': {}",
                    self.database_id, self.container_id, e
                ))
            })?;

        Ok(SessionHistory {
            database_id: self.database_id,
            container_id: self.container_id,
            session_id: self.session_id,
            user_id: self.user_id,
            container,
            messages: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Role;
    use crate::storage::memory::InMemoryDocumentClient;

    async fn provisioned() -> Arc<dyn DocumentClient> {
        let client = InMemoryDocumentClient::new();
        client.create_container("db", "c").await.unwrap();
        Arc::new(client)
    }

    /// Backend whose writes, reads or deletes can be made to fail
    struct FlakyClient {
        inner: InMemoryDocumentClient,
        fail: Arc<std::sync::Mutex<Option<Operation>>>,
    }

    struct FlakyStore {
        inner: Arc<dyn DocumentStore>,
        fail: Arc<std::sync::Mutex<Option<Operation>>>,
    }

    impl FlakyStore {
        fn check(&self, op: Operation) -> Result<(), DocumentError> {
            if *self.fail.lock().unwrap() == Some(op) {
                return Err(DocumentError::Io(std::io::Error::other("injected")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentClient for FlakyClient {
        fn container(&self, db: &str, c: &str) -> Result<Arc<dyn DocumentStore>, DocumentError> {
            Ok(Arc::new(FlakyStore {
                inner: self.inner.container(db, c)?,
                fail: Arc::clone(&self.fail),
            }))
        }

        async fn create_container(&self, db: &str, c: &str) -> Result<(), DocumentError> {
            self.inner.create_container(db, c).await
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn upsert(&self, pk: &str, document: &[u8]) -> Result<(), DocumentError> {
            self.check(Operation::Upsert)?;
            self.inner.upsert(pk, document).await
        }

        async fn read(&self, pk: &str, id: &str) -> Result<Vec<u8>, DocumentError> {
            self.check(Operation::Read)?;
            self.inner.read(pk, id).await
        }

        async fn delete(&self, pk: &str, id: &str) -> Result<(), DocumentError> {
            self.check(Operation::Delete)?;
            self.inner.delete(pk, id).await
        }
    }

    async fn flaky() -> (SessionHistory, Arc<std::sync::Mutex<Option<Operation>>>) {
        let fail = Arc::new(std::sync::Mutex::new(None));
        let client = FlakyClient {
            inner: InMemoryDocumentClient::new(),
            fail: Arc::clone(&fail),
        };
        client.create_container("db", "c").await.unwrap();
        let history = SessionHistory::new(Arc::new(client), "db", "c", "s1", "alice").unwrap();
        (history, fail)
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let mut history = SessionHistory::new(provisioned().await, "db", "c", "s1", "alice").unwrap();

        history.add_user_message("Hello").await.unwrap();
        history.add_ai_message("Hi there").await.unwrap();
        assert_eq!(
            history.messages().await.unwrap(),
            vec![Message::human("Hello"), Message::ai("Hi there")]
        );

        history.set_messages(vec![Message::ai("summary")]).await.unwrap();
        assert_eq!(history.messages().await.unwrap(), vec![Message::ai("summary")]);

        history.clear().await.unwrap();
        assert!(history.messages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_builder_rejects_missing_parts() {
        let client = provisioned().await;

        let err = SessionHistory::builder()
            .database("db")
            .container("c")
            .session_id("s")
            .user_id("u")
            .build()
            .unwrap_err();
        assert!(err.is_invalid_argument());

        let cases = [
            ("", "c", "s", "u"),
            ("db", "", "s", "u"),
            ("db", "c", "", "u"),
            ("db", "c", "s", ""),
        ];
        for (db, c, s, u) in cases {
            let err = SessionHistory::new(Arc::clone(&client), db, c, s, u).unwrap_err();
            assert!(err.is_invalid_argument(), "expected InvalidArgument for {:?}", (db, c, s, u));
        }
    }

    #[tokio::test]
    async fn test_construction_does_not_touch_storage() {
        let client: Arc<dyn DocumentClient> = Arc::new(InMemoryDocumentClient::new());
        let mut history = SessionHistory::new(client, "nodb", "nocontainer", "s", "u").unwrap();

        assert_eq!(history.message_count(), 0);
        let err = history.messages().await.unwrap_err();
        assert!(err.is_storage_failure());
    }

    #[tokio::test]
    async fn test_messages_replaces_cache() {
        let client = provisioned().await;
        let mut a = SessionHistory::new(Arc::clone(&client), "db", "c", "s1", "alice").unwrap();
        let mut b = SessionHistory::new(client, "db", "c", "s1", "alice").unwrap();

        b.add_user_message("from b").await.unwrap();
        a.add_user_message("from a").await.unwrap();
        assert_eq!(a.cached_messages(), &[Message::human("from a")]);

        b.messages().await.unwrap();
        assert_eq!(b.cached_messages(), &[Message::human("from a")]);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_ahead() {
        let (mut history, fail) = flaky().await;
        history.add_user_message("stored").await.unwrap();

        *fail.lock().unwrap() = Some(Operation::Upsert);
        let err = history.add_user_message("lost").await.unwrap_err();
        assert!(matches!(err, HistoryError::Storage { operation: Operation::Upsert, .. }));
        assert_eq!(history.message_count(), 2);

        *fail.lock().unwrap() = None;
        assert_eq!(history.messages().await.unwrap(), vec![Message::human("stored")]);
        assert_eq!(history.message_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_read_keeps_cache() {
        let (mut history, fail) = flaky().await;
        history.add_user_message("kept").await.unwrap();

        *fail.lock().unwrap() = Some(Operation::Read);
        let err = history.messages().await.unwrap_err();
        assert!(matches!(err, HistoryError::Storage { operation: Operation::Read, .. }));
        assert_eq!(history.cached_messages(), &[Message::human("kept")]);
    }

    #[tokio::test]
    async fn test_failed_delete_still_resets_cache() {
        let (mut history, fail) = flaky().await;
        history.add_user_message("x").await.unwrap();

        *fail.lock().unwrap() = Some(Operation::Delete);
        let err = history.clear().await.unwrap_err();
        assert!(matches!(err, HistoryError::Storage { operation: Operation::Delete, .. }));
        assert_eq!(history.message_count(), 0);

        *fail.lock().unwrap() = None;
        assert_eq!(history.messages().await.unwrap(), vec![Message::human("x")]);
    }

    #[tokio::test]
    async fn test_set_messages_aborts_when_clear_fails() {
        let (mut history, fail) = flaky().await;
        history.add_user_message("old").await.unwrap();

        *fail.lock().unwrap() = Some(Operation::Delete);
        assert!(history.set_messages(vec![Message::ai("new")]).await.is_err());

        *fail.lock().unwrap() = None;
        assert_eq!(history.messages().await.unwrap(), vec![Message::human("old")]);
    }

    #[tokio::test]
    async fn test_malformed_document_is_codec_error() {
        let client = provisioned().await;
        let container = client.container("db", "c").unwrap();
        let mut history = SessionHistory::new(client, "db", "c", "s1", "alice").unwrap();
        history.add_user_message("cached").await.unwrap();
        container
            .upsert("alice", br#"{"id":"s1","userid":"alice","messages":{"oops":1}}"#)
            .await
            .unwrap();

        let err = history.messages().await.unwrap_err();
        assert!(matches!(err, HistoryError::Codec { .. }));
        assert!(err.is_storage_failure());
        assert_eq!(history.cached_messages(), &[Message::human("cached")]);
    }

    #[tokio::test]
    async fn test_roles_and_names_round_trip() {
        let mut history = SessionHistory::new(provisioned().await, "db", "c", "s1", "alice").unwrap();
        let all = vec![
            Message::system("rules"),
            Message::human("q"),
            Message::ai(""),
            Message::generic("narrator", "meanwhile"),
            Message::tool("call_1", "42"),
            Message::function("lookup", "{\"ok\":true}"),
            Message::new(Role::Other("critic".to_string()), "meh"),
        ];

        history.set_messages(all.clone()).await.unwrap();

        assert_eq!(history.messages().await.unwrap(), all);
    }

    #[tokio::test]
    async fn test_known_tags_wrapped_in_other_round_trip() {
        let mut history = SessionHistory::new(provisioned().await, "db", "c", "s1", "alice").unwrap();
        let appended = vec![
            Message::new(Role::Other("ai".to_string()), "x"),
            Message {
                role: Role::Other("human".to_string()),
                content: "y".to_string(),
                name: None,
            },
            Message::new(Role::custom("function"), "z").with_name("f"),
        ];

        for message in &appended {
            history.add_message(message.clone()).await.unwrap();
        }

        let loaded = history.messages().await.unwrap();
        assert_eq!(loaded, appended);
        assert!(matches!(loaded[1].role, Role::Human));
    }
}
