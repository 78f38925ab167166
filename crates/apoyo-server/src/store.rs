//! Async boundary in front of the SQLite store.
//!
//! The ingestion pipeline and the HTTP handlers only see the [`MessageStore`]
//! and [`GroupCatalog`] traits. [`SqliteStore`] implements both by running
//! each call on the blocking thread pool against a mutex-guarded connection.

use std::path::Path;
use std::sync::Arc;

use apoyo_shared::NewGroup;
use apoyo_store::{Database, Group, GroupFilter, Message, StoreError};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Durable, append-only record of messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message; the returned record carries the assigned id and
    /// timestamp.
    async fn insert(
        &self,
        group_id: i64,
        username: &str,
        content: &str,
        is_moderated: bool,
    ) -> Result<Message, StoreError>;

    /// Messages of one group in ascending timestamp order.
    async fn query_by_group(&self, group_id: i64) -> Result<Vec<Message>, StoreError>;
}

/// The group catalog.
#[async_trait]
pub trait GroupCatalog: Send + Sync {
    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError>;
    async fn get_group(&self, id: i64) -> Result<Group, StoreError>;
    async fn list_groups(&self, filter: GroupFilter) -> Result<Vec<Group>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_at(path)?))
    }

    async fn with_db<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, StoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db.lock()))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert(
        &self,
        group_id: i64,
        username: &str,
        content: &str,
        is_moderated: bool,
    ) -> Result<Message, StoreError> {
        let username = username.to_string();
        let content = content.to_string();
        self.with_db(move |db| db.insert_message(group_id, &username, &content, is_moderated))
            .await
    }

    async fn query_by_group(&self, group_id: i64) -> Result<Vec<Message>, StoreError> {
        self.with_db(move |db| db.get_messages_for_group(group_id))
            .await
    }
}

#[async_trait]
impl GroupCatalog for SqliteStore {
    async fn create_group(&self, group: NewGroup) -> Result<Group, StoreError> {
        self.with_db(move |db| db.create_group(&group)).await
    }

    async fn get_group(&self, id: i64) -> Result<Group, StoreError> {
        self.with_db(move |db| db.get_group(id)).await
    }

    async fn list_groups(&self, filter: GroupFilter) -> Result<Vec<Group>, StoreError> {
        self.with_db(move |db| db.list_groups(&filter)).await
    }
}
