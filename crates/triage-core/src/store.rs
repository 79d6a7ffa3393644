//! Generic record storage
//!
//! The backend is a collaborator: one [`Collection`] per entity, with a
//! deliberately small surface (insert/get/list/replace/delete).
//! Filtering, ordering and limiting happen in the façade, which has to
//! walk the records through the access policy anyway.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::attachment::Attachment;
use crate::comment::Comment;
use crate::issue::Issue;
use crate::project::Project;
use crate::user::User;
use crate::{Error, Result};

/// A storable entity
pub trait Record: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Collection name, used for storage file names
    const COLLECTION: &'static str;

    /// Prefix for generated ids (e.g. "iss")
    const ID_PREFIX: &'static str;

    fn id(&self) -> &str;

    fn created_at(&self) -> DateTime<Utc>;
}

/// One entity collection in the record store
#[async_trait]
pub trait Collection<T: Record>: Send + Sync {
    /// Persist a new record. Fails with `AlreadyExists` on id collision.
    async fn insert(&self, record: T) -> Result<T>;

    /// Fetch by id; absence is not an error.
    async fn get(&self, id: &str) -> Result<Option<T>>;

    /// All records, in no particular order.
    async fn list(&self) -> Result<Vec<T>>;

    /// Replace an existing record. Fails with `NotFound` if absent.
    async fn replace(&self, record: T) -> Result<T>;

    /// Remove by id. Idempotent: deleting an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// In-memory collection, for tests and ephemeral use
pub struct MemoryCollection<T> {
    records: RwLock<HashMap<String, T>>,
}

impl<T> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Record> Collection<T> for MemoryCollection<T> {
    async fn insert(&self, record: T) -> Result<T> {
        let mut records = self.records.write().await;
        if records.contains_key(record.id()) {
            return Err(Error::AlreadyExists(record.id().to_string()));
        }
        records.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<T>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<T>> {
        Ok(self.records.read().await.values().cloned().collect())
    }

    async fn replace(&self, record: T) -> Result<T> {
        let mut records = self.records.write().await;
        if !records.contains_key(record.id()) {
            return Err(Error::NotFound(record.id().to_string()));
        }
        records.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.records.write().await.remove(id);
        Ok(())
    }
}

/// The record store: one collection per entity
#[derive(Clone)]
pub struct Store {
    pub users: Arc<dyn Collection<User>>,
    pub projects: Arc<dyn Collection<Project>>,
    pub issues: Arc<dyn Collection<Issue>>,
    pub comments: Arc<dyn Collection<Comment>>,
    pub attachments: Arc<dyn Collection<Attachment>>,
}

impl Store {
    /// A store that lives and dies with the process
    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryCollection::<User>::new()),
            projects: Arc::new(MemoryCollection::<Project>::new()),
            issues: Arc::new(MemoryCollection::<Issue>::new()),
            comments: Arc::new(MemoryCollection::<Comment>::new()),
            attachments: Arc::new(MemoryCollection::<Attachment>::new()),
        }
    }
}
