//! # Document Store
//!
//! The contract the relational layer is built on: named databases holding named
//! collections of `(id, value)` documents, plus a per-collection registry of
//! physical index names. The store knows nothing about columns, uniqueness,
//! foreign keys or joins.

use catalog::PhysicalLayout;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database `{0}` not found")]
    DatabaseNotFound(String),
    #[error("database `{0}` already exists")]
    DatabaseExists(String),
    #[error("collection `{database}.{collection}` not found")]
    CollectionNotFound { database: String, collection: String },
    #[error("collection `{database}.{collection}` already exists")]
    CollectionExists { database: String, collection: String },
    #[error("document `{id}` already exists in `{collection}`")]
    DocumentExists { collection: String, id: String },
    #[error("index `{index}` not found on `{collection}`")]
    IndexNotFound { collection: String, index: String },
    #[error("index `{index}` already exists on `{collection}`")]
    IndexExists { collection: String, index: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::DatabaseNotFound(_)
                | StoreError::CollectionNotFound { .. }
                | StoreError::IndexNotFound { .. }
        )
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            StoreError::DatabaseExists(_)
                | StoreError::CollectionExists { .. }
                | StoreError::DocumentExists { .. }
                | StoreError::IndexExists { .. }
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A single stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[getset(get = "pub")]
pub struct Document {
    id: String,
    value: String,
}

impl Document {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }

    pub fn into_parts(self) -> (String, String) {
        (self.id, self.value)
    }
}

/// Operations every backing store provides. Implementations are shared across
/// connections, so every method takes `&self`.
pub trait DocumentStore: PhysicalLayout<Error = StoreError> + Send + Sync + Debug {
    fn create_database(&self, database: &str) -> StoreResult<()>;

    fn drop_database(&self, database: &str) -> StoreResult<()>;

    fn create_collection(&self, database: &str, collection: &str) -> StoreResult<()>;

    fn drop_collection(&self, database: &str, collection: &str) -> StoreResult<()>;

    /// Fails with [`StoreError::DocumentExists`] when the id is taken.
    fn insert_one(&self, database: &str, collection: &str, document: Document) -> StoreResult<()>;

    /// Inserts or overwrites the document with the same id.
    fn replace_one(&self, database: &str, collection: &str, document: Document)
        -> StoreResult<()>;

    fn find_one(&self, database: &str, collection: &str, id: &str)
        -> StoreResult<Option<Document>>;

    /// All documents of a collection, ordered by id.
    fn find_all(&self, database: &str, collection: &str) -> StoreResult<Vec<Document>>;

    /// Returns whether a document was removed.
    fn delete_one(&self, database: &str, collection: &str, id: &str) -> StoreResult<bool>;

    fn create_index(
        &self,
        database: &str,
        collection: &str,
        index: &str,
        columns: &[String],
    ) -> StoreResult<()>;

    fn drop_index(&self, database: &str, collection: &str, index: &str) -> StoreResult<()>;
}
