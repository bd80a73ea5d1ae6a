//! Document storage behind a trait, so the service never sees the backend.
//!
//! Two implementations: [`PgDocumentStore`] (one JSONB table per collection) and
//! [`MemoryStore`] (process-local, used by tests and `STORE_BACKEND=memory`).

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_collections, ensure_database_exists, PgDocumentStore};

use crate::query::QueryPlan;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// A stored record: a JSON object keyed by field name, always carrying a string `id`.
pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("corrupt document in {collection}: {reason}")]
    Corrupt { collection: String, reason: String },
    #[error("document without id inserted into {0}")]
    MissingId(String),
    #[error("duplicate id {id} in {collection}")]
    DuplicateId { collection: String, id: String },
    /// Another document already holds this value of a `unique` field.
    #[error("{field} already taken in {collection}")]
    UniqueViolation { collection: String, field: String },
    #[error("invalid DATABASE_URL: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Number of documents matching the plan's filters and keyword.
    async fn count(&self, collection: &str, plan: &QueryPlan) -> Result<u64, StoreError>;

    /// One page of matching documents, sorted by the plan and then by insertion order.
    async fn find(&self, collection: &str, plan: &QueryPlan) -> Result<Vec<Document>, StoreError>;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents whose string `field` equals any of `values`, in insertion order.
    async fn find_where_in(
        &self,
        collection: &str,
        field: &str,
        values: &[String],
    ) -> Result<Vec<Document>, StoreError>;

    /// Insert a document that already carries its `id`. Returns it as stored.
    async fn insert(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    /// Merge `patch` into the document in one step. None when the id does not exist.
    async fn update(&self, collection: &str, id: &str, patch: Document) -> Result<Option<Document>, StoreError>;

    /// false when the id does not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// `id` of a document about to be inserted.
pub(crate) fn document_id(collection: &str, doc: &Document) -> Result<String, StoreError> {
    doc.get("id")
        .and_then(Value::as_str)
        .map(String::from)
        .ok_or_else(|| StoreError::MissingId(collection.to_string()))
}
