use async_trait::async_trait;
use thiserror::Error;

use serde_json::Value;

use super::document::Document;
use super::schema::CollectionSchema;
use crate::query::{Filter, QuerySpec};

/// Errors raised by document store drivers
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Document already exists: {0}")]
    DuplicateId(String),

    #[error("Duplicate value for unique field {field}")]
    Duplicate { field: String, value: Value },

    #[error("Stored document is malformed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Driver seam for document storage. Implementations own identity and
/// revision bookkeeping; everything else is opaque JSON.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Documents matching the filter, ordered, windowed, then projected
    async fn find(&self, collection: &str, spec: &QuerySpec) -> Result<Vec<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Persist a new document. Assigns `_id` when absent and sets `__v` to 0.
    /// Fails with `Duplicate` when another document holds a value of one of
    /// the schema's unique fields.
    async fn insert(&self, schema: &CollectionSchema, doc: Document) -> Result<Document, StoreError>;

    /// Overwrite an existing document, bumping `__v`. None when `id` is
    /// unknown. Unique fields are enforced as for `insert`.
    async fn replace(
        &self,
        schema: &CollectionSchema,
        id: &str,
        doc: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;

    async fn delete_all(&self, collection: &str) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// Short driver name for logs and the health endpoint
    fn kind(&self) -> &'static str;
}
