use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

use super::document::{Document, ID_FIELD, VERSION_FIELD};
use super::query::DocumentQuery;
use super::schema::CollectionSchema;
use super::store::{DocumentStore, StoreError};
use crate::hooks::{DocumentChange, HookError, HookPipeline, ReadOptions, WriteOptions};
use crate::query::{Filter, FilterOp, QueryError};
use crate::types::Operation;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{0}")]
    NotFound(String),

    #[error("Duplicate field value: {value}. Please use another value!")]
    Duplicate { field: String, value: String },

    #[error("{0}")]
    InvalidInput(String),
}

/// Collection-scoped access that routes every write through the hook
/// pipeline and every read through the read rings
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
    schema: &'static CollectionSchema,
    hooks: Arc<HookPipeline>,
}

impl Repository {
    pub fn new(store: Arc<dyn DocumentStore>, schema: &'static CollectionSchema, hooks: Arc<HookPipeline>) -> Self {
        Self { store, schema, hooks }
    }

    pub fn schema(&self) -> &'static CollectionSchema {
        self.schema
    }

    /// Fresh query handle over this collection
    pub fn query(&self) -> DocumentQuery {
        DocumentQuery::new(self.store.clone(), self.schema, self.hooks.clone())
    }

    pub async fn select_any(&self, filter: Filter) -> Result<Vec<Document>, DatabaseError> {
        self.query().filter(filter).execute().await
    }

    pub async fn select_one(&self, filter: Filter) -> Result<Option<Document>, DatabaseError> {
        self.query().filter(filter).first().await
    }

    /// Visible document by id, or NotFound
    pub async fn select_404(&self, id: &str) -> Result<Document, DatabaseError> {
        self.select_one(Filter::eq(ID_FIELD, id)).await?.ok_or_else(|| self.not_found())
    }

    pub async fn count(&self, filter: Filter) -> Result<u64, DatabaseError> {
        self.query().filter(filter).count().await
    }

    pub async fn create(&self, mut input: Document) -> Result<Document, DatabaseError> {
        for reserved in [ID_FIELD, VERSION_FIELD] {
            if input.contains_key(reserved) {
                return Err(DatabaseError::InvalidInput(format!("Field {} cannot be set", reserved)));
            }
        }
        self.strip_unknown(&mut input);

        let change = DocumentChange::new(input);
        let prepared = self
            .hooks
            .run_write(Operation::Create, self.schema, change, WriteOptions::default())
            .await?;
        self.check_unique(&prepared).await?;

        let stored = self
            .store
            .insert(self.schema, prepared.into_document())
            .await
            .map_err(store_error)?;
        let id = stored.get(ID_FIELD).and_then(Value::as_str).unwrap_or_default();
        tracing::info!("Created {} {}", self.schema.label, id);

        Ok(self.hooks.present(self.schema, stored, ReadOptions::default()).await?)
    }

    /// Merge `patch` over the visible document with this id, validate the
    /// merged result and store it
    pub async fn update(&self, id: &str, mut patch: Document) -> Result<Document, DatabaseError> {
        patch.remove(VERSION_FIELD);
        if let Some(new_id) = patch.remove(ID_FIELD) {
            if new_id.as_str() != Some(id) {
                return Err(DatabaseError::InvalidInput(format!("Field {} cannot be changed", ID_FIELD)));
            }
        }
        self.strip_unknown(&mut patch);

        let original = self
            .query()
            .filter(Filter::eq(ID_FIELD, id))
            .first_stored()
            .await?
            .ok_or_else(|| self.not_found())?;

        let change = DocumentChange::for_update(original, patch);
        self.save(change, WriteOptions::default()).await
    }

    /// Store a tracked change to an existing document. The original must be
    /// the stored form (see `DocumentQuery::first_stored`).
    pub async fn save(&self, change: DocumentChange, options: WriteOptions) -> Result<Document, DatabaseError> {
        let id = change
            .id()
            .map(str::to_string)
            .ok_or_else(|| DatabaseError::InvalidInput("Only stored documents can be saved".to_string()))?;

        let prepared = self.hooks.run_write(Operation::Update, self.schema, change, options).await?;
        self.check_unique(&prepared).await?;

        let stored = self
            .store
            .replace(self.schema, &id, prepared.into_document())
            .await
            .map_err(store_error)?
            .ok_or_else(|| self.not_found())?;
        tracing::debug!("Saved {} {}", self.schema.label, id);

        Ok(self.hooks.present(self.schema, stored, ReadOptions::default()).await?)
    }

    /// Delete the visible document with this id
    pub async fn delete(&self, id: &str) -> Result<(), DatabaseError> {
        self.select_404(id).await?;
        if !self.store.delete(self.schema.name, id).await? {
            return Err(self.not_found());
        }
        tracing::info!("Deleted {} {}", self.schema.label, id);
        Ok(())
    }

    /// Remove every document in the collection, hidden ones included
    pub async fn delete_all(&self) -> Result<u64, DatabaseError> {
        Ok(self.store.delete_all(self.schema.name).await?)
    }

    /// Reject values that another document already holds for a unique field
    async fn check_unique(&self, change: &DocumentChange) -> Result<(), DatabaseError> {
        for field in self.schema.unique {
            if !change.is_new() && !change.changed(field) {
                continue;
            }
            let Some(value) = change.get(field).filter(|v| !v.is_null()) else {
                continue;
            };

            let mut filter = Filter::eq(*field, value.clone());
            if let Some(id) = change.id() {
                filter = filter.with(ID_FIELD, FilterOp::Ne, id);
            }

            let taken = self.query().filter(filter).bypass_visibility().count().await?;
            if taken > 0 {
                return Err(duplicate(field, value));
            }
        }
        Ok(())
    }

    /// Keys outside the schema are dropped; write-only inputs stay for the
    /// write rings, which remove them before storage
    fn strip_unknown(&self, input: &mut Document) {
        let schema = self.schema;
        input.retain(|key, _| {
            let accepted = schema.accepts(key);
            if !accepted {
                tracing::debug!("Ignoring unknown {} field {}", schema.label, key);
            }
            accepted
        });
    }

    fn not_found(&self) -> DatabaseError {
        DatabaseError::NotFound(format!("No {} found with that ID", self.schema.label))
    }
}

fn duplicate(field: &str, value: &Value) -> DatabaseError {
    let shown = match value {
        Value::String(s) => format!("\"{}\"", s),
        other => other.to_string(),
    };
    DatabaseError::Duplicate { field: field.to_string(), value: shown }
}

/// A unique violation caught by the store itself reads the same as one
/// caught by `check_unique`
fn store_error(err: StoreError) -> DatabaseError {
    match err {
        StoreError::Duplicate { field, value } => duplicate(&field, &value),
        other => other.into(),
    }
}
