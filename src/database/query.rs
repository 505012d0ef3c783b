use std::sync::Arc;
use std::time::Instant;

use super::document::Document;
use super::repository::DatabaseError;
use super::schema::CollectionSchema;
use super::store::DocumentStore;
use crate::hooks::{HookPipeline, ReadOptions};
use crate::query::{Filter, Projection, QuerySpec, SortKey};

/// Mutable query handle over one collection. Directives accumulate until
/// `execute` or `count` runs them through the read hooks and the store.
#[derive(Clone)]
pub struct DocumentQuery {
    store: Arc<dyn DocumentStore>,
    schema: &'static CollectionSchema,
    hooks: Arc<HookPipeline>,
    spec: QuerySpec,
    options: ReadOptions,
}

impl DocumentQuery {
    pub fn new(store: Arc<dyn DocumentStore>, schema: &'static CollectionSchema, hooks: Arc<HookPipeline>) -> Self {
        Self { store, schema, hooks, spec: QuerySpec::default(), options: ReadOptions::default() }
    }

    /// AND more conditions onto the handle
    pub fn filter(&mut self, filter: Filter) -> &mut Self {
        self.spec.filter.merge(filter);
        self
    }

    pub fn sort(&mut self, keys: Vec<SortKey>) -> &mut Self {
        self.spec.sort = keys;
        self
    }

    pub fn select(&mut self, projection: Projection) -> &mut Self {
        self.spec.projection = projection;
        self
    }

    pub fn skip(&mut self, skip: u64) -> &mut Self {
        self.spec.skip = skip;
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.spec.limit = Some(limit);
        self
    }

    /// Include documents the visibility rules would hide
    pub fn bypass_visibility(&mut self) -> &mut Self {
        self.options.include_hidden_documents = true;
        self
    }

    pub fn schema(&self) -> &'static CollectionSchema {
        self.schema
    }

    pub fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub async fn execute(&self) -> Result<Vec<Document>, DatabaseError> {
        let started = Instant::now();
        let spec = self.hooks.prepare_select(self.schema, self.spec.clone(), self.options).await?;
        let docs = self.store.find(self.schema.name, &spec).await?;
        Ok(self.hooks.finish_select(self.schema, docs, self.options, started).await?)
    }

    /// Documents matching the filter, ignoring sort, projection and window
    pub async fn count(&self) -> Result<u64, DatabaseError> {
        let spec = self.hooks.prepare_select(self.schema, self.spec.clone(), self.options).await?;
        Ok(self.store.count(self.schema.name, &spec.filter).await?)
    }

    pub async fn first(&self) -> Result<Option<Document>, DatabaseError> {
        let mut query = self.clone();
        query.limit(1);
        Ok(query.execute().await?.into_iter().next())
    }

    /// First match as stored: visibility still applies, but post-read hooks
    /// (virtual fields, hidden-field stripping) do not run
    pub async fn first_stored(&self) -> Result<Option<Document>, DatabaseError> {
        let mut spec = self.hooks.prepare_select(self.schema, self.spec.clone(), self.options).await?;
        spec.limit = Some(1);
        Ok(self.store.find(self.schema.name, &spec).await?.into_iter().next())
    }
}
