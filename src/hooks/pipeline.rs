use std::collections::HashMap;
use std::time::Instant;
use tokio::time::timeout;

use crate::database::document::Document;
use crate::database::schema::CollectionSchema;
use crate::hooks::context::{DocumentChange, HookContext, ReadOptions, WriteOptions};
use crate::hooks::error::HookError;
use crate::hooks::implementations::*;
use crate::hooks::traits::{DocumentHook, HookRing};
use crate::query::QuerySpec;
use crate::types::Operation;

/// Ring-ordered document lifecycle hooks
pub struct HookPipeline {
    hooks: HashMap<HookRing, Vec<Box<dyn DocumentHook>>>,
}

impl HookPipeline {
    /// Empty pipeline; documents pass through untouched
    pub fn new() -> Self {
        Self { hooks: HashMap::new() }
    }

    /// Pipeline with every built-in hook registered
    pub fn standard() -> Self {
        let mut pipeline = Self::new();

        // Ring 1
        pipeline.register(Box::new(TourValidation));
        pipeline.register(Box::new(UserValidation));
        // Ring 2
        pipeline.register(Box::new(VisibilityFilter));
        // Ring 4
        pipeline.register(Box::new(TourDefaults));
        pipeline.register(Box::new(UserDefaults));
        pipeline.register(Box::new(Slugify));
        pipeline.register(Box::new(PasswordHash));
        // Ring 6
        pipeline.register(Box::new(DurationWeeks));
        pipeline.register(Box::new(HiddenFields));
        pipeline.register(Box::new(QueryTiming));

        pipeline
    }

    pub fn register(&mut self, hook: Box<dyn DocumentHook>) {
        let ring = hook.ring();
        let name = hook.name();
        let hooks = self.hooks.entry(ring).or_default();
        hooks.push(hook);
        hooks.sort_by_key(|h| h.priority());

        tracing::debug!("Registered hook '{}' for ring {:?}", name, ring);
    }

    /// Run validation and enrichment for a create or update. Returns the
    /// document ready to store.
    pub async fn run_write(
        &self,
        operation: Operation,
        schema: &'static CollectionSchema,
        change: DocumentChange,
        options: WriteOptions,
    ) -> Result<DocumentChange, HookError> {
        let mut ctx = HookContext::write(operation, schema, change);

        tracing::debug!("Hook pipeline starting: operation={:?}, collection={}", operation, schema.name);

        for ring in HookRing::for_operation(operation) {
            if ring == HookRing::Validation && !options.run_validators {
                tracing::debug!("Skipping validation for {} {:?}", schema.name, operation);
                continue;
            }
            ctx.current_ring = Some(ring);
            if !self.execute_ring(ring, &mut ctx).await {
                tracing::warn!("Hook pipeline stopped at ring {:?} due to errors", ring);
                break;
            }
        }

        if let Some(error) = HookError::combine(std::mem::take(&mut ctx.errors)) {
            return Err(error);
        }
        ctx.document
            .ok_or_else(|| HookError::System("write pipeline lost its document".to_string()))
    }

    /// Run the pre-store read rings over a query
    pub async fn prepare_select(
        &self,
        schema: &'static CollectionSchema,
        query: QuerySpec,
        options: ReadOptions,
    ) -> Result<QuerySpec, HookError> {
        let mut ctx = HookContext::select(schema, query, options);

        for ring in HookRing::for_operation(Operation::Select).into_iter().filter(HookRing::is_pre_store) {
            ctx.current_ring = Some(ring);
            if !self.execute_ring(ring, &mut ctx).await {
                break;
            }
        }

        if let Some(error) = HookError::combine(std::mem::take(&mut ctx.errors)) {
            return Err(error);
        }
        Ok(ctx.query.unwrap_or_default())
    }

    /// Run the post-read rings over fetched documents
    pub async fn finish_select(
        &self,
        schema: &'static CollectionSchema,
        results: Vec<Document>,
        options: ReadOptions,
        started: Instant,
    ) -> Result<Vec<Document>, HookError> {
        let mut ctx = HookContext::results(schema, results, options, started);

        for ring in HookRing::for_operation(Operation::Select).into_iter().filter(|r| !r.is_pre_store()) {
            ctx.current_ring = Some(ring);
            self.execute_ring(ring, &mut ctx).await;
        }

        if let Some(error) = HookError::combine(std::mem::take(&mut ctx.errors)) {
            return Err(error);
        }
        Ok(ctx.results)
    }

    /// Present a single stored document the way reads do
    pub async fn present(
        &self,
        schema: &'static CollectionSchema,
        doc: Document,
        options: ReadOptions,
    ) -> Result<Document, HookError> {
        let mut presented = self.finish_select(schema, vec![doc], options, Instant::now()).await?;
        presented
            .pop()
            .ok_or_else(|| HookError::System("presentation dropped the document".to_string()))
    }

    /// Execute the hooks of one ring. Returns false when the pipeline should
    /// stop (errors in a pre-store ring).
    async fn execute_ring(&self, ring: HookRing, ctx: &mut HookContext) -> bool {
        let Some(hooks) = self.hooks.get(&ring) else {
            tracing::trace!("No hooks registered for ring {:?}", ring);
            return true;
        };

        for hook in hooks {
            if !hook.applies_to_operation(ctx.operation) {
                continue;
            }
            if !hook.applies_to_collection(ctx.collection()) {
                continue;
            }

            let hook_start = Instant::now();
            match timeout(hook.timeout(), hook.execute(ctx)).await {
                Ok(Ok(())) => {
                    tracing::debug!("Hook: {} completed in {:?}", hook.name(), hook_start.elapsed());
                }
                Ok(Err(error)) => {
                    tracing::warn!("Hook: {} failed in {:?}: {}", hook.name(), hook_start.elapsed(), error);
                    ctx.add_error(error);
                }
                Err(_elapsed) => {
                    tracing::error!("Hook: {} timed out after {:?}", hook.name(), hook.timeout());
                    ctx.add_error(HookError::Timeout(format!(
                        "Hook {} timed out after {:?}",
                        hook.name(),
                        hook.timeout()
                    )));
                }
            }
        }

        !(ctx.has_errors() && ring.is_pre_store())
    }
}

impl Default for HookPipeline {
    fn default() -> Self {
        Self::new()
    }
}
