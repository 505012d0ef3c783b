// Ring 4: Enrichment - URL slug derived from the tour name
use async_trait::async_trait;
use serde_json::Value;

use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::models::tour;
use crate::types::Operation;

#[derive(Default)]
pub struct Slugify;

impl Hook for Slugify {
    fn name(&self) -> &'static str {
        "Slugify"
    }

    fn ring(&self) -> HookRing {
        HookRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == tour::TOUR_SCHEMA.name
    }

    // After trimming
    fn priority(&self) -> u8 {
        20
    }
}

#[async_trait]
impl DocumentHook for Slugify {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        let Some(change) = ctx.document.as_mut() else {
            return Ok(());
        };
        if !change.is_new() && !change.changed("name") {
            return Ok(());
        }

        if let Some(name) = change.get_str("name") {
            let slug = tour::slugify(name);
            change.set("slug", Value::String(slug));
        }
        Ok(())
    }
}
