// Ring 6: PostRead - virtual `durationWeeks` on tours
use async_trait::async_trait;

use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::models::tour;
use crate::types::Operation;

#[derive(Default)]
pub struct DurationWeeks;

impl Hook for DurationWeeks {
    fn name(&self) -> &'static str {
        "DurationWeeks"
    }

    fn ring(&self) -> HookRing {
        HookRing::PostRead
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Select
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == tour::TOUR_SCHEMA.name
    }
}

#[async_trait]
impl DocumentHook for DurationWeeks {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        for doc in ctx.results.iter_mut() {
            if let Some(weeks) = tour::duration_weeks(doc) {
                doc.insert("durationWeeks".to_string(), weeks);
            }
        }
        Ok(())
    }
}
