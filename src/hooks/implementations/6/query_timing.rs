// Ring 6: PostRead - logs how long a read took
use async_trait::async_trait;

use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::types::Operation;

#[derive(Default)]
pub struct QueryTiming;

impl Hook for QueryTiming {
    fn name(&self) -> &'static str {
        "QueryTiming"
    }

    fn ring(&self) -> HookRing {
        HookRing::PostRead
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Select
    }

    fn applies_to_collection(&self, _collection: &str) -> bool {
        true
    }

    fn priority(&self) -> u8 {
        100
    }
}

#[async_trait]
impl DocumentHook for QueryTiming {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        tracing::debug!(
            "Query on {} took {} ms ({} documents)",
            ctx.collection(),
            ctx.execution_time().as_millis(),
            ctx.results.len()
        );
        Ok(())
    }
}
