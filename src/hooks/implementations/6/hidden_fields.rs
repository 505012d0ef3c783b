// Ring 6: PostRead - strips fields that are never returned by default
use async_trait::async_trait;

use crate::database::document;
use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::types::Operation;

/// Removes `schema.hidden` fields (user password, reset token, `active`)
/// from results
#[derive(Default)]
pub struct HiddenFields;

impl Hook for HiddenFields {
    fn name(&self) -> &'static str {
        "HiddenFields"
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
        90
    }
}

#[async_trait]
impl DocumentHook for HiddenFields {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        if ctx.schema.hidden.is_empty() {
            return Ok(());
        }

        for doc in ctx.results.iter_mut() {
            for field in ctx.schema.hidden {
                document::remove_path(doc, field);
            }
        }
        Ok(())
    }
}
