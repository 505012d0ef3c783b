// Ring 2: Security - hides flagged documents from ordinary reads
use async_trait::async_trait;
use serde_json::Value;

use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::query::{Condition, FilterOp};
use crate::types::Operation;

/// ANDs `<flag> != <hidden value>` onto every select, e.g. `secretTour != true`
/// for tours and `active != false` for users
#[derive(Default)]
pub struct VisibilityFilter;

impl Hook for VisibilityFilter {
    fn name(&self) -> &'static str {
        "VisibilityFilter"
    }

    fn ring(&self) -> HookRing {
        HookRing::Security
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        op == Operation::Select
    }

    fn applies_to_collection(&self, _collection: &str) -> bool {
        true
    }
}

#[async_trait]
impl DocumentHook for VisibilityFilter {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        if ctx.options.include_hidden_documents {
            return Ok(());
        }
        let Some((field, hidden)) = ctx.schema.hidden_when else {
            return Ok(());
        };

        if let Some(query) = ctx.query.as_mut() {
            query.filter.and(Condition::new(field, FilterOp::Ne, Value::Bool(hidden)));
        }
        Ok(())
    }
}
