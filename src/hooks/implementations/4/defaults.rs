// Ring 4: Enrichment - collection defaults and normalisation
use async_trait::async_trait;

use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::models::{tour, user};
use crate::types::Operation;

#[derive(Default)]
pub struct TourDefaults;

impl Hook for TourDefaults {
    fn name(&self) -> &'static str {
        "TourDefaults"
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

    fn priority(&self) -> u8 {
        10
    }
}

#[async_trait]
impl DocumentHook for TourDefaults {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        if let Some(change) = ctx.document.as_mut() {
            tour::apply_defaults(change);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct UserDefaults;

impl Hook for UserDefaults {
    fn name(&self) -> &'static str {
        "UserDefaults"
    }

    fn ring(&self) -> HookRing {
        HookRing::Enrichment
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == user::USER_SCHEMA.name
    }

    fn priority(&self) -> u8 {
        10
    }
}

#[async_trait]
impl DocumentHook for UserDefaults {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        if let Some(change) = ctx.document.as_mut() {
            user::apply_defaults(change);
        }
        Ok(())
    }
}
