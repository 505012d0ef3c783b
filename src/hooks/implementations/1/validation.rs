// Ring 1: Validation - rejects documents that break collection rules
use async_trait::async_trait;

use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::models::{tour, user};
use crate::types::Operation;

/// Validates the merged tour document on create and update
#[derive(Default)]
pub struct TourValidation;

impl Hook for TourValidation {
    fn name(&self) -> &'static str {
        "TourValidation"
    }

    fn ring(&self) -> HookRing {
        HookRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == tour::TOUR_SCHEMA.name
    }
}

#[async_trait]
impl DocumentHook for TourValidation {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        let Some(change) = ctx.document.as_ref() else {
            return Ok(());
        };

        let field_errors = tour::validate(change.fields());
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(HookError::Validation { field_errors })
        }
    }
}

/// Validates user documents; password rules only when the password is set
#[derive(Default)]
pub struct UserValidation;

impl Hook for UserValidation {
    fn name(&self) -> &'static str {
        "UserValidation"
    }

    fn ring(&self) -> HookRing {
        HookRing::Validation
    }

    fn applies_to_operation(&self, op: Operation) -> bool {
        matches!(op, Operation::Create | Operation::Update)
    }

    fn applies_to_collection(&self, collection: &str) -> bool {
        collection == user::USER_SCHEMA.name
    }
}

#[async_trait]
impl DocumentHook for UserValidation {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        let Some(change) = ctx.document.as_ref() else {
            return Ok(());
        };

        let password_changed = change.is_new() || change.changed("password");
        let field_errors = user::validate(change.fields(), password_changed);
        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(HookError::Validation { field_errors })
        }
    }
}
