// Ring 4: Enrichment - replaces plaintext passwords with argon2 hashes
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::time;

use crate::database::document;
use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::hooks::traits::{DocumentHook, Hook, HookRing};
use crate::models::user;
use crate::types::Operation;

#[derive(Default)]
pub struct PasswordHash;

impl Hook for PasswordHash {
    fn name(&self) -> &'static str {
        "PasswordHash"
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

    fn timeout(&self) -> time::Duration {
        time::Duration::from_secs(10)
    }
}

#[async_trait]
impl DocumentHook for PasswordHash {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError> {
        let Some(change) = ctx.document.as_mut() else {
            return Ok(());
        };

        // The confirmation is never persisted
        change.remove("passwordConfirm");

        if !change.changed("password") {
            return Ok(());
        }
        let Some(password) = change.get_str("password").map(str::to_string) else {
            return Ok(());
        };

        let hash = tokio::task::spawn_blocking(move || user::hash_password(&password))
            .await
            .map_err(|e| HookError::System(format!("password hashing task failed: {}", e)))?
            .map_err(|e| HookError::System(e.to_string()))?;
        change.set("password", Value::String(hash));

        // Backdated by one second
        if !change.is_new() {
            let changed_at = Utc::now() - Duration::seconds(1);
            change.set("passwordChangedAt", Value::String(document::format_date(changed_at)));
        }
        Ok(())
    }
}
