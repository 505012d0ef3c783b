use async_trait::async_trait;
use std::time::Duration;

use crate::hooks::context::HookContext;
use crate::hooks::error::HookError;
use crate::types::Operation;

/// Hook rings with semantic meaning, executed in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum HookRing {
    Validation = 1,  // Required fields, formats, ranges
    Security = 2,    // Visibility constraints on reads
    Enrichment = 4,  // Defaults, derived fields, hashing
    PostRead = 6,    // Presentation of read results
}

impl HookRing {
    /// Rings that run for an operation, in execution order
    pub fn for_operation(operation: Operation) -> Vec<Self> {
        use HookRing::*;

        match operation {
            Operation::Select => vec![Security, PostRead],
            Operation::Create | Operation::Update => vec![Validation, Enrichment],
        }
    }

    /// Rings that run before the store is queried
    pub fn is_pre_store(&self) -> bool {
        (*self as u8) < 5
    }
}

/// Hook metadata and applicability checks
pub trait Hook: Send + Sync {
    /// Hook name for logging and debugging
    fn name(&self) -> &'static str;

    /// Which ring this hook belongs to
    fn ring(&self) -> HookRing;

    fn applies_to_operation(&self, op: Operation) -> bool;

    /// Check if hook applies to this collection
    fn applies_to_collection(&self, collection: &str) -> bool;

    /// Execution timeout (default 5 seconds)
    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Priority within ring (lower numbers execute first)
    fn priority(&self) -> u8 {
        50
    }
}

#[async_trait]
pub trait DocumentHook: Hook {
    async fn execute(&self, ctx: &mut HookContext) -> Result<(), HookError>;
}
