/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Document operations seen by the hook pipeline and repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Select,
}
