// Hook implementations organized by rings

// Ring 1: Validation
#[path = "1/validation.rs"]
pub mod validation;

// Ring 2: Security
#[path = "2/visibility.rs"]
pub mod visibility;

// Ring 4: Enrichment
#[path = "4/defaults.rs"]
pub mod defaults;
#[path = "4/slug.rs"]
pub mod slug;
#[path = "4/password_hash.rs"]
pub mod password_hash;

// Ring 6: Post-read presentation
#[path = "6/duration_weeks.rs"]
pub mod duration_weeks;
#[path = "6/hidden_fields.rs"]
pub mod hidden_fields;
#[path = "6/query_timing.rs"]
pub mod query_timing;

pub use defaults::*;
pub use duration_weeks::*;
pub use hidden_fields::*;
pub use password_hash::*;
pub use query_timing::*;
pub use slug::*;
pub use validation::*;
pub use visibility::*;
