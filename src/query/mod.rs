// Client query-string features: filter, sort, projection and pagination

pub mod error;
pub mod features;
pub mod params;
pub mod types;

pub use error::QueryError;
pub use features::{QueryDefaults, QueryFeatures, DEFAULT_SORT_FIELD};
pub use params::{FilterParam, ParamValue, QueryParams, RESERVED_KEYS};
pub use types::*;
