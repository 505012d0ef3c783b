pub mod tour;
pub mod user;

pub use tour::TOUR_SCHEMA;
pub use user::{ModelError, USER_SCHEMA};
