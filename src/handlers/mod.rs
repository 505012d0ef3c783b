// Route handlers for /api/v1, one module per resource

pub mod health;
pub mod tours;
pub mod users;
pub mod utils;
