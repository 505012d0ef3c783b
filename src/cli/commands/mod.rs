pub mod data;
pub mod serve;
pub mod users;
