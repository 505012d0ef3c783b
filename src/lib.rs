pub mod app;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod middleware;
pub mod models;
pub mod query;
pub mod services;
pub mod types;

pub use app::{app, build_store, AppState};
