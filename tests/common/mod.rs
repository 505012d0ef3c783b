#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::task::JoinHandle;

use natours_api::cli::commands::data::import_tours;
use natours_api::config::AppConfig;
use natours_api::database::MemoryStore;
use natours_api::query::QueryDefaults;
use natours_api::{app, AppState};

pub const FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/dev-data/tours-simple.json");

/// Router served in-process over a fresh in-memory store
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Empty store
    pub async fn start() -> Result<Self> {
        Self::with_state(AppState::new(Arc::new(MemoryStore::new()))).await
    }

    /// Store loaded with the development tours
    pub async fn seeded() -> Result<Self> {
        let server = Self::start().await?;
        import_tours(&server.state.tours, Path::new(FIXTURE)).await?;
        Ok(server)
    }

    /// Seeded store with custom pagination defaults
    pub async fn seeded_with_defaults(defaults: QueryDefaults) -> Result<Self> {
        let mut state = AppState::new(Arc::new(MemoryStore::new()));
        state.query_defaults = defaults;
        let server = Self::with_state(state).await?;
        import_tours(&server.state.tours, Path::new(FIXTURE)).await?;
        Ok(server)
    }

    pub async fn with_state(state: AppState) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind port {}", port))?;

        let router = app(state.clone(), &AppConfig::from_env());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            state,
            client: reqwest::Client::new(),
            handle,
        })
    }

    /// Absolute URL for a path under /api/v1
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let res = self.client.get(self.url(path)).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self.client.post(self.url(path)).json(body).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<(StatusCode, Value)> {
        let res = self.client.patch(self.url(path)).json(body).send().await?;
        Ok((res.status(), res.json().await?))
    }

    /// DELETE; returns the status and the raw body text
    pub async fn delete(&self, path: &str) -> Result<(StatusCode, String)> {
        let res = self.client.delete(self.url(path)).send().await?;
        Ok((res.status(), res.text().await?))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// `data.<key>` of a list response, as an array
pub fn items<'a>(body: &'a Value, key: &str) -> &'a [Value] {
    body["data"][key].as_array().map(Vec::as_slice).unwrap_or(&[])
}

/// String field of every item
pub fn strings(items: &[Value], field: &str) -> Vec<String> {
    items
        .iter()
        .map(|item| item[field].as_str().unwrap_or_default().to_string())
        .collect()
}

pub fn numbers(items: &[Value], field: &str) -> Vec<f64> {
    items.iter().map(|item| item[field].as_f64().unwrap_or(f64::NAN)).collect()
}

/// A complete, valid tour body
pub fn tour_body(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "duration": 6,
        "maxGroupSize": 12,
        "difficulty": "medium",
        "price": 899,
        "summary": "Hiking along the coast with overnight stays in mountain huts",
        "imageCover": "tour-10-cover.jpg",
    })
}

pub fn user_body(name: &str, email: &str) -> Value {
    serde_json::json!({
        "name": name,
        "email": email,
        "password": "pass1234",
        "passwordConfirm": "pass1234",
    })
}
