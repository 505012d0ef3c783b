use axum::extract::State;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/v1/health
pub async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    if let Err(e) = state.store.health_check().await {
        tracing::error!("Store health check failed: {}", e);
        return Err(ApiError::service_unavailable("Database temporarily unavailable"));
    }

    Ok(ApiResponse::success(json!({
        "store": state.store.kind(),
        "version": env!("CARGO_PKG_VERSION"),
    })))
}
