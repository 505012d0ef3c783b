use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    Json,
};
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, RequestTime};
use crate::query::QueryParams;

use super::utils::{body_document, list_documents, wrap};

/// GET /api/v1/users
pub async fn get_all(
    State(state): State<AppState>,
    Extension(RequestTime(requested_at)): Extension<RequestTime>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(pairs) = query?;
    let params = QueryParams::from_pairs(pairs);
    let users = list_documents(&state.users, &params, state.query_defaults).await?;
    let results = users.len();

    Ok(ApiResponse::success(wrap("users", users))
        .with_results(results)
        .with_requested_at(requested_at))
}

/// POST /api/v1/users
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let user = state.users.create(body_document(payload)?).await?;
    Ok(ApiResponse::created(wrap("user", user)))
}

/// GET /api/v1/users/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let user = state.users.select_404(&id).await?;
    Ok(ApiResponse::success(wrap("user", user)))
}

/// PATCH /api/v1/users/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let user = state.users.update(&id, body_document(payload)?).await?;
    Ok(ApiResponse::success(wrap("user", user)))
}

/// DELETE /api/v1/users/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.users.delete(&id).await?;
    Ok(ApiResponse::<()>::no_content())
}
