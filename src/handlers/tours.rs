use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Extension, Path, Query, State,
    },
    Json,
};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, RequestTime};
use crate::query::QueryParams;
use crate::services::tour_stats;

use super::utils::{body_document, list_documents, wrap};

/// GET /api/v1/tours
pub async fn get_all(
    State(state): State<AppState>,
    Extension(RequestTime(requested_at)): Extension<RequestTime>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(pairs) = query?;
    let params = QueryParams::from_pairs(pairs);
    let tours = list_documents(&state.tours, &params, state.query_defaults).await?;
    let results = tours.len();

    Ok(ApiResponse::success(wrap("tours", tours))
        .with_results(results)
        .with_requested_at(requested_at))
}

/// GET /api/v1/tours/top-5-cheap
pub async fn top_five_cheap(
    state: State<AppState>,
    request_time: Extension<RequestTime>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> ApiResult<Value> {
    let Query(mut pairs) = query?;
    pairs.retain(|(key, _)| !matches!(key.as_str(), "limit" | "sort" | "fields"));
    pairs.push(("limit".to_string(), "5".to_string()));
    pairs.push(("sort".to_string(), "-ratingsAverage,price".to_string()));
    pairs.push(("fields".to_string(), "name,price,ratingsAverage,summary,difficulty".to_string()));

    get_all(state, request_time, Ok(Query(pairs))).await
}

/// POST /api/v1/tours
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let tour = state.tours.create(body_document(payload)?).await?;
    Ok(ApiResponse::created(wrap("tour", tour)))
}

/// GET /api/v1/tours/:id
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    let tour = state.tours.select_404(&id).await?;
    Ok(ApiResponse::success(wrap("tour", tour)))
}

/// PATCH /api/v1/tours/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Value> {
    let tour = state.tours.update(&id, body_document(payload)?).await?;
    Ok(ApiResponse::success(wrap("tour", tour)))
}

/// DELETE /api/v1/tours/:id
pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    state.tours.delete(&id).await?;
    Ok(ApiResponse::<()>::no_content())
}

/// GET /api/v1/tours/tour-stats
pub async fn stats(State(state): State<AppState>) -> ApiResult<Value> {
    let stats = tour_stats::load_tour_stats(&state.tours).await?;
    Ok(ApiResponse::success(json!({ "stats": stats })))
}

/// GET /api/v1/tours/monthly-plan/:year
pub async fn monthly_plan(State(state): State<AppState>, Path(year): Path<String>) -> ApiResult<Value> {
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid year: {}.", year)))?;

    let plan = tour_stats::load_monthly_plan(&state.tours, year).await?;
    Ok(ApiResponse::success(json!({ "plan": plan })))
}
