use axum::{extract::rejection::JsonRejection, Json};
use serde_json::Value;

use crate::database::{Document, Repository};
use crate::error::ApiError;
use crate::query::{QueryDefaults, QueryFeatures, QueryParams};

/// Run the client's query string against a collection: filter, sort,
/// projection, then pagination. Asking for a page past the end is a 404.
pub async fn list_documents(
    repository: &Repository,
    params: &QueryParams,
    defaults: QueryDefaults,
) -> Result<Vec<Document>, ApiError> {
    let mut features = QueryFeatures::with_defaults(repository.query(), params, defaults);
    features.filter()?.sort()?.limit_fields()?.paginate()?;

    if features.page_requested() {
        let total = features.query().count().await?;
        if features.window().skip >= total {
            return Err(ApiError::not_found("This page does not exist"));
        }
    }

    Ok(features.query().execute().await?)
}

/// JSON object request body
pub fn body_document(payload: Result<Json<Value>, JsonRejection>) -> Result<Document, ApiError> {
    let Json(value) = payload?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("Request body must be a JSON object")),
    }
}

/// `{"<key>": value}` payload for the `data` member
pub fn wrap(key: &str, value: impl Into<Value>) -> Value {
    let mut data = serde_json::Map::new();
    data.insert(key.to_string(), value.into());
    Value::Object(data)
}
