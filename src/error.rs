// HTTP API Error Types
use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::database::{DatabaseError, StoreError};
use crate::hooks::HookError;
use crate::query::QueryError;

/// Message returned for failures whose details stay in the logs
pub const GENERIC_ERROR_MESSAGE: &str = "Something went very wrong!";

/// HTTP API error with status codes and client-safe messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<BTreeMap<String, String>>,
    },
    InvalidJson(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// `fail` for client errors, `error` for server errors
    pub fn jsend_status(&self) -> &'static str {
        if self.status_code() < 500 {
            "fail"
        } else {
            "error"
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }

    /// JSend error body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "status": self.jsend_status(),
            "message": self.message(),
            "code": self.error_code(),
        });

        if let ApiError::ValidationError { field_errors: Some(field_errors), .. } = self {
            response["fieldErrors"] = json!(field_errors);
        }

        response
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<BTreeMap<String, String>>) -> Self {
        ApiError::ValidationError { message: message.into(), field_errors }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<HookError> for ApiError {
    fn from(err: HookError) -> Self {
        match err {
            HookError::Validation { ref field_errors } => {
                let field_errors = field_errors.clone();
                ApiError::validation_error(err.to_string(), Some(field_errors))
            }
            HookError::Timeout(msg) => {
                tracing::error!("Hook timeout: {}", msg);
                ApiError::internal_server_error(GENERIC_ERROR_MESSAGE)
            }
            HookError::System(msg) => {
                tracing::error!("Hook system error: {}", msg);
                ApiError::internal_server_error(GENERIC_ERROR_MESSAGE)
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Never expose driver details to clients
        tracing::error!("Store error: {}", err);
        ApiError::internal_server_error(GENERIC_ERROR_MESSAGE)
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Store(err) => err.into(),
            DatabaseError::Hook(err) => err.into(),
            DatabaseError::Query(err) => err.into(),
            DatabaseError::NotFound(msg) => ApiError::not_found(msg),
            DatabaseError::Duplicate { .. } => ApiError::conflict(err.to_string()),
            DatabaseError::InvalidInput(msg) => ApiError::bad_request(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_json(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request(rejection.body_text())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_fail_and_server_errors_error() {
        let body = ApiError::not_found("No tour found with that ID").to_json();
        assert_eq!(body["status"], "fail");
        assert_eq!(body["message"], "No tour found with that ID");
        assert_eq!(body["code"], "NOT_FOUND");

        let body = ApiError::from(StoreError::Serialization("tours row is not an object".into())).to_json();
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], GENERIC_ERROR_MESSAGE);
    }

    #[test]
    fn validation_errors_carry_field_messages() {
        let err = ApiError::from(HookError::validation("price", "A tour must have a price"));
        assert_eq!(err.status_code(), 400);
        let body = err.to_json();
        assert_eq!(body["message"], "Invalid input data. A tour must have a price");
        assert_eq!(body["fieldErrors"]["price"], "A tour must have a price");
    }

    #[test]
    fn database_errors_map_to_statuses() {
        let dup = DatabaseError::Duplicate { field: "name".into(), value: "\"The Forest Hiker\"".into() };
        let err = ApiError::from(dup);
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.message(), "Duplicate field value: \"The Forest Hiker\". Please use another value!");

        let cast = DatabaseError::Query(QueryError::Cast { field: "price".into(), value: "abc".into() });
        assert_eq!(ApiError::from(cast).message(), "Invalid price: abc.");
    }

    #[test]
    fn query_string_rejections_are_jsend_failures() {
        let uri: axum::http::Uri = "/api/v1/tours?page=two".parse().unwrap();
        let rejection = axum::extract::Query::<std::collections::HashMap<String, u32>>::try_from_uri(&uri).unwrap_err();

        let err = ApiError::from(rejection);
        assert_eq!(err.status_code(), 400);
        let body = err.to_json();
        assert_eq!(body["status"], "fail");
        assert_eq!(body["code"], "BAD_REQUEST");
        assert!(body["message"].as_str().unwrap().starts_with("Failed to deserialize query string"));
    }
}
