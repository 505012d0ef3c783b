use axum::{extract::Request, middleware::Next, response::Response};

use crate::database::document;

/// When the request arrived, as an RFC 3339 UTC timestamp
#[derive(Clone, Debug)]
pub struct RequestTime(pub String);

/// Stamps every request with its arrival time
pub async fn request_time_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(RequestTime(document::now_string()));
    next.run(request).await
}
