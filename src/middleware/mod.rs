pub mod request_time;
pub mod response;

pub use request_time::{request_time_middleware, RequestTime};
pub use response::{ApiResponse, ApiResult};
