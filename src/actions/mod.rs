pub mod flights;
pub mod status;
pub mod watchlist;

pub use flights::*;
pub use status::*;
pub use watchlist::*;

use axum::{http::StatusCode, response::Json};
use serde::Serialize;
use serde_json::json;

/// Envelope for single-object responses
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// Envelope for list responses
#[derive(Debug, Serialize)]
pub struct DataListResponse<T> {
    pub data: Vec<T>,
}

/// JSON error body: `{"errors": "<message>"}`
pub fn json_error(status: StatusCode, message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "errors": message })))
}
