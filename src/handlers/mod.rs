pub mod auth;
pub mod role;
pub mod tenant;

use serde::Serialize;
use serde_json::{json, Value};

/// Standard success envelope
pub fn ok<T: Serialize>(data: T) -> axum::Json<Value> {
    axum::Json(json!({ "success": true, "data": data }))
}
