use axum::extract::Extension;
use axum::Json;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::ok;

pub async fn whoami(Extension(user): Extension<AuthUser>) -> Result<Json<Value>, ApiError> {
    Ok(ok(json!({
        "user_id": user.user_id,
        "tenant_id": user.tenant_id,
        "org_id": user.org_id,
        "account": user.account,
        "account_type": user.account_type.as_i32(),
    })))
}
