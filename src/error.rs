// HTTP API error envelope
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::auth::JwtError;
use crate::database::scope::ScopeError;
use crate::database::store::StoreError;
use crate::services::ServiceError;

/// Client-facing error: HTTP status plus a stable machine-readable code.
/// Internal failures are logged with detail and surfaced with a generic
/// message.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self { status, code, message: message.into() }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, code, message)
    }

    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, code, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR", message)
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn error_code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn to_json(&self) -> Value {
        json!({
            "error": true,
            "code": self.code,
            "message": self.message,
        })
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.to_json())).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let code = err.code();
        match &err {
            ServiceError::RoleDuplicate => ApiError::conflict(code, err.to_string()),
            ServiceError::RoleNotFound => ApiError::not_found(code, err.to_string()),
            ServiceError::RoleProtected => ApiError::bad_request(code, err.to_string()),
            ServiceError::RoleInUse => ApiError::conflict(code, err.to_string()),
            ServiceError::DataScopeDenied => ApiError::forbidden(code, err.to_string()),
            ServiceError::DataScopeInvalid(_) | ServiceError::StatusInvalid(_) => {
                ApiError::bad_request(code, err.to_string())
            }
            ServiceError::TenantUnknown(_) => ApiError::not_found(code, err.to_string()),
            ServiceError::Store(store) => store_error(store),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        store_error(&err)
    }
}

impl From<ScopeError> for ApiError {
    fn from(err: ScopeError) -> Self {
        scope_error(&err)
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::unauthorized(err.to_string())
    }
}

fn store_error(err: &StoreError) -> ApiError {
    match err {
        StoreError::Scope(scope) => scope_error(scope),
        StoreError::NotFound(msg) => ApiError::not_found("NOT_FOUND", msg.clone()),
        StoreError::Sqlx(e) => {
            // Log the real error but never leak SQL detail to clients
            tracing::error!("database error: {}", e);
            ApiError::internal("An error occurred while processing your request")
        }
        StoreError::Query(msg) => {
            tracing::error!("query build error: {}", msg);
            ApiError::internal("An error occurred while processing your request")
        }
    }
}

fn scope_error(err: &ScopeError) -> ApiError {
    match err {
        ScopeError::Unavailable(what) => ApiError::not_found(
            "FEATURE_UNAVAILABLE",
            format!("'{}' is not available for this tenant", what),
        ),
        other => {
            tracing::error!("tenant scope configuration error: {}", other);
            ApiError::internal("Tenant database configuration error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_carry_stable_codes() {
        let err: ApiError = ServiceError::RoleInUse.into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.error_code(), "ROLE_IN_USE");
        assert_eq!(err.to_json()["code"], "ROLE_IN_USE");
        assert_eq!(err.to_json()["error"], true);
    }

    #[test]
    fn unknown_tenant_maps_to_not_found() {
        let err: ApiError = ServiceError::TenantUnknown(42).into();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_code(), "TENANT_UNKNOWN");
    }

    #[test]
    fn sql_detail_never_reaches_the_client() {
        let err: ApiError = StoreError::Query("SELECT secret FROM ...".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message().contains("SELECT"));
    }
}
