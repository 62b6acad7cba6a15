use axum::extract::{Extension, State};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::database::models::Tenant;
use crate::error::ApiError;
use crate::handlers::ok;
use crate::server::AppState;

/// Tenant row without connection material
#[derive(Debug, Serialize)]
pub struct TenantOutput {
    pub id: i64,
    pub host: Option<String>,
    pub tenant_type: i32,
    pub db_type: String,
    pub status: i32,
    pub remark: Option<String>,
}

impl From<Tenant> for TenantOutput {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            host: t.host,
            tenant_type: t.tenant_type,
            db_type: t.db_type,
            status: t.status,
            remark: t.remark,
        }
    }
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let tenants: Vec<TenantOutput> =
        state.tenants.db_tenants().await?.into_iter().map(TenantOutput::from).collect();
    Ok(ok(tenants))
}

pub async fn refresh_cache(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    Ok(ok(state.tenants.refresh_registry_cache().await?))
}
