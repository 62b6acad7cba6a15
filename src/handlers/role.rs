use axum::extract::{Extension, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::database::store::RolePageQuery;
use crate::error::ApiError;
use crate::handlers::ok;
use crate::server::AppState;
use crate::services::role_service::{AddRoleInput, GrantDataScopeInput, UpdateRoleInput};

#[derive(Debug, Deserialize)]
pub struct IdInput {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoleMenuInput {
    pub id: i64,
    #[serde(default)]
    pub menu_id_list: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RoleStatusInput {
    pub id: i64,
    pub status: i32,
}

pub async fn page(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<RolePageQuery>,
) -> Result<Json<Value>, ApiError> {
    Ok(ok(state.roles.page(&user, query).await?))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    Ok(ok(state.roles.list(&user).await?))
}

pub async fn add(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<AddRoleInput>,
) -> Result<Json<Value>, ApiError> {
    Ok(ok(state.roles.add(&user, input).await?))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<UpdateRoleInput>,
) -> Result<Json<Value>, ApiError> {
    state.roles.update(&user, input).await?;
    Ok(ok(()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<IdInput>,
) -> Result<Json<Value>, ApiError> {
    state.roles.delete(&user, input.id).await?;
    Ok(ok(()))
}

pub async fn grant_menu(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<RoleMenuInput>,
) -> Result<Json<Value>, ApiError> {
    state.roles.grant_menu(&user, input.id, &input.menu_id_list).await?;
    Ok(ok(()))
}

pub async fn grant_data_scope(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<GrantDataScopeInput>,
) -> Result<Json<Value>, ApiError> {
    state.roles.grant_data_scope(&user, input).await?;
    Ok(ok(()))
}

pub async fn set_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(input): Json<RoleStatusInput>,
) -> Result<Json<Value>, ApiError> {
    Ok(ok(state.roles.set_status(&user, input.id, input.status).await?))
}

pub async fn own_menus(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Query(input): Query<IdInput>,
) -> Result<Json<Value>, ApiError> {
    Ok(ok(state.roles.own_menu_ids(input.id).await?))
}

pub async fn own_orgs(
    State(state): State<Arc<AppState>>,
    Extension(_user): Extension<AuthUser>,
    Query(input): Query<IdInput>,
) -> Result<Json<Value>, ApiError> {
    Ok(ok(state.roles.own_org_ids(input.id).await?))
}
