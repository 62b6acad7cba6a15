use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::AuthUser;
use crate::database::models::{Role, Tenant, User};
use crate::database::scope::ScopeError;
use crate::filter::error::FilterError;
use crate::filter::row::{DataScope, FilterSet};
use crate::types::Page;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Scope(#[from] ScopeError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("query error: {0}")]
    Query(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl From<FilterError> for StoreError {
    fn from(err: FilterError) -> Self {
        StoreError::Query(err.to_string())
    }
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolePageQuery {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for RolePageQuery {
    fn default() -> Self {
        Self { name: None, code: None, page: default_page(), page_size: default_page_size() }
    }
}

/// Role table access. Reads carry the caller's row-filter set; the generic
/// update never touches the data_scope column (that column moves only
/// through `set_role_data_scope`).
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn page_roles(
        &self,
        auth: &AuthUser,
        guards: &FilterSet,
        query: &RolePageQuery,
    ) -> Result<Page<Role>, StoreError>;

    async fn list_roles(&self, auth: &AuthUser, guards: &FilterSet)
        -> Result<Vec<Role>, StoreError>;

    async fn find_role(&self, auth: &AuthUser, id: i64) -> Result<Option<Role>, StoreError>;

    async fn role_duplicate_exists(
        &self,
        auth: &AuthUser,
        name: &str,
        code: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError>;

    async fn insert_role(&self, auth: &AuthUser, role: &Role) -> Result<(), StoreError>;

    async fn update_role(&self, auth: &AuthUser, role: &Role) -> Result<(), StoreError>;

    async fn set_role_status(&self, auth: &AuthUser, id: i64, status: i32)
        -> Result<u64, StoreError>;

    async fn set_role_data_scope(
        &self,
        auth: &AuthUser,
        id: i64,
        data_scope: DataScope,
    ) -> Result<(), StoreError>;

    async fn delete_role(&self, auth: &AuthUser, id: i64) -> Result<(), StoreError>;
}

/// Relation tables (role-menu, role-org, user-role); these live in the main
/// database regardless of the caller's tenant.
#[async_trait]
pub trait RelationStore: Send + Sync {
    async fn user_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError>;
    async fn role_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>, StoreError>;
    async fn menu_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError>;
    async fn org_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError>;
    async fn org_ids_for_roles(&self, role_ids: &[i64]) -> Result<Vec<i64>, StoreError>;

    async fn replace_role_menus(&self, role_id: i64, menu_ids: &[i64]) -> Result<(), StoreError>;
    async fn replace_role_orgs(&self, role_id: i64, org_ids: &[i64]) -> Result<(), StoreError>;
    async fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<(), StoreError>;

    async fn delete_role_menus(&self, role_id: i64) -> Result<u64, StoreError>;
    async fn delete_role_orgs(&self, role_id: i64) -> Result<u64, StoreError>;
    async fn delete_user_roles_for_role(&self, role_id: i64) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait OrgStore: Send + Sync {
    async fn all_org_ids(&self, auth: &AuthUser) -> Result<Vec<i64>, StoreError>;
    /// The organization plus all of its descendants
    async fn org_subtree_ids(&self, auth: &AuthUser, root: i64) -> Result<Vec<i64>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user(&self, auth: &AuthUser, id: i64) -> Result<Option<User>, StoreError>;
    /// Data scopes of the user's enabled roles
    async fn data_scopes_for_user(
        &self,
        auth: &AuthUser,
        user_id: i64,
    ) -> Result<Vec<DataScope>, StoreError>;
}

#[async_trait]
pub trait TenantStore: Send + Sync {
    async fn all_tenants(&self) -> Result<Vec<Tenant>, StoreError>;
    /// Enabled tenants with dedicated-database isolation
    async fn db_isolated_tenants(&self) -> Result<Vec<Tenant>, StoreError>;
}

/// The full storage collaborator the domain services depend on.
pub trait AdminStore: RoleStore + RelationStore + OrgStore + UserStore + TenantStore {}

impl<T: RoleStore + RelationStore + OrgStore + UserStore + TenantStore> AdminStore for T {}
