pub mod org_service;
pub mod relation_service;
pub mod role_service;
pub mod tenant_service;
pub mod user_service;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::auth::AuthUser;
use crate::database::entity::Table;
use crate::database::models::Role;
use crate::database::scope::{ScopeError, ScopeRegistry};
use crate::database::store::StoreError;
use crate::filter::row::{DataScope, ScopeSource};

pub use org_service::OrgService;
pub use relation_service::{RoleMenuService, RoleOrgService, UserRoleService};
pub use role_service::RoleService;
pub use tenant_service::TenantService;
pub use user_service::UserService;

/// Business-rule violations surfaced to clients with a stable code.
/// These are recoverable at the request boundary and never touch cache
/// state.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("a role with this name and code already exists")]
    RoleDuplicate,

    #[error("role not found")]
    RoleNotFound,

    #[error("the system administrator role cannot be deleted")]
    RoleProtected,

    #[error("role still has assigned users")]
    RoleInUse,

    #[error("data scope grant exceeds caller permissions")]
    DataScopeDenied,

    #[error("unknown data scope value: {0}")]
    DataScopeInvalid(i32),

    #[error("unknown status value: {0}")]
    StatusInvalid(i32),

    #[error("tenant {0} is not registered")]
    TenantUnknown(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::RoleDuplicate => "ROLE_DUPLICATE",
            ServiceError::RoleNotFound => "ROLE_NOT_FOUND",
            ServiceError::RoleProtected => "ROLE_PROTECTED",
            ServiceError::RoleInUse => "ROLE_IN_USE",
            ServiceError::DataScopeDenied => "DATA_SCOPE_DENIED",
            ServiceError::DataScopeInvalid(_) => "DATA_SCOPE_INVALID",
            ServiceError::StatusInvalid(_) => "STATUS_INVALID",
            ServiceError::TenantUnknown(_) => "TENANT_UNKNOWN",
            ServiceError::Store(_) => "STORE_ERROR",
        }
    }
}

impl From<ScopeError> for ServiceError {
    fn from(err: ScopeError) -> Self {
        ServiceError::Store(StoreError::Scope(err))
    }
}

/// Connection id the caller's role rows live on; filter evictions are keyed
/// by it.
pub(crate) async fn role_conn_id(
    registry: &ScopeRegistry,
    auth: &AuthUser,
) -> Result<String, ServiceError> {
    let scope = registry
        .resolve(Role::AFFINITY, Some(auth))
        .await?
        .ok_or(ServiceError::TenantUnknown(auth.tenant_id))?;
    Ok(scope.conn_id().to_string())
}

/// Bridges the filter builder to the org and user services.
pub struct AccessSource {
    orgs: Arc<OrgService>,
    users: Arc<UserService>,
}

impl AccessSource {
    pub fn new(orgs: Arc<OrgService>, users: Arc<UserService>) -> Self {
        Self { orgs, users }
    }
}

#[async_trait]
impl ScopeSource for AccessSource {
    async fn max_data_scope(&self, user: &AuthUser) -> Result<DataScope, StoreError> {
        self.users.max_data_scope(user).await
    }

    async fn visible_org_ids(&self, user: &AuthUser) -> Result<Vec<i64>, StoreError> {
        self.orgs.visible_org_ids(user).await
    }
}
