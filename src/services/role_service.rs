use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::cache::CacheStore;
use crate::database::models::Role;
use crate::database::scope::ScopeRegistry;
use crate::database::store::{AdminStore, RolePageQuery};
use crate::filter::row::{
    invalidate_user_filters, DataScope, FilterSet, RowFilterBuilder, ScopeSource,
};
use crate::services::relation_service::{RoleMenuService, RoleOrgService, UserRoleService};
use crate::services::{role_conn_id, ServiceError};
use crate::types::{next_id, Page, Status};

/// Code of the built-in system administrator role; it can never be deleted.
pub const SYS_ADMIN_ROLE_CODE: &str = "sys_admin";

#[derive(Debug, Clone, Deserialize)]
pub struct AddRoleInput {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub order_no: i32,
    pub remark: Option<String>,
    #[serde(default)]
    pub menu_id_list: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoleInput {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub order_no: i32,
    pub remark: Option<String>,
    #[serde(default)]
    pub menu_id_list: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantDataScopeInput {
    pub id: i64,
    pub data_scope: i32,
    #[serde(default)]
    pub org_id_list: Vec<i64>,
}

pub struct RoleService {
    registry: Arc<ScopeRegistry>,
    store: Arc<dyn AdminStore>,
    cache: CacheStore,
    filters: Arc<RowFilterBuilder>,
    source: Arc<dyn ScopeSource>,
    role_menus: Arc<RoleMenuService>,
    role_orgs: Arc<RoleOrgService>,
    user_roles: Arc<UserRoleService>,
}

impl RoleService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<ScopeRegistry>,
        store: Arc<dyn AdminStore>,
        cache: CacheStore,
        filters: Arc<RowFilterBuilder>,
        source: Arc<dyn ScopeSource>,
        role_menus: Arc<RoleMenuService>,
        role_orgs: Arc<RoleOrgService>,
        user_roles: Arc<UserRoleService>,
    ) -> Self {
        Self { registry, store, cache, filters, source, role_menus, role_orgs, user_roles }
    }

    async fn guards(&self, auth: &AuthUser) -> Result<FilterSet, ServiceError> {
        let conn_id = role_conn_id(&self.registry, auth).await?;
        Ok(self.filters.build(&conn_id, auth, self.source.as_ref()).await?)
    }

    pub async fn page(
        &self,
        auth: &AuthUser,
        query: RolePageQuery,
    ) -> Result<Page<Role>, ServiceError> {
        let guards = self.guards(auth).await?;
        Ok(self.store.page_roles(auth, &guards, &query).await?)
    }

    pub async fn list(&self, auth: &AuthUser) -> Result<Vec<Role>, ServiceError> {
        let guards = self.guards(auth).await?;
        Ok(self.store.list_roles(auth, &guards).await?)
    }

    pub async fn add(&self, auth: &AuthUser, input: AddRoleInput) -> Result<i64, ServiceError> {
        if self.store.role_duplicate_exists(auth, &input.name, &input.code, None).await? {
            return Err(ServiceError::RoleDuplicate);
        }

        let role = Role {
            id: next_id(),
            name: input.name,
            code: input.code,
            order_no: input.order_no,
            data_scope: DataScope::SelfOnly.as_i32(),
            status: Status::Enabled.as_i32(),
            remark: input.remark,
            tenant_id: Some(auth.tenant_id),
            create_time: Some(Utc::now()),
            update_time: None,
            create_user_id: Some(auth.user_id),
            create_user_name: Some(auth.account.clone()),
            update_user_id: None,
            update_user_name: None,
            create_org_id: auth.org_id,
            is_delete: false,
        };
        self.store.insert_role(auth, &role).await?;

        if !input.menu_id_list.is_empty() {
            self.role_menus.grant(auth, role.id, &input.menu_id_list).await?;
        }
        Ok(role.id)
    }

    pub async fn update(&self, auth: &AuthUser, input: UpdateRoleInput) -> Result<(), ServiceError> {
        if self
            .store
            .role_duplicate_exists(auth, &input.name, &input.code, Some(input.id))
            .await?
        {
            return Err(ServiceError::RoleDuplicate);
        }

        let mut role =
            self.store.find_role(auth, input.id).await?.ok_or(ServiceError::RoleNotFound)?;
        role.name = input.name;
        role.code = input.code;
        role.order_no = input.order_no;
        role.remark = input.remark;
        self.store.update_role(auth, &role).await?;

        if !input.menu_id_list.is_empty() {
            self.role_menus.grant(auth, role.id, &input.menu_id_list).await?;
        }
        Ok(())
    }

    /// Delete a role and cascade its grants. The system-admin role and any
    /// role still assigned to users are protected; protected deletions leave
    /// every relation row in place.
    pub async fn delete(&self, auth: &AuthUser, id: i64) -> Result<(), ServiceError> {
        let role = self.store.find_role(auth, id).await?.ok_or(ServiceError::RoleNotFound)?;
        if role.code == SYS_ADMIN_ROLE_CODE {
            return Err(ServiceError::RoleProtected);
        }

        let user_ids = self.user_roles.user_ids(id).await?;
        if !user_ids.is_empty() {
            return Err(ServiceError::RoleInUse);
        }

        self.store.delete_role(auth, id).await?;
        self.role_orgs.delete_by_role(id).await?;
        self.user_roles.delete_by_role(id).await?;
        self.role_menus.delete_by_role(id).await?;
        Ok(())
    }

    pub async fn grant_menu(
        &self,
        auth: &AuthUser,
        role_id: i64,
        menu_ids: &[i64],
    ) -> Result<(), ServiceError> {
        self.store.find_role(auth, role_id).await?.ok_or(ServiceError::RoleNotFound)?;
        self.role_menus.grant(auth, role_id, menu_ids).await
    }

    pub async fn grant_data_scope(
        &self,
        auth: &AuthUser,
        input: GrantDataScopeInput,
    ) -> Result<(), ServiceError> {
        // Evict the filter caches of everyone holding this role before the
        // grant lands, so no request started after this call sees stale scope
        let conn_id = role_conn_id(&self.registry, auth).await?;
        for user_id in self.user_roles.user_ids(input.id).await? {
            invalidate_user_filters(&self.cache, user_id, &conn_id).await;
        }

        self.store.find_role(auth, input.id).await?.ok_or(ServiceError::RoleNotFound)?;
        let scope = DataScope::from_i32(input.data_scope)
            .ok_or(ServiceError::DataScopeInvalid(input.data_scope))?;

        if !auth.is_super_admin() {
            // Only super admins may hand out unrestricted visibility
            if scope == DataScope::All {
                return Err(ServiceError::DataScopeDenied);
            }
            // Custom grants must stay inside the granter's own visible set
            if scope == DataScope::Custom && !input.org_id_list.is_empty() {
                let own = self.source.visible_org_ids(auth).await?;
                if own.is_empty() || !input.org_id_list.iter().all(|id| own.contains(id)) {
                    return Err(ServiceError::DataScopeDenied);
                }
            }
        }

        self.store.set_role_data_scope(auth, input.id, scope).await?;
        self.role_orgs.grant(auth, input.id, &input.org_id_list).await
    }

    pub async fn set_status(
        &self,
        auth: &AuthUser,
        id: i64,
        status: i32,
    ) -> Result<u64, ServiceError> {
        let status = Status::from_i32(status).ok_or(ServiceError::StatusInvalid(status))?;
        Ok(self.store.set_role_status(auth, id, status.as_i32()).await?)
    }

    pub async fn own_menu_ids(&self, role_id: i64) -> Result<Vec<i64>, ServiceError> {
        self.role_menus.menu_ids(role_id).await
    }

    pub async fn own_org_ids(&self, role_id: i64) -> Result<Vec<i64>, ServiceError> {
        self.role_orgs.org_ids(role_id).await
    }
}
