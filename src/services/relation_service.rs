//! Relation-table services. Every grant mutation synchronously evicts the
//! affected users' filter caches; stale scope data is a correctness bug,
//! not an eventual-consistency tradeoff.

use std::sync::Arc;

use crate::auth::AuthUser;
use crate::cache::CacheStore;
use crate::database::scope::ScopeRegistry;
use crate::database::store::AdminStore;
use crate::filter::row::invalidate_user_filters;
use crate::services::{role_conn_id, ServiceError};

pub struct RoleMenuService {
    registry: Arc<ScopeRegistry>,
    store: Arc<dyn AdminStore>,
    cache: CacheStore,
}

impl RoleMenuService {
    pub fn new(registry: Arc<ScopeRegistry>, store: Arc<dyn AdminStore>, cache: CacheStore) -> Self {
        Self { registry, store, cache }
    }

    pub async fn menu_ids(&self, role_id: i64) -> Result<Vec<i64>, ServiceError> {
        Ok(self.store.menu_ids_for_role(role_id).await?)
    }

    pub async fn grant(
        &self,
        auth: &AuthUser,
        role_id: i64,
        menu_ids: &[i64],
    ) -> Result<(), ServiceError> {
        self.store.replace_role_menus(role_id, menu_ids).await?;
        evict_role_users(&self.registry, self.store.as_ref(), &self.cache, auth, role_id).await
    }

    pub async fn delete_by_role(&self, role_id: i64) -> Result<u64, ServiceError> {
        Ok(self.store.delete_role_menus(role_id).await?)
    }
}

pub struct RoleOrgService {
    registry: Arc<ScopeRegistry>,
    store: Arc<dyn AdminStore>,
    cache: CacheStore,
}

impl RoleOrgService {
    pub fn new(registry: Arc<ScopeRegistry>, store: Arc<dyn AdminStore>, cache: CacheStore) -> Self {
        Self { registry, store, cache }
    }

    pub async fn org_ids(&self, role_id: i64) -> Result<Vec<i64>, ServiceError> {
        Ok(self.store.org_ids_for_role(role_id).await?)
    }

    pub async fn grant(
        &self,
        auth: &AuthUser,
        role_id: i64,
        org_ids: &[i64],
    ) -> Result<(), ServiceError> {
        self.store.replace_role_orgs(role_id, org_ids).await?;
        evict_role_users(&self.registry, self.store.as_ref(), &self.cache, auth, role_id).await
    }

    pub async fn delete_by_role(&self, role_id: i64) -> Result<u64, ServiceError> {
        Ok(self.store.delete_role_orgs(role_id).await?)
    }
}

pub struct UserRoleService {
    registry: Arc<ScopeRegistry>,
    store: Arc<dyn AdminStore>,
    cache: CacheStore,
}

impl UserRoleService {
    pub fn new(registry: Arc<ScopeRegistry>, store: Arc<dyn AdminStore>, cache: CacheStore) -> Self {
        Self { registry, store, cache }
    }

    pub async fn user_ids(&self, role_id: i64) -> Result<Vec<i64>, ServiceError> {
        Ok(self.store.user_ids_for_role(role_id).await?)
    }

    pub async fn role_ids(&self, user_id: i64) -> Result<Vec<i64>, ServiceError> {
        Ok(self.store.role_ids_for_user(user_id).await?)
    }

    pub async fn assign(
        &self,
        auth: &AuthUser,
        user_id: i64,
        role_ids: &[i64],
    ) -> Result<(), ServiceError> {
        self.store.replace_user_roles(user_id, role_ids).await?;
        let conn_id = role_conn_id(&self.registry, auth).await?;
        invalidate_user_filters(&self.cache, user_id, &conn_id).await;
        Ok(())
    }

    pub async fn delete_by_role(&self, role_id: i64) -> Result<u64, ServiceError> {
        Ok(self.store.delete_user_roles_for_role(role_id).await?)
    }
}

/// Evict the filter caches of every user currently holding a role.
pub(crate) async fn evict_role_users(
    registry: &ScopeRegistry,
    store: &dyn AdminStore,
    cache: &CacheStore,
    auth: &AuthUser,
    role_id: i64,
) -> Result<(), ServiceError> {
    let conn_id = role_conn_id(registry, auth).await?;
    for user_id in store.user_ids_for_role(role_id).await? {
        invalidate_user_filters(cache, user_id, &conn_id).await;
    }
    Ok(())
}
