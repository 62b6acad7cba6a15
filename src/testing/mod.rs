//! Shared test support: deterministic cipher, a lazily-connecting scope
//! registry, caller identities, tenant row factories, and an in-memory
//! `AdminStore` for exercising domain services without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::auth::AuthUser;
use crate::cache::CacheStore;
use crate::config::{ConnectionSettings, DatabaseOptions};
use crate::crypto::Cipher;
use crate::database::entity::Table;
use crate::database::models::{Org, Role, RoleMenu, RoleOrg, Tenant, TenantType, User, UserRole};
use crate::database::scope::{ScopeRegistry, DEFAULT_TENANT_ID};
use crate::database::store::{
    OrgStore, RelationStore, RolePageQuery, RoleStore, StoreError, TenantStore, UserStore,
};
use crate::filter::row::{DataScope, FilterSet, RowCondition};
use crate::types::{next_id, AccountType, Page, Status};

pub fn cipher() -> Cipher {
    Cipher::from_key_material("atrium-test-key").unwrap()
}

pub fn registry(cache: CacheStore) -> ScopeRegistry {
    let options = DatabaseOptions {
        main: "main".to_string(),
        log: Some("log".to_string()),
        connections: vec![
            ConnectionSettings {
                conn_id: "main".to_string(),
                db_kind: "postgres".to_string(),
                url: "postgres://app@localhost:5432/atrium".to_string(),
                snake_case: true,
            },
            ConnectionSettings {
                conn_id: "log".to_string(),
                db_kind: "postgres".to_string(),
                url: "postgres://app@localhost:5432/atrium_log".to_string(),
                snake_case: false,
            },
            ConnectionSettings {
                conn_id: "analytics".to_string(),
                db_kind: "postgres".to_string(),
                url: "postgres://app@localhost:5432/atrium_bi".to_string(),
                snake_case: false,
            },
        ],
    };
    ScopeRegistry::open(&options, cipher(), cache).unwrap()
}

pub fn super_admin() -> AuthUser {
    AuthUser {
        user_id: 1,
        tenant_id: DEFAULT_TENANT_ID,
        org_id: Some(100),
        account: "superadmin".to_string(),
        account_type: AccountType::SuperAdmin,
    }
}

pub fn normal_user(user_id: i64, org_id: Option<i64>) -> AuthUser {
    AuthUser {
        user_id,
        tenant_id: DEFAULT_TENANT_ID,
        org_id,
        account: format!("user{}", user_id),
        account_type: AccountType::Normal,
    }
}

pub fn user_for_tenant(user_id: i64, tenant_id: i64) -> AuthUser {
    AuthUser {
        user_id,
        tenant_id,
        org_id: None,
        account: format!("user{}", user_id),
        account_type: AccountType::Normal,
    }
}

fn tenant_row(id: i64, tenant_type: TenantType, connection: String) -> Tenant {
    Tenant {
        id,
        org_id: None,
        user_id: None,
        host: Some(format!("tenant{}.example.com", id)),
        tenant_type: tenant_type.as_i32(),
        db_type: "postgres".to_string(),
        connection,
        slave_connections: None,
        status: Status::Enabled.as_i32(),
        remark: None,
        create_time: Some(Utc::now()),
        update_time: None,
        create_user_id: None,
        create_user_name: None,
        update_user_id: None,
        update_user_name: None,
        create_org_id: None,
        is_delete: false,
    }
}

/// Shared-schema tenant; its connection field is never decrypted.
pub fn id_tenant(id: i64) -> Tenant {
    tenant_row(id, TenantType::Id, String::new())
}

/// Dedicated-database tenant with its connection URL sealed by `cipher`.
pub fn db_tenant(cipher: &Cipher, id: i64, url: &str) -> Tenant {
    tenant_row(id, TenantType::Db, cipher.encrypt(url).unwrap())
}

#[derive(Default)]
struct State {
    roles: HashMap<i64, Role>,
    role_menus: Vec<RoleMenu>,
    role_orgs: Vec<RoleOrg>,
    user_roles: Vec<UserRole>,
    orgs: HashMap<i64, Org>,
    users: HashMap<i64, User>,
    tenants: Vec<Tenant>,
}

/// In-memory storage collaborator mirroring the Postgres store's semantics.
pub struct MemoryStore {
    state: Mutex<State>,
    data_scope_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self { state: Mutex::new(State::default()), data_scope_calls: AtomicUsize::new(0) }
    }

    fn role_row(id: i64, name: &str, code: &str, scope: DataScope, creator: Option<i64>) -> Role {
        Role {
            id,
            name: name.to_string(),
            code: code.to_string(),
            order_no: 100,
            data_scope: scope.as_i32(),
            status: Status::Enabled.as_i32(),
            remark: None,
            tenant_id: Some(DEFAULT_TENANT_ID),
            create_time: Some(Utc::now()),
            update_time: None,
            create_user_id: creator,
            create_user_name: None,
            update_user_id: None,
            update_user_name: None,
            create_org_id: None,
            is_delete: false,
        }
    }

    pub async fn seed_role(&self, id: i64, name: &str, code: &str, scope: DataScope) {
        let mut state = self.state.lock().await;
        state.roles.insert(id, Self::role_row(id, name, code, scope, None));
    }

    pub async fn seed_role_created_by(&self, id: i64, name: &str, code: &str, creator: i64) {
        let mut state = self.state.lock().await;
        state
            .roles
            .insert(id, Self::role_row(id, name, code, DataScope::SelfOnly, Some(creator)));
    }

    pub async fn seed_user_role(&self, user_id: i64, role_id: i64) {
        let mut state = self.state.lock().await;
        state.user_roles.push(UserRole { id: next_id(), user_id, role_id });
    }

    pub async fn seed_role_menu(&self, role_id: i64, menu_id: i64) {
        let mut state = self.state.lock().await;
        state.role_menus.push(RoleMenu { id: next_id(), role_id, menu_id });
    }

    pub async fn seed_role_org(&self, role_id: i64, org_id: i64) {
        let mut state = self.state.lock().await;
        state.role_orgs.push(RoleOrg { id: next_id(), role_id, org_id });
    }

    pub async fn seed_org(&self, id: i64, pid: i64) {
        let mut state = self.state.lock().await;
        state.orgs.insert(
            id,
            Org {
                id,
                pid,
                name: format!("org {}", id),
                code: id.to_string(),
                level: 1,
                status: Status::Enabled.as_i32(),
                tenant_id: Some(DEFAULT_TENANT_ID),
                create_time: Some(Utc::now()),
                update_time: None,
                create_user_id: None,
                create_user_name: None,
                update_user_id: None,
                update_user_name: None,
                create_org_id: None,
                is_delete: false,
            },
        );
    }

    pub async fn seed_tenant(&self, tenant: Tenant) {
        let mut state = self.state.lock().await;
        state.tenants.push(tenant);
    }

    /// Live (not soft-deleted) role by id
    pub async fn role(&self, id: i64) -> Option<Role> {
        let state = self.state.lock().await;
        state.roles.get(&id).filter(|r| !r.is_delete).cloned()
    }

    pub async fn user_role_count(&self, role_id: i64) -> usize {
        let state = self.state.lock().await;
        state.user_roles.iter().filter(|r| r.role_id == role_id).count()
    }

    pub async fn role_menu_count(&self, role_id: i64) -> usize {
        let state = self.state.lock().await;
        state.role_menus.iter().filter(|r| r.role_id == role_id).count()
    }

    pub async fn role_org_count(&self, role_id: i64) -> usize {
        let state = self.state.lock().await;
        state.role_orgs.iter().filter(|r| r.role_id == role_id).count()
    }

    pub fn data_scope_calls(&self) -> usize {
        self.data_scope_calls.load(Ordering::Relaxed)
    }

    fn passes_guards(role: &Role, guards: &FilterSet) -> bool {
        guards.conditions_for(<Role as Table>::TABLE).iter().all(|condition| match condition {
            RowCondition::CreatorEquals(user_id) => role.create_user_id == Some(*user_id),
            RowCondition::OrgIn(org_ids) => {
                role.create_org_id.map(|id| org_ids.contains(&id)).unwrap_or(false)
            }
            RowCondition::Where(_) => true,
        })
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleStore for MemoryStore {
    async fn page_roles(
        &self,
        auth: &AuthUser,
        guards: &FilterSet,
        query: &RolePageQuery,
    ) -> Result<Page<Role>, StoreError> {
        let state = self.state.lock().await;
        let mut items: Vec<Role> = state
            .roles
            .values()
            .filter(|r| !r.is_delete)
            .filter(|r| {
                query.name.as_deref().map(|n| r.name.contains(n.trim())).unwrap_or(true)
            })
            .filter(|r| {
                query.code.as_deref().map(|c| r.code.contains(c.trim())).unwrap_or(true)
            })
            .filter(|r| auth.is_super_admin() || r.create_user_id == Some(auth.user_id))
            .filter(|r| Self::passes_guards(r, guards))
            .cloned()
            .collect();
        items.sort_by_key(|r| r.order_no);

        let total = items.len() as i64;
        let page = query.page.max(1);
        let start = ((page - 1) * query.page_size) as usize;
        let items: Vec<Role> =
            items.into_iter().skip(start).take(query.page_size as usize).collect();
        Ok(Page::new(items, total, page, query.page_size))
    }

    async fn list_roles(
        &self,
        auth: &AuthUser,
        guards: &FilterSet,
    ) -> Result<Vec<Role>, StoreError> {
        let owned: Vec<i64> = {
            let state = self.state.lock().await;
            state
                .user_roles
                .iter()
                .filter(|r| r.user_id == auth.user_id)
                .map(|r| r.role_id)
                .collect()
        };

        let state = self.state.lock().await;
        let mut items: Vec<Role> = state
            .roles
            .values()
            .filter(|r| !r.is_delete)
            .filter(|r| {
                auth.is_super_admin()
                    || r.create_user_id == Some(auth.user_id)
                    || owned.contains(&r.id)
            })
            .filter(|r| Self::passes_guards(r, guards))
            .cloned()
            .collect();
        items.sort_by_key(|r| r.order_no);
        Ok(items)
    }

    async fn find_role(&self, _auth: &AuthUser, id: i64) -> Result<Option<Role>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.roles.get(&id).filter(|r| !r.is_delete).cloned())
    }

    async fn role_duplicate_exists(
        &self,
        _auth: &AuthUser,
        name: &str,
        code: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        Ok(state.roles.values().any(|r| {
            !r.is_delete && r.name == name && r.code == code && Some(r.id) != exclude_id
        }))
    }

    async fn insert_role(&self, _auth: &AuthUser, role: &Role) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn update_role(&self, auth: &AuthUser, role: &Role) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.roles.get_mut(&role.id).filter(|r| !r.is_delete) {
            // data_scope deliberately untouched
            existing.name = role.name.clone();
            existing.code = role.code.clone();
            existing.order_no = role.order_no;
            existing.status = role.status;
            existing.remark = role.remark.clone();
            existing.update_time = Some(Utc::now());
            existing.update_user_id = Some(auth.user_id);
        }
        Ok(())
    }

    async fn set_role_status(
        &self,
        _auth: &AuthUser,
        id: i64,
        status: i32,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        match state.roles.get_mut(&id).filter(|r| !r.is_delete) {
            Some(role) => {
                role.status = status;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn set_role_data_scope(
        &self,
        _auth: &AuthUser,
        id: i64,
        data_scope: DataScope,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(role) = state.roles.get_mut(&id).filter(|r| !r.is_delete) {
            role.data_scope = data_scope.as_i32();
        }
        Ok(())
    }

    async fn delete_role(&self, _auth: &AuthUser, id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(role) = state.roles.get_mut(&id) {
            role.is_delete = true;
        }
        Ok(())
    }
}

#[async_trait]
impl RelationStore for MemoryStore {
    async fn user_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .user_roles
            .iter()
            .filter(|r| r.role_id == role_id)
            .map(|r| r.user_id)
            .collect())
    }

    async fn role_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .user_roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.role_id)
            .collect())
    }

    async fn menu_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .role_menus
            .iter()
            .filter(|r| r.role_id == role_id)
            .map(|r| r.menu_id)
            .collect())
    }

    async fn org_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .role_orgs
            .iter()
            .filter(|r| r.role_id == role_id)
            .map(|r| r.org_id)
            .collect())
    }

    async fn org_ids_for_roles(&self, role_ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        let state = self.state.lock().await;
        let mut ids: Vec<i64> = state
            .role_orgs
            .iter()
            .filter(|r| role_ids.contains(&r.role_id))
            .map(|r| r.org_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    async fn replace_role_menus(&self, role_id: i64, menu_ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.role_menus.retain(|r| r.role_id != role_id);
        for menu_id in menu_ids {
            state.role_menus.push(RoleMenu { id: next_id(), role_id, menu_id: *menu_id });
        }
        Ok(())
    }

    async fn replace_role_orgs(&self, role_id: i64, org_ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.role_orgs.retain(|r| r.role_id != role_id);
        for org_id in org_ids {
            state.role_orgs.push(RoleOrg { id: next_id(), role_id, org_id: *org_id });
        }
        Ok(())
    }

    async fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.user_roles.retain(|r| r.user_id != user_id);
        for role_id in role_ids {
            state.user_roles.push(UserRole { id: next_id(), user_id, role_id: *role_id });
        }
        Ok(())
    }

    async fn delete_role_menus(&self, role_id: i64) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.role_menus.len();
        state.role_menus.retain(|r| r.role_id != role_id);
        Ok((before - state.role_menus.len()) as u64)
    }

    async fn delete_role_orgs(&self, role_id: i64) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.role_orgs.len();
        state.role_orgs.retain(|r| r.role_id != role_id);
        Ok((before - state.role_orgs.len()) as u64)
    }

    async fn delete_user_roles_for_role(&self, role_id: i64) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.user_roles.len();
        state.user_roles.retain(|r| r.role_id != role_id);
        Ok((before - state.user_roles.len()) as u64)
    }
}

#[async_trait]
impl OrgStore for MemoryStore {
    async fn all_org_ids(&self, _auth: &AuthUser) -> Result<Vec<i64>, StoreError> {
        let state = self.state.lock().await;
        let mut ids: Vec<i64> =
            state.orgs.values().filter(|o| !o.is_delete).map(|o| o.id).collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn org_subtree_ids(&self, _auth: &AuthUser, root: i64) -> Result<Vec<i64>, StoreError> {
        let state = self.state.lock().await;
        if !state.orgs.contains_key(&root) {
            return Ok(vec![]);
        }
        let mut out = vec![root];
        let mut frontier = vec![root];
        while let Some(parent) = frontier.pop() {
            for org in state.orgs.values().filter(|o| o.pid == parent && !o.is_delete) {
                out.push(org.id);
                frontier.push(org.id);
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_user(&self, _auth: &AuthUser, id: i64) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.users.get(&id).filter(|u| !u.is_delete).cloned())
    }

    async fn data_scopes_for_user(
        &self,
        _auth: &AuthUser,
        user_id: i64,
    ) -> Result<Vec<DataScope>, StoreError> {
        self.data_scope_calls.fetch_add(1, Ordering::Relaxed);
        let state = self.state.lock().await;
        let role_ids: Vec<i64> = state
            .user_roles
            .iter()
            .filter(|r| r.user_id == user_id)
            .map(|r| r.role_id)
            .collect();
        Ok(role_ids
            .iter()
            .filter_map(|id| state.roles.get(id))
            .filter(|r| !r.is_delete && r.status == Status::Enabled.as_i32())
            .filter_map(|r| DataScope::from_i32(r.data_scope))
            .collect())
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn all_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.tenants.iter().filter(|t| !t.is_delete).cloned().collect())
    }

    async fn db_isolated_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .tenants
            .iter()
            .filter(|t| {
                !t.is_delete
                    && t.tenant_type == TenantType::Db.as_i32()
                    && t.status == Status::Enabled.as_i32()
            })
            .cloned()
            .collect())
    }
}
