use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::database::models::{Role, Tenant, User};
use crate::database::repository::Repository;
use crate::database::scope::{ConnectionScope, ScopeRegistry};
use crate::database::store::{
    OrgStore, RelationStore, RolePageQuery, RoleStore, StoreError, TenantStore, UserStore,
};
use crate::filter::row::{DataScope, FilterSet};
use crate::filter::FilterData;
use crate::types::Page;

/// Postgres-backed storage collaborator. Every method resolves its
/// connection scope through the registry, so tenant routing and row
/// filtering apply uniformly.
pub struct PgAdminStore {
    registry: Arc<ScopeRegistry>,
}

impl PgAdminStore {
    pub fn new(registry: Arc<ScopeRegistry>) -> Self {
        Self { registry }
    }

    async fn role_repo(
        &self,
        auth: &AuthUser,
        guards: Option<&FilterSet>,
    ) -> Result<Repository<Role>, StoreError> {
        let repo = Repository::<Role>::open(self.registry.as_ref(), Some(auth)).await?;
        Ok(match guards {
            Some(set) => repo.with_filters(set),
            None => repo,
        })
    }

    fn relations_scope(&self) -> ConnectionScope {
        // Relation tables are system tables; they always live on the main scope
        self.registry.main_scope()
    }

    fn and_clauses(mut clauses: Vec<Value>) -> Option<Value> {
        match clauses.len() {
            0 => None,
            1 => Some(clauses.remove(0)),
            _ => Some(json!({ "$and": clauses })),
        }
    }

    async fn ids_in(
        &self,
        scope: &ConnectionScope,
        sql_prefix: &str,
        ids: &[i64],
        sql_suffix: &str,
    ) -> Result<Vec<i64>, StoreError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let placeholders =
            (1..=ids.len()).map(|i| format!("${}", i)).collect::<Vec<_>>().join(", ");
        let sql = format!("{} ({}){}", sql_prefix, placeholders, sql_suffix);
        let mut q = sqlx::query_scalar::<_, i64>(&sql);
        for id in ids {
            q = q.bind(id);
        }
        Ok(q.fetch_all(scope.pool()).await?)
    }
}

#[async_trait]
impl RoleStore for PgAdminStore {
    async fn page_roles(
        &self,
        auth: &AuthUser,
        guards: &FilterSet,
        query: &RolePageQuery,
    ) -> Result<Page<Role>, StoreError> {
        let repo = self.role_repo(auth, Some(guards)).await?;

        let mut clauses = Vec::new();
        if let Some(name) = query.name.as_deref().filter(|s| !s.trim().is_empty()) {
            clauses.push(json!({ "name": { "$like": format!("%{}%", name.trim()) } }));
        }
        if let Some(code) = query.code.as_deref().filter(|s| !s.trim().is_empty()) {
            clauses.push(json!({ "code": { "$like": format!("%{}%", code.trim()) } }));
        }
        if !auth.is_super_admin() {
            // Non-admins only operate on roles they created
            clauses.push(json!({ "create_user_id": auth.user_id }));
        }
        let where_clause = Self::and_clauses(clauses);

        let total = repo
            .count(FilterData { where_clause: where_clause.clone(), ..Default::default() })
            .await?;

        let page = query.page.max(1);
        let offset = (page - 1) * query.page_size;
        let items = repo
            .select_any(FilterData {
                where_clause,
                order: Some(json!("order_no asc")),
                limit: Some(query.page_size as i32),
                offset: Some(offset as i32),
                ..Default::default()
            })
            .await?;

        Ok(Page::new(items, total, page, query.page_size))
    }

    async fn list_roles(
        &self,
        auth: &AuthUser,
        guards: &FilterSet,
    ) -> Result<Vec<Role>, StoreError> {
        let repo = self.role_repo(auth, Some(guards)).await?;

        let where_clause = if auth.is_super_admin() {
            None
        } else {
            // Created-by-self plus roles the caller already holds
            let owned = self.role_ids_for_user(auth.user_id).await?;
            Some(json!({ "$or": [
                { "create_user_id": auth.user_id },
                { "id": { "$in": owned } }
            ] }))
        };

        repo.select_any(FilterData {
            where_clause,
            order: Some(json!("order_no asc")),
            ..Default::default()
        })
        .await
    }

    async fn find_role(&self, auth: &AuthUser, id: i64) -> Result<Option<Role>, StoreError> {
        let repo = self.role_repo(auth, None).await?;
        repo.select_one(FilterData { where_clause: Some(json!({ "id": id })), ..Default::default() })
            .await
    }

    async fn role_duplicate_exists(
        &self,
        auth: &AuthUser,
        name: &str,
        code: &str,
        exclude_id: Option<i64>,
    ) -> Result<bool, StoreError> {
        let repo = self.role_repo(auth, None).await?;
        let where_clause = match exclude_id {
            Some(id) => json!({ "name": name, "code": code, "id": { "$ne": id } }),
            None => json!({ "name": name, "code": code }),
        };
        let count = repo
            .count(FilterData { where_clause: Some(where_clause), ..Default::default() })
            .await?;
        Ok(count > 0)
    }

    async fn insert_role(&self, auth: &AuthUser, role: &Role) -> Result<(), StoreError> {
        let repo = self.role_repo(auth, None).await?;
        sqlx::query(
            "INSERT INTO \"sys_role\" \
             (id, name, code, order_no, data_scope, status, remark, tenant_id, \
              create_time, create_user_id, create_user_name, create_org_id, is_delete) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, FALSE)",
        )
        .bind(role.id)
        .bind(&role.name)
        .bind(&role.code)
        .bind(role.order_no)
        .bind(role.data_scope)
        .bind(role.status)
        .bind(&role.remark)
        .bind(role.tenant_id)
        .bind(role.create_time)
        .bind(role.create_user_id)
        .bind(&role.create_user_name)
        .bind(role.create_org_id)
        .execute(repo.scope().pool())
        .await?;
        Ok(())
    }

    async fn update_role(&self, auth: &AuthUser, role: &Role) -> Result<(), StoreError> {
        let repo = self.role_repo(auth, None).await?;
        // data_scope is intentionally absent; it only moves through
        // set_role_data_scope
        sqlx::query(
            "UPDATE \"sys_role\" SET name = $1, code = $2, order_no = $3, status = $4, \
             remark = $5, update_time = $6, update_user_id = $7, update_user_name = $8 \
             WHERE id = $9 AND is_delete = FALSE",
        )
        .bind(&role.name)
        .bind(&role.code)
        .bind(role.order_no)
        .bind(role.status)
        .bind(&role.remark)
        .bind(Utc::now())
        .bind(auth.user_id)
        .bind(&auth.account)
        .bind(role.id)
        .execute(repo.scope().pool())
        .await?;
        Ok(())
    }

    async fn set_role_status(
        &self,
        auth: &AuthUser,
        id: i64,
        status: i32,
    ) -> Result<u64, StoreError> {
        let repo = self.role_repo(auth, None).await?;
        let result = sqlx::query(
            "UPDATE \"sys_role\" SET status = $1, update_time = $2 \
             WHERE id = $3 AND is_delete = FALSE",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(repo.scope().pool())
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_role_data_scope(
        &self,
        auth: &AuthUser,
        id: i64,
        data_scope: DataScope,
    ) -> Result<(), StoreError> {
        let repo = self.role_repo(auth, None).await?;
        sqlx::query(
            "UPDATE \"sys_role\" SET data_scope = $1, update_time = $2 \
             WHERE id = $3 AND is_delete = FALSE",
        )
        .bind(data_scope.as_i32())
        .bind(Utc::now())
        .bind(id)
        .execute(repo.scope().pool())
        .await?;
        Ok(())
    }

    async fn delete_role(&self, auth: &AuthUser, id: i64) -> Result<(), StoreError> {
        let repo = self.role_repo(auth, None).await?;
        sqlx::query(
            "UPDATE \"sys_role\" SET is_delete = TRUE, update_time = $1, update_user_id = $2 \
             WHERE id = $3",
        )
        .bind(Utc::now())
        .bind(auth.user_id)
        .bind(id)
        .execute(repo.scope().pool())
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RelationStore for PgAdminStore {
    async fn user_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError> {
        let scope = self.relations_scope();
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM \"sys_user_role\" WHERE role_id = $1",
        )
        .bind(role_id)
        .fetch_all(scope.pool())
        .await?)
    }

    async fn role_ids_for_user(&self, user_id: i64) -> Result<Vec<i64>, StoreError> {
        let scope = self.relations_scope();
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT role_id FROM \"sys_user_role\" WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(scope.pool())
        .await?)
    }

    async fn menu_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError> {
        let scope = self.relations_scope();
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT menu_id FROM \"sys_role_menu\" WHERE role_id = $1",
        )
        .bind(role_id)
        .fetch_all(scope.pool())
        .await?)
    }

    async fn org_ids_for_role(&self, role_id: i64) -> Result<Vec<i64>, StoreError> {
        let scope = self.relations_scope();
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT org_id FROM \"sys_role_org\" WHERE role_id = $1",
        )
        .bind(role_id)
        .fetch_all(scope.pool())
        .await?)
    }

    async fn org_ids_for_roles(&self, role_ids: &[i64]) -> Result<Vec<i64>, StoreError> {
        let scope = self.relations_scope();
        self.ids_in(
            &scope,
            "SELECT DISTINCT org_id FROM \"sys_role_org\" WHERE role_id IN",
            role_ids,
            "",
        )
        .await
    }

    async fn replace_role_menus(&self, role_id: i64, menu_ids: &[i64]) -> Result<(), StoreError> {
        let scope = self.relations_scope();
        let mut tx = scope.pool().begin().await?;
        sqlx::query("DELETE FROM \"sys_role_menu\" WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        for menu_id in menu_ids {
            sqlx::query("INSERT INTO \"sys_role_menu\" (id, role_id, menu_id) VALUES ($1, $2, $3)")
                .bind(crate::types::next_id())
                .bind(role_id)
                .bind(menu_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn replace_role_orgs(&self, role_id: i64, org_ids: &[i64]) -> Result<(), StoreError> {
        let scope = self.relations_scope();
        let mut tx = scope.pool().begin().await?;
        sqlx::query("DELETE FROM \"sys_role_org\" WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;
        for org_id in org_ids {
            sqlx::query("INSERT INTO \"sys_role_org\" (id, role_id, org_id) VALUES ($1, $2, $3)")
                .bind(crate::types::next_id())
                .bind(role_id)
                .bind(org_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn replace_user_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<(), StoreError> {
        let scope = self.relations_scope();
        let mut tx = scope.pool().begin().await?;
        sqlx::query("DELETE FROM \"sys_user_role\" WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        for role_id in role_ids {
            sqlx::query("INSERT INTO \"sys_user_role\" (id, user_id, role_id) VALUES ($1, $2, $3)")
                .bind(crate::types::next_id())
                .bind(user_id)
                .bind(role_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_role_menus(&self, role_id: i64) -> Result<u64, StoreError> {
        let scope = self.relations_scope();
        let result = sqlx::query("DELETE FROM \"sys_role_menu\" WHERE role_id = $1")
            .bind(role_id)
            .execute(scope.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_role_orgs(&self, role_id: i64) -> Result<u64, StoreError> {
        let scope = self.relations_scope();
        let result = sqlx::query("DELETE FROM \"sys_role_org\" WHERE role_id = $1")
            .bind(role_id)
            .execute(scope.pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn delete_user_roles_for_role(&self, role_id: i64) -> Result<u64, StoreError> {
        let scope = self.relations_scope();
        let result = sqlx::query("DELETE FROM \"sys_user_role\" WHERE role_id = $1")
            .bind(role_id)
            .execute(scope.pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl OrgStore for PgAdminStore {
    async fn all_org_ids(&self, auth: &AuthUser) -> Result<Vec<i64>, StoreError> {
        let repo = Repository::<crate::database::models::Org>::open(
            self.registry.as_ref(),
            Some(auth),
        )
        .await?;
        Ok(sqlx::query_scalar::<_, i64>("SELECT id FROM \"sys_org\" WHERE is_delete = FALSE")
            .fetch_all(repo.scope().read_pool())
            .await?)
    }

    async fn org_subtree_ids(&self, auth: &AuthUser, root: i64) -> Result<Vec<i64>, StoreError> {
        let repo = Repository::<crate::database::models::Org>::open(
            self.registry.as_ref(),
            Some(auth),
        )
        .await?;
        Ok(sqlx::query_scalar::<_, i64>(
            "WITH RECURSIVE subtree AS ( \
                 SELECT id FROM \"sys_org\" WHERE id = $1 AND is_delete = FALSE \
                 UNION ALL \
                 SELECT o.id FROM \"sys_org\" o \
                 JOIN subtree s ON o.pid = s.id WHERE o.is_delete = FALSE \
             ) SELECT id FROM subtree",
        )
        .bind(root)
        .fetch_all(repo.scope().read_pool())
        .await?)
    }
}

#[async_trait]
impl UserStore for PgAdminStore {
    async fn find_user(&self, auth: &AuthUser, id: i64) -> Result<Option<User>, StoreError> {
        let repo = Repository::<User>::open(self.registry.as_ref(), Some(auth)).await?;
        repo.select_one(FilterData { where_clause: Some(json!({ "id": id })), ..Default::default() })
            .await
    }

    async fn data_scopes_for_user(
        &self,
        auth: &AuthUser,
        user_id: i64,
    ) -> Result<Vec<DataScope>, StoreError> {
        // Assignments live on the main scope; role rows follow the tenant
        let role_ids = self.role_ids_for_user(user_id).await?;
        if role_ids.is_empty() {
            return Ok(vec![]);
        }

        let repo = self.role_repo(auth, None).await?;
        let placeholders =
            (1..=role_ids.len()).map(|i| format!("${}", i)).collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT data_scope FROM \"sys_role\" WHERE id IN ({}) \
             AND is_delete = FALSE AND status = 1",
            placeholders
        );
        let mut q = sqlx::query_scalar::<_, i32>(&sql);
        for id in &role_ids {
            q = q.bind(id);
        }
        let raw = q.fetch_all(repo.scope().read_pool()).await?;
        Ok(raw.into_iter().filter_map(DataScope::from_i32).collect())
    }
}

#[async_trait]
impl TenantStore for PgAdminStore {
    async fn all_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let repo = Repository::<Tenant>::open(self.registry.as_ref(), None).await?;
        repo.select_any(FilterData::default()).await
    }

    async fn db_isolated_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let repo = Repository::<Tenant>::open(self.registry.as_ref(), None).await?;
        repo.select_any(FilterData {
            where_clause: Some(json!({
                "tenant_type": crate::database::models::TenantType::Db.as_i32(),
                "status": crate::types::Status::Enabled.as_i32()
            })),
            ..Default::default()
        })
        .await
    }
}
