//! Row-level filter construction.
//!
//! For every (connection, user) pair the builder produces a `FilterSet`: the
//! predicates attached to each audited table when queries run against that
//! connection. Three filter kinds compose with AND:
//!
//! - data-scope "self": `create_user_id = caller`, applied only when the
//!   caller's broadest role-derived scope is `SelfOnly`
//! - organization scope: `create_org_id IN visible-set`, skipped when the
//!   self filter already applies or the visible set is empty
//! - custom: provider-supplied predicates registered at startup
//!
//! Built sets are cached in the shared cache store; entries are evicted on
//! write whenever role or organization grants change (never by TTL).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::AuthUser;
use crate::cache::{keys, CacheStore};
use crate::database::entity::EntityCatalog;
use crate::database::store::StoreError;

/// Creator column on the audited base shape
pub const CREATE_USER_COL: &str = "create_user_id";
/// Originating organization column on the audited base shape
pub const CREATE_ORG_COL: &str = "create_org_id";

/// Breadth of rows a user may see, derived from role assignment.
/// Lower values are broader; a user's effective scope is the broadest
/// (numeric minimum) across all assigned roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataScope {
    All = 1,
    Org = 2,
    Custom = 3,
    SelfOnly = 4,
}

impl DataScope {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(DataScope::All),
            2 => Some(DataScope::Org),
            3 => Some(DataScope::Custom),
            4 => Some(DataScope::SelfOnly),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Broadest scope across a set of role grants. A user with no roles
    /// falls back to `SelfOnly`.
    pub fn broadest(scopes: impl IntoIterator<Item = DataScope>) -> DataScope {
        scopes
            .into_iter()
            .min_by_key(|s| s.as_i32())
            .unwrap_or(DataScope::SelfOnly)
    }
}

/// One row-level predicate over a single table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowCondition {
    /// create_user_id = user
    CreatorEquals(i64),
    /// create_org_id IN (orgs)
    OrgIn(Vec<i64>),
    /// Arbitrary where-DSL fragment supplied by a custom provider
    Where(Value),
}

impl RowCondition {
    pub fn to_where_json(&self) -> Value {
        match self {
            RowCondition::CreatorEquals(user_id) => json!({ CREATE_USER_COL: user_id }),
            RowCondition::OrgIn(org_ids) => json!({ CREATE_ORG_COL: { "$in": org_ids } }),
            RowCondition::Where(clause) => clause.clone(),
        }
    }
}

/// A (table, predicate) pair produced by a custom filter provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFilter {
    pub table: String,
    pub condition: RowCondition,
}

/// Custom filter providers are registered once at startup; each returns zero
/// or more (table, predicate) pairs. Outputs are cached per (connection,
/// user) and validity-checked against the table's connection tag.
pub trait RowFilterProvider: Send + Sync {
    fn filters(&self) -> Vec<TableFilter>;
}

/// The predicates attached to one connection scope for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterSet {
    conn_id: String,
    entries: HashMap<String, Vec<RowCondition>>,
}

impl FilterSet {
    pub fn new(conn_id: impl Into<String>) -> Self {
        Self { conn_id: conn_id.into(), entries: HashMap::new() }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn add(&mut self, table: &str, condition: RowCondition) {
        self.entries.entry(table.to_string()).or_default().push(condition);
    }

    pub fn conditions_for(&self, table: &str) -> &[RowCondition] {
        self.entries.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Where-DSL fragments for a table, ready to AND onto a query.
    pub fn where_json_for(&self, table: &str) -> Vec<Value> {
        self.conditions_for(table).iter().map(RowCondition::to_where_json).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn extend_from_map(&mut self, map: HashMap<String, Vec<RowCondition>>) {
        for (table, conditions) in map {
            self.entries.entry(table).or_default().extend(conditions);
        }
    }
}

/// Supplies the per-user authorization facts the builder needs: the broadest
/// role-derived data scope and the visible organization set. Implementations
/// own their caching; the builder only caches assembled filter maps.
#[async_trait]
pub trait ScopeSource: Send + Sync {
    async fn max_data_scope(&self, user: &AuthUser) -> Result<DataScope, StoreError>;
    async fn visible_org_ids(&self, user: &AuthUser) -> Result<Vec<i64>, StoreError>;
}

pub struct RowFilterBuilder {
    catalog: Arc<EntityCatalog>,
    cache: CacheStore,
    providers: Vec<Arc<dyn RowFilterProvider>>,
}

impl RowFilterBuilder {
    pub fn new(catalog: Arc<EntityCatalog>, cache: CacheStore) -> Self {
        Self { catalog, cache, providers: vec![] }
    }

    pub fn with_provider(mut self, provider: Arc<dyn RowFilterProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build (or fetch from cache) the filter set for a user against one
    /// connection scope. Super admins are never filtered.
    pub async fn build(
        &self,
        conn_id: &str,
        user: &AuthUser,
        source: &dyn ScopeSource,
    ) -> Result<FilterSet, StoreError> {
        let mut set = FilterSet::new(conn_id);
        if user.is_super_admin() {
            return Ok(set);
        }

        let scope = source.max_data_scope(user).await?;
        if scope == DataScope::SelfOnly {
            // A self filter subsumes organization scoping
            self.apply_self_filter(&mut set, conn_id, user).await;
        } else {
            self.apply_org_filter(&mut set, conn_id, user, source).await?;
        }
        self.apply_custom_filters(&mut set, conn_id, user).await;
        Ok(set)
    }

    async fn apply_self_filter(&self, set: &mut FilterSet, conn_id: &str, user: &AuthUser) {
        let cache_key = keys::data_scope_filter(conn_id, user.user_id);
        if let Some(cached) = self.cache.get::<HashMap<String, Vec<RowCondition>>>(&cache_key).await
        {
            set.extend_from_map(cached);
            return;
        }

        let mut map: HashMap<String, Vec<RowCondition>> = HashMap::new();
        for meta in self.catalog.audited() {
            if !self.catalog.eligible(meta, conn_id) {
                continue;
            }
            map.entry(meta.table.to_string())
                .or_default()
                .push(RowCondition::CreatorEquals(user.user_id));
        }

        self.cache.set(&cache_key, &map).await;
        set.extend_from_map(map);
    }

    async fn apply_org_filter(
        &self,
        set: &mut FilterSet,
        conn_id: &str,
        user: &AuthUser,
        source: &dyn ScopeSource,
    ) -> Result<(), StoreError> {
        let cache_key = keys::org_filter(conn_id, user.user_id);
        if let Some(cached) = self.cache.get::<HashMap<String, Vec<RowCondition>>>(&cache_key).await
        {
            set.extend_from_map(cached);
            return Ok(());
        }

        let org_ids = source.visible_org_ids(user).await?;
        if org_ids.is_empty() {
            // An empty visible set adds no filter: the scope falls through
            // unrestricted, and nothing is cached so the set is re-read on
            // the next build.
            return Ok(());
        }

        let mut map: HashMap<String, Vec<RowCondition>> = HashMap::new();
        for meta in self.catalog.audited() {
            if !self.catalog.eligible(meta, conn_id) {
                continue;
            }
            map.entry(meta.table.to_string())
                .or_default()
                .push(RowCondition::OrgIn(org_ids.clone()));
        }

        self.cache.set(&cache_key, &map).await;
        set.extend_from_map(map);
        Ok(())
    }

    async fn apply_custom_filters(&self, set: &mut FilterSet, conn_id: &str, user: &AuthUser) {
        let cache_key = keys::custom_filter(conn_id, user.user_id);
        if let Some(cached) = self.cache.get::<Vec<TableFilter>>(&cache_key).await {
            for item in cached {
                set.add(&item.table, item.condition);
            }
            return;
        }

        let mut applicable = Vec::new();
        for provider in &self.providers {
            for item in provider.filters() {
                if !self.catalog.eligible_table(&item.table, conn_id) {
                    continue;
                }
                applicable.push(item);
            }
        }

        self.cache.set(&cache_key, &applicable).await;
        for item in applicable {
            set.add(&item.table, item.condition);
        }
    }
}

/// Evict the authorization caches for one user on one connection: visible
/// organization set, max data scope, and the assembled org-filter entry.
/// Called synchronously from every mutation of role-menu, role-org, or
/// user-role relations.
pub async fn invalidate_user_filters(cache: &CacheStore, user_id: i64, conn_id: &str) {
    cache.remove(&keys::user_orgs(user_id)).await;
    cache.remove(&keys::user_max_data_scope(user_id)).await;
    cache.remove(&keys::org_filter(conn_id, user_id)).await;
    tracing::debug!("evicted filter caches for user {} on {}", user_id, conn_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn broadest_scope_is_the_numeric_minimum() {
        assert_eq!(
            DataScope::broadest([DataScope::SelfOnly, DataScope::Org, DataScope::Custom]),
            DataScope::Org
        );
        assert_eq!(DataScope::broadest([DataScope::All]), DataScope::All);
        assert_eq!(DataScope::broadest([]), DataScope::SelfOnly);
    }

    #[test]
    fn conditions_render_to_where_dsl() {
        assert_eq!(
            RowCondition::CreatorEquals(7).to_where_json(),
            json!({ "create_user_id": 7 })
        );
        assert_eq!(
            RowCondition::OrgIn(vec![1, 2]).to_where_json(),
            json!({ "create_org_id": { "$in": [1, 2] } })
        );
        assert_eq!(
            RowCondition::Where(json!({ "status": 1 })).to_where_json(),
            json!({ "status": 1 })
        );
    }

    #[test]
    fn filter_set_accumulates_per_table() {
        let mut set = FilterSet::new("main");
        set.add("sys_role", RowCondition::CreatorEquals(7));
        set.add("sys_role", RowCondition::OrgIn(vec![1]));
        assert_eq!(set.conditions_for("sys_role").len(), 2);
        assert!(set.conditions_for("sys_user").is_empty());
        assert_eq!(set.where_json_for("sys_role").len(), 2);
        assert!(!set.is_empty());
    }

    #[test]
    fn filter_set_round_trips_through_serde() {
        let mut set = FilterSet::new("main");
        set.add("sys_role", RowCondition::OrgIn(vec![1, 2, 3]));
        let raw = serde_json::to_value(&set).unwrap();
        let back: FilterSet = serde_json::from_value(raw).unwrap();
        assert_eq!(back.conditions_for("sys_role"), set.conditions_for("sys_role"));
    }
}
