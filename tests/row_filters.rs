//! Row-filter builder properties: self/org/custom composition, caching,
//! eligibility by connection tag, and delete-on-write invalidation.

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use atrium_api::auth::AuthUser;
use atrium_api::cache::{keys, CacheStore};
use atrium_api::database::entity::{EntityCatalog, EntityMeta, TableAffinity};
use atrium_api::database::store::StoreError;
use atrium_api::filter::row::{
    invalidate_user_filters, DataScope, RowCondition, RowFilterBuilder, RowFilterProvider,
    ScopeSource, TableFilter,
};
use atrium_api::types::AccountType;

struct StubSource {
    scope: DataScope,
    orgs: Mutex<Vec<i64>>,
    org_calls: AtomicUsize,
    scope_calls: AtomicUsize,
}

impl StubSource {
    fn new(scope: DataScope, orgs: Vec<i64>) -> Self {
        Self {
            scope,
            orgs: Mutex::new(orgs),
            org_calls: AtomicUsize::new(0),
            scope_calls: AtomicUsize::new(0),
        }
    }

    fn set_orgs(&self, orgs: Vec<i64>) {
        *self.orgs.lock().unwrap() = orgs;
    }
}

#[async_trait]
impl ScopeSource for StubSource {
    async fn max_data_scope(&self, _user: &AuthUser) -> Result<DataScope, StoreError> {
        self.scope_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.scope)
    }

    async fn visible_org_ids(&self, _user: &AuthUser) -> Result<Vec<i64>, StoreError> {
        self.org_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.orgs.lock().unwrap().clone())
    }
}

struct StatusProvider;

impl RowFilterProvider for StatusProvider {
    fn filters(&self) -> Vec<TableFilter> {
        vec![
            TableFilter {
                table: "sys_role".to_string(),
                condition: RowCondition::Where(json!({ "status": 1 })),
            },
            TableFilter {
                table: "widget".to_string(),
                condition: RowCondition::Where(json!({ "archived": false })),
            },
        ]
    }
}

fn user(user_id: i64) -> AuthUser {
    AuthUser {
        user_id,
        tenant_id: atrium_api::database::DEFAULT_TENANT_ID,
        org_id: Some(100),
        account: format!("user{}", user_id),
        account_type: AccountType::Normal,
    }
}

fn admin() -> AuthUser {
    AuthUser {
        user_id: 1,
        tenant_id: atrium_api::database::DEFAULT_TENANT_ID,
        org_id: Some(100),
        account: "superadmin".to_string(),
        account_type: AccountType::SuperAdmin,
    }
}

fn catalog_with_widget() -> Arc<EntityCatalog> {
    Arc::new(EntityCatalog::builtin().with(EntityMeta {
        table: "widget",
        affinity: TableAffinity::Dedicated("analytics"),
        audited: true,
    }))
}

#[tokio::test]
async fn self_scope_yields_exactly_the_creator_predicate() {
    let builder = RowFilterBuilder::new(Arc::new(EntityCatalog::builtin()), CacheStore::new());
    let source = StubSource::new(DataScope::SelfOnly, vec![10, 20]);

    let set = builder.build("main", &user(7), &source).await.unwrap();

    for table in ["sys_user", "sys_role", "sys_org"] {
        let conditions = set.conditions_for(table);
        assert_eq!(conditions, &[RowCondition::CreatorEquals(7)], "table {}", table);
    }
    // a self filter subsumes organization scoping: the org set is never read
    assert_eq!(source.org_calls.load(Ordering::Relaxed), 0);
    // non-audited tables carry no conditions
    assert!(set.conditions_for("sys_role_menu").is_empty());
    assert!(set.conditions_for("sys_op_log").is_empty());
}

#[tokio::test]
async fn org_scope_restricts_to_the_visible_set() {
    let builder = RowFilterBuilder::new(Arc::new(EntityCatalog::builtin()), CacheStore::new());
    let source = StubSource::new(DataScope::Org, vec![100, 110]);

    let set = builder.build("main", &user(7), &source).await.unwrap();
    assert_eq!(set.conditions_for("sys_role"), &[RowCondition::OrgIn(vec![100, 110])]);
    assert_eq!(
        set.where_json_for("sys_role"),
        vec![json!({ "create_org_id": { "$in": [100, 110] } })]
    );
}

#[tokio::test]
async fn empty_visible_set_adds_no_filter() {
    let builder = RowFilterBuilder::new(Arc::new(EntityCatalog::builtin()), CacheStore::new());
    let source = StubSource::new(DataScope::Org, vec![]);

    let set = builder.build("main", &user(7), &source).await.unwrap();
    assert!(set.is_empty());
}

#[tokio::test]
async fn super_admins_are_never_filtered() {
    let builder = RowFilterBuilder::new(Arc::new(EntityCatalog::builtin()), CacheStore::new())
        .with_provider(Arc::new(StatusProvider));
    let source = StubSource::new(DataScope::SelfOnly, vec![]);

    let set = builder.build("main", &admin(), &source).await.unwrap();
    assert!(set.is_empty());
    assert_eq!(source.scope_calls.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn custom_provider_predicates_follow_connection_eligibility() {
    let builder = RowFilterBuilder::new(catalog_with_widget(), CacheStore::new())
        .with_provider(Arc::new(StatusProvider));
    let source = StubSource::new(DataScope::Org, vec![100]);

    // on the main scope: the sys_role predicate applies, the widget one is
    // pinned to "analytics" and must not
    let main_set = builder.build("main", &user(7), &source).await.unwrap();
    assert!(main_set
        .conditions_for("sys_role")
        .contains(&RowCondition::Where(json!({ "status": 1 }))));
    assert!(main_set.conditions_for("widget").is_empty());

    // on the analytics scope: the widget predicate applies
    let analytics_set = builder.build("analytics", &user(7), &source).await.unwrap();
    assert!(analytics_set
        .conditions_for("widget")
        .contains(&RowCondition::Where(json!({ "archived": false }))));
}

#[tokio::test]
async fn dedicated_tables_are_excluded_from_foreign_scopes() {
    let builder = RowFilterBuilder::new(catalog_with_widget(), CacheStore::new());
    let source = StubSource::new(DataScope::SelfOnly, vec![]);

    let main_set = builder.build("main", &user(7), &source).await.unwrap();
    assert!(main_set.conditions_for("widget").is_empty());

    let analytics_set = builder.build("analytics", &user(7), &source).await.unwrap();
    assert_eq!(analytics_set.conditions_for("widget"), &[RowCondition::CreatorEquals(7)]);
    // untagged audited tables appear on every scope
    assert_eq!(analytics_set.conditions_for("sys_role"), &[RowCondition::CreatorEquals(7)]);
}

#[tokio::test]
async fn filter_sets_are_cached_per_connection_and_user() {
    let cache = CacheStore::new();
    let builder = RowFilterBuilder::new(Arc::new(EntityCatalog::builtin()), cache.clone());
    let source = StubSource::new(DataScope::Org, vec![100]);

    builder.build("main", &user(7), &source).await.unwrap();
    assert_eq!(source.org_calls.load(Ordering::Relaxed), 1);

    // same connection and user: served from cache
    builder.build("main", &user(7), &source).await.unwrap();
    assert_eq!(source.org_calls.load(Ordering::Relaxed), 1);
    assert!(cache.contains(&keys::org_filter("main", 7)).await);

    // a different connection computes its own entry
    builder.build("1300000000005", &user(7), &source).await.unwrap();
    assert_eq!(source.org_calls.load(Ordering::Relaxed), 2);
    assert!(cache.contains(&keys::org_filter("1300000000005", 7)).await);
}

#[tokio::test]
async fn invalidation_forces_recomputation_not_stale_reuse() {
    let cache = CacheStore::new();
    let builder = RowFilterBuilder::new(Arc::new(EntityCatalog::builtin()), cache.clone());
    let source = StubSource::new(DataScope::Org, vec![100]);

    let before = builder.build("main", &user(7), &source).await.unwrap();
    assert_eq!(before.conditions_for("sys_role"), &[RowCondition::OrgIn(vec![100])]);

    // the user's grants change; the write path evicts, then the next build
    // must observe the new set rather than the cached filter
    source.set_orgs(vec![100, 200]);
    invalidate_user_filters(&cache, 7, "main").await;

    let after = builder.build("main", &user(7), &source).await.unwrap();
    assert_eq!(after.conditions_for("sys_role"), &[RowCondition::OrgIn(vec![100, 200])]);
    assert_eq!(source.org_calls.load(Ordering::Relaxed), 2);
}

#[tokio::test]
async fn eviction_only_touches_the_named_connection() {
    let cache = CacheStore::new();
    let builder = RowFilterBuilder::new(Arc::new(EntityCatalog::builtin()), cache.clone());
    let source = StubSource::new(DataScope::Org, vec![100]);

    builder.build("main", &user(7), &source).await.unwrap();
    builder.build("1300000000005", &user(7), &source).await.unwrap();

    invalidate_user_filters(&cache, 7, "main").await;
    assert!(!cache.contains(&keys::org_filter("main", 7)).await);
    assert!(cache.contains(&keys::org_filter("1300000000005", 7)).await);
}
