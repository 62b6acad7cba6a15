//! Scope resolution and materialization properties, exercised against
//! lazily-connecting pools (no database required).

use std::sync::Arc;

use atrium_api::auth::AuthUser;
use atrium_api::cache::{keys, CacheStore};
use atrium_api::config::{ConnectionSettings, DatabaseOptions};
use atrium_api::crypto::Cipher;
use atrium_api::database::entity::TableAffinity;
use atrium_api::database::models::{Tenant, TenantType};
use atrium_api::database::scope::{ScopeRegistry, DEFAULT_TENANT_ID};
use atrium_api::types::AccountType;

fn cipher() -> Cipher {
    Cipher::from_key_material("scope-resolution-tests").unwrap()
}

fn options() -> DatabaseOptions {
    DatabaseOptions {
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
    }
}

fn user(tenant_id: i64) -> AuthUser {
    AuthUser {
        user_id: 7,
        tenant_id,
        org_id: Some(100),
        account: "user7".to_string(),
        account_type: AccountType::Normal,
    }
}

fn db_tenant(cipher: &Cipher, id: i64, url: &str) -> Tenant {
    Tenant {
        id,
        org_id: None,
        user_id: None,
        host: None,
        tenant_type: TenantType::Db.as_i32(),
        db_type: "postgres".to_string(),
        connection: cipher.encrypt(url).unwrap(),
        slave_connections: None,
        status: 1,
        remark: None,
        create_time: None,
        update_time: None,
        create_user_id: None,
        create_user_name: None,
        update_user_id: None,
        update_user_name: None,
        create_org_id: None,
        is_delete: false,
    }
}

#[tokio::test]
async fn system_tables_always_resolve_to_main() {
    let registry = ScopeRegistry::open(&options(), cipher(), CacheStore::new()).unwrap();

    for caller in [None, Some(user(DEFAULT_TENANT_ID)), Some(user(999))] {
        let scope = registry
            .resolve(TableAffinity::System, caller.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scope.conn_id(), "main");
    }
}

#[tokio::test]
async fn dedicated_tables_ignore_the_caller_tenant() {
    let registry = ScopeRegistry::open(&options(), cipher(), CacheStore::new()).unwrap();

    for caller in [None, Some(user(DEFAULT_TENANT_ID)), Some(user(999))] {
        let scope = registry
            .resolve(TableAffinity::Dedicated("analytics"), caller.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scope.conn_id(), "analytics");
    }

    // a dedicated tag naming an undeclared connection resolves to absent
    let missing = registry
        .resolve(TableAffinity::Dedicated("nope"), Some(&user(999)))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn log_tables_use_the_log_scope_when_configured() {
    let registry = ScopeRegistry::open(&options(), cipher(), CacheStore::new()).unwrap();
    let scope = registry.resolve(TableAffinity::Log, None).await.unwrap().unwrap();
    assert_eq!(scope.conn_id(), "log");
}

#[tokio::test]
async fn log_tables_fall_back_to_main_without_a_log_connection() {
    let mut opts = options();
    opts.log = None;
    opts.connections.retain(|c| c.conn_id != "log");
    let registry = ScopeRegistry::open(&opts, cipher(), CacheStore::new()).unwrap();

    let scope = registry.resolve(TableAffinity::Log, None).await.unwrap().unwrap();
    assert_eq!(scope.conn_id(), "main");
}

#[tokio::test]
async fn anonymous_and_default_tenant_callers_use_main() {
    let registry = ScopeRegistry::open(&options(), cipher(), CacheStore::new()).unwrap();

    let anonymous = registry.resolve(TableAffinity::Tenant, None).await.unwrap().unwrap();
    assert_eq!(anonymous.conn_id(), "main");

    let default_tenant = registry
        .resolve(TableAffinity::Tenant, Some(&user(DEFAULT_TENANT_ID)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(default_tenant.conn_id(), "main");
}

#[tokio::test]
async fn unknown_tenant_callers_resolve_to_absent() {
    let registry = ScopeRegistry::open(&options(), cipher(), CacheStore::new()).unwrap();
    let scope = registry.resolve(TableAffinity::Tenant, Some(&user(424242))).await.unwrap();
    assert!(scope.is_none());
}

#[tokio::test]
async fn db_tenant_callers_get_their_own_scope() {
    let cache = CacheStore::new();
    let cipher = cipher();
    let tenant_id = 1_300_000_000_055;
    cache
        .set(
            &keys::tenant_registry(),
            &vec![db_tenant(&cipher, tenant_id, "postgres://t@db55:5432/t55")],
        )
        .await;

    let registry = ScopeRegistry::open(&options(), cipher, cache).unwrap();
    let scope = registry
        .resolve(TableAffinity::Tenant, Some(&user(tenant_id)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scope.conn_id(), tenant_id.to_string());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_first_access_materializes_exactly_one_scope() {
    let cache = CacheStore::new();
    let cipher = cipher();
    let tenant_id = 1_300_000_000_077;
    cache
        .set(
            &keys::tenant_registry(),
            &vec![db_tenant(&cipher, tenant_id, "postgres://t@db77:5432/t77")],
        )
        .await;

    let registry = Arc::new(ScopeRegistry::open(&options(), cipher, cache).unwrap());

    let mut handles = Vec::new();
    for _ in 0..16 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry.tenant_scope(tenant_id).await.unwrap().unwrap().conn_id().to_string()
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap(), tenant_id.to_string());
    }

    let stats = registry.stats().await;
    assert_eq!(stats.materialized, 1);
    // main + log + analytics + the one tenant scope
    assert_eq!(stats.scopes, 4);
}

#[tokio::test]
async fn failed_materialization_leaves_no_registry_entry() {
    let cache = CacheStore::new();
    let key = cipher();
    let tenant_id = 1_300_000_000_088;
    let mut tenant = db_tenant(&key, tenant_id, "postgres://t@db88:5432/t88");
    tenant.connection = "garbage".to_string();
    cache.set(&keys::tenant_registry(), &vec![tenant]).await;

    let registry = ScopeRegistry::open(&options(), key.clone(), cache.clone()).unwrap();
    assert!(registry.tenant_scope(tenant_id).await.is_err());
    assert!(!registry.has(&tenant_id.to_string()).await);

    // fixing the row in the snapshot lets the next request succeed
    cache
        .set(
            &keys::tenant_registry(),
            &vec![db_tenant(&key, tenant_id, "postgres://t@db88:5432/t88")],
        )
        .await;
    let scope = registry.tenant_scope(tenant_id).await.unwrap();
    assert!(scope.is_some());
    assert!(registry.has(&tenant_id.to_string()).await);
}
