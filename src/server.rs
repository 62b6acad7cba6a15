use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::config::DatabaseOptions;
use crate::crypto::Cipher;
use crate::database::entity::EntityCatalog;
use crate::database::pg_store::PgAdminStore;
use crate::database::scope::ScopeRegistry;
use crate::database::store::AdminStore;
use crate::filter::row::{RowFilterBuilder, RowFilterProvider, ScopeSource};
use crate::handlers::{auth, role, tenant};
use crate::middleware::jwt_auth_middleware;
use crate::services::{
    AccessSource, OrgService, RoleMenuService, RoleOrgService, RoleService, TenantService,
    UserRoleService, UserService,
};

pub struct AppState {
    pub registry: Arc<ScopeRegistry>,
    pub cache: CacheStore,
    pub roles: Arc<RoleService>,
    pub tenants: Arc<TenantService>,
}

/// Wire the process: cipher, cache, scope registry, store, filter builder,
/// services. Custom filter providers registered here apply to every query
/// built for a matching scope.
pub fn build_state(
    options: &DatabaseOptions,
    providers: Vec<Arc<dyn RowFilterProvider>>,
) -> anyhow::Result<Arc<AppState>> {
    let config = crate::config::config();
    let cipher = Cipher::from_key_material(&config.security.tenant_key)
        .map_err(|e| anyhow::anyhow!("TENANT_KEY is not usable: {}", e))?;

    let cache = CacheStore::new();
    let registry = Arc::new(ScopeRegistry::open(options, cipher, cache.clone())?);
    let store: Arc<dyn AdminStore> = Arc::new(PgAdminStore::new(registry.clone()));

    let catalog = Arc::new(EntityCatalog::builtin());
    let mut filters = RowFilterBuilder::new(catalog, cache.clone());
    for provider in providers {
        filters = filters.with_provider(provider);
    }
    let filters = Arc::new(filters);

    let orgs = Arc::new(OrgService::new(store.clone(), cache.clone()));
    let users = Arc::new(UserService::new(store.clone(), cache.clone()));
    let source: Arc<dyn ScopeSource> = Arc::new(AccessSource::new(orgs, users));

    let role_menus = Arc::new(RoleMenuService::new(registry.clone(), store.clone(), cache.clone()));
    let role_orgs = Arc::new(RoleOrgService::new(registry.clone(), store.clone(), cache.clone()));
    let user_roles = Arc::new(UserRoleService::new(registry.clone(), store.clone(), cache.clone()));

    let roles = Arc::new(RoleService::new(
        registry.clone(),
        store.clone(),
        cache.clone(),
        filters,
        source,
        role_menus,
        role_orgs,
        user_roles,
    ));
    let tenants = Arc::new(TenantService::new(registry.clone(), store, cache.clone()));

    Ok(Arc::new(AppState { registry, cache, roles, tenants }))
}

pub fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/role/page", get(role::page))
        .route("/api/role/list", get(role::list))
        .route("/api/role/add", post(role::add))
        .route("/api/role/update", post(role::update))
        .route("/api/role/delete", post(role::delete))
        .route("/api/role/grant-menu", post(role::grant_menu))
        .route("/api/role/grant-data-scope", post(role::grant_data_scope))
        .route("/api/role/status", post(role::set_status))
        .route("/api/role/own-menus", get(role::own_menus))
        .route("/api/role/own-orgs", get(role::own_orgs))
        .route("/api/tenant/list", get(tenant::list))
        .route("/api/tenant/refresh-cache", post(tenant::refresh_cache))
        .route("/api/auth/whoami", get(auth::whoami))
        .layer(axum::middleware::from_fn(jwt_auth_middleware));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .merge(api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(port: Option<u16>) -> anyhow::Result<()> {
    // Load .env so cargo run picks up DATABASE_URL, TENANT_KEY, etc.
    let _ = dotenvy::dotenv();

    let config = crate::config::config();
    info!("starting Atrium API in {:?} mode", config.environment);

    let options = DatabaseOptions::from_env()?;
    let state = build_state(&options, vec![])?;

    // The materializer only reads the cache snapshot; populate it now and
    // warm the scopes of db-isolated tenants
    match state.tenants.refresh_registry_cache().await {
        Ok(count) => {
            if let Ok(ready) = state.tenants.preheat().await {
                info!("tenant registry ready: {} rows, {} scopes preheated", count, ready);
            }
        }
        Err(e) => warn!("tenant registry cache refresh failed (continuing): {}", e),
    }

    let port = port
        .or_else(|| std::env::var("ATRIUM_PORT").ok().and_then(|s| s.parse().ok()))
        .or_else(|| std::env::var("PORT").ok().and_then(|s| s.parse().ok()))
        .unwrap_or(3000);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Atrium API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn root() -> axum::Json<Value> {
    let version = env!("CARGO_PKG_VERSION");
    axum::Json(json!({
        "success": true,
        "data": {
            "name": "Atrium API",
            "version": version,
            "description": "Multi-tenant admin backend with tenant-aware data access",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "auth": "/api/auth/whoami (protected)",
                "role": "/api/role/* (protected)",
                "tenant": "/api/tenant/* (protected)",
            }
        }
    }))
}

async fn health(State(state): State<Arc<AppState>>) -> impl axum::response::IntoResponse {
    let now = chrono::Utc::now();
    let scope = state.registry.main_scope();

    match sqlx::query("SELECT 1").execute(scope.pool()).await {
        Ok(_) => (
            axum::http::StatusCode::OK,
            axum::Json(json!({
                "success": true,
                "data": { "status": "ok", "timestamp": now, "database": "ok" }
            })),
        ),
        Err(e) => (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(json!({
                "success": false,
                "error": "database unavailable",
                "data": { "status": "degraded", "timestamp": now, "database_error": e.to_string() }
            })),
        ),
    }
}
