use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::{keys, CacheStore};
use crate::database::models::Tenant;
use crate::database::scope::{ConnectionScope, ScopeRegistry};
use crate::database::store::AdminStore;
use crate::services::ServiceError;

/// Tenant registry maintenance: keeps the cache snapshot the scope
/// materializer reads, and exposes scope lookups.
pub struct TenantService {
    registry: Arc<ScopeRegistry>,
    store: Arc<dyn AdminStore>,
    cache: CacheStore,
}

impl TenantService {
    pub fn new(registry: Arc<ScopeRegistry>, store: Arc<dyn AdminStore>, cache: CacheStore) -> Self {
        Self { registry, store, cache }
    }

    /// Reload the tenant table into the cache snapshot. The materializer
    /// reads only this snapshot on its cold path, so a refresh must happen
    /// at startup and after tenant administration.
    pub async fn refresh_registry_cache(&self) -> Result<usize, ServiceError> {
        let tenants = self.store.all_tenants().await?;
        let count = tenants.len();
        self.cache.set(&keys::tenant_registry(), &tenants).await;
        info!("cached {} tenant registry rows", count);
        Ok(count)
    }

    /// Enabled tenants with dedicated-database isolation.
    pub async fn db_tenants(&self) -> Result<Vec<Tenant>, ServiceError> {
        Ok(self.store.db_isolated_tenants().await?)
    }

    pub async fn tenant_scope(
        &self,
        tenant_id: i64,
    ) -> Result<Option<ConnectionScope>, ServiceError> {
        Ok(self.registry.tenant_scope(tenant_id).await?)
    }

    /// Materialize scopes for every db-isolated tenant up front. Failures
    /// are logged per tenant and do not abort the rest.
    pub async fn preheat(&self) -> Result<usize, ServiceError> {
        let tenants = self.db_tenants().await?;
        let lookups = tenants.iter().map(|t| self.registry.tenant_scope(t.id));
        let mut ready = 0;
        for (tenant, result) in tenants.iter().zip(join_all(lookups).await) {
            match result {
                Ok(Some(_)) => ready += 1,
                Ok(None) => warn!("tenant {} missing from registry cache; skipped", tenant.id),
                Err(e) => warn!("failed to materialize scope for tenant {}: {}", tenant.id, e),
            }
        }
        Ok(ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, MemoryStore};

    #[tokio::test]
    async fn refresh_populates_the_snapshot_the_materializer_reads() {
        let cache = CacheStore::new();
        let registry = Arc::new(testing::registry(cache.clone()));
        let store = Arc::new(MemoryStore::new());
        let tenant =
            testing::db_tenant(&testing::cipher(), 1_300_000_000_009, "postgres://t@h:5432/t9");
        store.seed_tenant(tenant).await;

        let service = TenantService::new(registry.clone(), store, cache.clone());

        // before the refresh the materializer cannot see the tenant
        assert!(registry.tenant_scope(1_300_000_000_009).await.unwrap().is_none());

        assert_eq!(service.refresh_registry_cache().await.unwrap(), 1);
        let scope = registry.tenant_scope(1_300_000_000_009).await.unwrap().unwrap();
        assert_eq!(scope.conn_id(), "1300000000009");
    }

    #[tokio::test]
    async fn preheat_materializes_every_db_tenant() {
        let cache = CacheStore::new();
        let registry = Arc::new(testing::registry(cache.clone()));
        let store = Arc::new(MemoryStore::new());
        let cipher = testing::cipher();
        store
            .seed_tenant(testing::db_tenant(&cipher, 1_300_000_000_010, "postgres://t@h/t10"))
            .await;
        store
            .seed_tenant(testing::db_tenant(&cipher, 1_300_000_000_011, "postgres://t@h/t11"))
            .await;
        store.seed_tenant(testing::id_tenant(1_300_000_000_012)).await;

        let service = TenantService::new(registry.clone(), store, cache);
        service.refresh_registry_cache().await.unwrap();

        assert_eq!(service.preheat().await.unwrap(), 2);
        assert_eq!(registry.stats().await.materialized, 2);
    }
}
