use std::sync::Arc;

use crate::auth::AuthUser;
use crate::cache::{keys, CacheStore};
use crate::database::store::{AdminStore, StoreError};
use crate::filter::row::DataScope;

/// Organization membership resolution.
///
/// The visible set is computed only on cache miss and stored under the
/// per-user org key; role/grant mutations evict the entry synchronously.
pub struct OrgService {
    store: Arc<dyn AdminStore>,
    cache: CacheStore,
}

impl OrgService {
    pub fn new(store: Arc<dyn AdminStore>, cache: CacheStore) -> Self {
        Self { store, cache }
    }

    /// The organization ids whose rows the user may see:
    /// - All scope: every organization
    /// - Org scope: the user's own subtree
    /// - Custom scope: role-org grants plus the user's own organization
    /// - Self scope: empty (the creator filter takes over)
    pub async fn visible_org_ids(&self, user: &AuthUser) -> Result<Vec<i64>, StoreError> {
        let key = keys::user_orgs(user.user_id);
        if let Some(ids) = self.cache.get::<Vec<i64>>(&key).await {
            return Ok(ids);
        }

        let scopes = self.store.data_scopes_for_user(user, user.user_id).await?;
        let ids = match DataScope::broadest(scopes) {
            DataScope::All => self.store.all_org_ids(user).await?,
            DataScope::Org => match user.org_id {
                Some(org_id) => self.store.org_subtree_ids(user, org_id).await?,
                None => vec![],
            },
            DataScope::Custom => {
                let role_ids = self.store.role_ids_for_user(user.user_id).await?;
                let mut ids = self.store.org_ids_for_roles(&role_ids).await?;
                if let Some(own) = user.org_id {
                    if !ids.contains(&own) {
                        ids.push(own);
                    }
                }
                ids
            }
            DataScope::SelfOnly => vec![],
        };

        self.cache.set(&key, &ids).await;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{normal_user, MemoryStore};
    use crate::types::next_id;

    #[tokio::test]
    async fn custom_scope_unions_grants_with_own_org() {
        let store = Arc::new(MemoryStore::new());
        let user = normal_user(7, Some(100));
        let role_id = next_id();
        store.seed_role(role_id, "ops", "ops", DataScope::Custom).await;
        store.seed_user_role(user.user_id, role_id).await;
        store.seed_role_org(role_id, 201).await;
        store.seed_role_org(role_id, 202).await;

        let service = OrgService::new(store, CacheStore::new());
        let mut ids = service.visible_org_ids(&user).await.unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![100, 201, 202]);
    }

    #[tokio::test]
    async fn org_scope_returns_subtree() {
        let store = Arc::new(MemoryStore::new());
        let user = normal_user(7, Some(100));
        let role_id = next_id();
        store.seed_role(role_id, "manager", "mgr", DataScope::Org).await;
        store.seed_user_role(user.user_id, role_id).await;
        store.seed_org(100, 0).await;
        store.seed_org(110, 100).await;
        store.seed_org(111, 110).await;
        store.seed_org(200, 0).await;

        let service = OrgService::new(store, CacheStore::new());
        let mut ids = service.visible_org_ids(&user).await.unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![100, 110, 111]);
    }

    #[tokio::test]
    async fn roleless_user_sees_no_orgs() {
        let store = Arc::new(MemoryStore::new());
        let user = normal_user(7, Some(100));
        let service = OrgService::new(store, CacheStore::new());
        assert!(service.visible_org_ids(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let store = Arc::new(MemoryStore::new());
        let user = normal_user(7, Some(100));
        let role_id = next_id();
        store.seed_role(role_id, "ops", "ops", DataScope::Custom).await;
        store.seed_user_role(user.user_id, role_id).await;
        store.seed_role_org(role_id, 201).await;

        let cache = CacheStore::new();
        let service = OrgService::new(store.clone(), cache.clone());
        service.visible_org_ids(&user).await.unwrap();
        let calls_after_first = store.data_scope_calls();

        service.visible_org_ids(&user).await.unwrap();
        assert_eq!(store.data_scope_calls(), calls_after_first);
        assert!(cache.contains(&keys::user_orgs(user.user_id)).await);
    }
}
