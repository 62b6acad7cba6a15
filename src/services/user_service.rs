use std::sync::Arc;

use crate::auth::AuthUser;
use crate::cache::{keys, CacheStore};
use crate::database::store::{AdminStore, StoreError};
use crate::filter::row::DataScope;

pub struct UserService {
    store: Arc<dyn AdminStore>,
    cache: CacheStore,
}

impl UserService {
    pub fn new(store: Arc<dyn AdminStore>, cache: CacheStore) -> Self {
        Self { store, cache }
    }

    /// Broadest role-derived data scope for a user, computed from role
    /// assignments only on cache miss. A user with no enabled roles falls
    /// back to self-only visibility.
    pub async fn max_data_scope(&self, user: &AuthUser) -> Result<DataScope, StoreError> {
        let key = keys::user_max_data_scope(user.user_id);
        if let Some(scope) = self.cache.get::<DataScope>(&key).await {
            return Ok(scope);
        }

        let scopes = self.store.data_scopes_for_user(user, user.user_id).await?;
        let scope = DataScope::broadest(scopes);
        self.cache.set(&key, &scope).await;
        Ok(scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{normal_user, MemoryStore};
    use crate::types::next_id;

    #[tokio::test]
    async fn broadest_scope_wins_across_roles() {
        let store = Arc::new(MemoryStore::new());
        let user = normal_user(7, Some(100));
        let narrow = next_id();
        let wide = next_id();
        store.seed_role(narrow, "viewer", "viewer", DataScope::SelfOnly).await;
        store.seed_role(wide, "auditor", "auditor", DataScope::Org).await;
        store.seed_user_role(user.user_id, narrow).await;
        store.seed_user_role(user.user_id, wide).await;

        let service = UserService::new(store, CacheStore::new());
        assert_eq!(service.max_data_scope(&user).await.unwrap(), DataScope::Org);
    }

    #[tokio::test]
    async fn roleless_user_defaults_to_self_only() {
        let store = Arc::new(MemoryStore::new());
        let user = normal_user(7, None);
        let service = UserService::new(store, CacheStore::new());
        assert_eq!(service.max_data_scope(&user).await.unwrap(), DataScope::SelfOnly);
    }

    #[tokio::test]
    async fn cached_scope_skips_recomputation() {
        let store = Arc::new(MemoryStore::new());
        let user = normal_user(7, None);
        let role_id = next_id();
        store.seed_role(role_id, "ops", "ops", DataScope::All).await;
        store.seed_user_role(user.user_id, role_id).await;

        let service = UserService::new(store.clone(), CacheStore::new());
        assert_eq!(service.max_data_scope(&user).await.unwrap(), DataScope::All);
        let calls = store.data_scope_calls();
        assert_eq!(service.max_data_scope(&user).await.unwrap(), DataScope::All);
        assert_eq!(store.data_scope_calls(), calls);
    }
}
