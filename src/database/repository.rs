use serde::Serialize;
use serde_json::Value;
use sqlx::{self, postgres::PgRow, FromRow};

use crate::auth::AuthUser;
use crate::database::entity::Table;
use crate::database::query_builder::QueryBuilder;
use crate::database::scope::{ConnectionScope, ScopeError, ScopeRegistry};
use crate::database::store::StoreError;
use crate::filter::row::FilterSet;
use crate::filter::FilterData;

/// Generic per-entity accessor.
///
/// At construction it resolves which connection scope the entity binds to
/// (from the entity's affinity tag and the caller's tenant); attached filter
/// sets become guard conditions on every read.
pub struct Repository<T> {
    scope: ConnectionScope,
    guards: Vec<Value>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: Table + for<'r> FromRow<'r, PgRow> + Send + Unpin + Serialize,
{
    /// Resolve the entity's scope for this caller. An unresolvable scope
    /// (unknown tenant, undeclared dedicated connection) surfaces as
    /// `ScopeError::Unavailable`, which request handling maps to a clean
    /// "feature unavailable" response.
    pub async fn open(
        registry: &ScopeRegistry,
        auth: Option<&AuthUser>,
    ) -> Result<Self, StoreError> {
        let scope = registry
            .resolve(T::AFFINITY, auth)
            .await?
            .ok_or_else(|| ScopeError::Unavailable(T::TABLE.to_string()))?;
        Ok(Self::bound(scope))
    }

    /// Bind to an already-resolved scope.
    pub fn bound(scope: ConnectionScope) -> Self {
        Self { scope, guards: vec![], _phantom: std::marker::PhantomData }
    }

    /// Attach the caller's row-filter set; conditions registered for this
    /// entity's table are ANDed onto every subsequent read.
    pub fn with_filters(mut self, filters: &FilterSet) -> Self {
        self.guards.extend(filters.where_json_for(T::TABLE));
        self
    }

    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    pub async fn select_any(&self, filter_data: FilterData) -> Result<Vec<T>, StoreError> {
        self.query()?.filter(filter_data).select_all(self.scope.read_pool()).await
    }

    pub async fn select_one(&self, filter_data: FilterData) -> Result<Option<T>, StoreError> {
        self.query()?.filter(filter_data).select_optional(self.scope.read_pool()).await
    }

    pub async fn select_404(&self, filter_data: FilterData) -> Result<T, StoreError> {
        match self.query()?.filter(filter_data).select_one(self.scope.read_pool()).await {
            Ok(row) => Ok(row),
            Err(StoreError::Sqlx(sqlx::Error::RowNotFound)) => {
                Err(StoreError::NotFound("Record not found".to_string()))
            }
            Err(other) => Err(other),
        }
    }

    pub async fn count(&self, filter_data: FilterData) -> Result<i64, StoreError> {
        self.query()?.filter(filter_data).count(self.scope.read_pool()).await
    }

    fn query(&self) -> Result<QueryBuilder<T>, StoreError> {
        Ok(QueryBuilder::new(T::TABLE)?.guards(self.guards.clone()))
    }
}
