use serde_json::{json, Value};
use sqlx::postgres::PgArguments;
use sqlx::{self, FromRow, PgPool, Row};

use crate::database::store::StoreError;
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

/// Builds and executes SELECT statements for one table, combining the
/// caller-supplied filter DSL with row-level guard conditions. Guards are
/// ANDed onto whatever the caller asked for and cannot be opted out of.
pub struct QueryBuilder<T> {
    table_name: String,
    data: FilterData,
    guards: Vec<Value>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> QueryBuilder<T>
where
    T: for<'r> FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    pub fn new(table_name: impl Into<String>) -> Result<Self, StoreError> {
        let name = table_name.into();
        // Reuse Filter's table-name validation
        Filter::new(&name)?;
        Ok(Self {
            table_name: name,
            data: FilterData::default(),
            guards: vec![],
            _phantom: std::marker::PhantomData,
        })
    }

    pub fn filter(mut self, data: FilterData) -> Self {
        self.data = data;
        self
    }

    pub fn guard(mut self, condition: Value) -> Self {
        self.guards.push(condition);
        self
    }

    pub fn guards(mut self, conditions: Vec<Value>) -> Self {
        self.guards.extend(conditions);
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, StoreError> {
        Ok(self.build()?.to_sql()?)
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<T>, StoreError> {
        let sql_result = self.build()?.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_all(pool).await?)
    }

    pub async fn select_one(self, pool: &PgPool) -> Result<T, StoreError> {
        let sql_result = self.build()?.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_one(pool).await?)
    }

    pub async fn select_optional(self, pool: &PgPool) -> Result<Option<T>, StoreError> {
        let sql_result = self.build()?.to_sql()?;
        let mut q = sqlx::query_as::<_, T>(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query_as(q, p);
        }
        Ok(q.fetch_optional(pool).await?)
    }

    pub async fn count(self, pool: &PgPool) -> Result<i64, StoreError> {
        let sql_result = self.build()?.to_count_sql()?;
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = q.fetch_one(pool).await?;
        Ok(row.try_get("count")?)
    }

    fn build(&self) -> Result<Filter, StoreError> {
        let mut filter = Filter::new(&self.table_name)?;
        let mut data = self.data.clone();
        data.where_clause = merge_where(data.where_clause.take(), &self.guards);
        filter.assign(data)?;
        Ok(filter)
    }
}

/// AND the guard conditions onto the caller's where clause.
fn merge_where(where_clause: Option<Value>, guards: &[Value]) -> Option<Value> {
    let mut parts: Vec<Value> = where_clause.into_iter().collect();
    parts.extend(guards.iter().cloned());
    match parts.len() {
        0 => None,
        1 => Some(parts.remove(0)),
        _ => Some(json!({ "$and": parts })),
    }
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres has no u64; cast down if it fits
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays are expanded into placeholder lists before binding
        Value::Array(_) => q,
        Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}

fn bind_param_query_as<'q, O>(
    q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>,
    v: &'q Value,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, PgArguments>
where
    O: for<'r> FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) => q,
        Value::Object(_) => q.bind(v.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::Role;
    use serde_json::json;

    #[test]
    fn guards_are_anded_onto_the_user_where_clause() {
        let builder = QueryBuilder::<Role>::new("sys_role")
            .unwrap()
            .filter(FilterData {
                where_clause: Some(json!({ "status": 1 })),
                ..Default::default()
            })
            .guard(json!({ "create_user_id": 7 }));

        let sql = builder.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"sys_role\" WHERE \"is_delete\" = FALSE AND \
             (\"status\" = $1) AND (\"create_user_id\" = $2)"
        );
        assert_eq!(sql.params, vec![json!(1), json!(7)]);
    }

    #[test]
    fn guard_alone_becomes_the_where_clause() {
        let builder = QueryBuilder::<Role>::new("sys_role")
            .unwrap()
            .guard(json!({ "create_org_id": { "$in": [1, 2] } }));

        let sql = builder.to_sql().unwrap();
        assert_eq!(
            sql.query,
            "SELECT * FROM \"sys_role\" WHERE \"is_delete\" = FALSE AND \
             \"create_org_id\" IN ($1, $2)"
        );
    }

    #[test]
    fn no_filter_no_guard_still_excludes_deleted() {
        let builder = QueryBuilder::<Role>::new("sys_role").unwrap();
        let sql = builder.to_sql().unwrap();
        assert_eq!(sql.query, "SELECT * FROM \"sys_role\" WHERE \"is_delete\" = FALSE");
    }

    #[test]
    fn merge_where_shapes() {
        assert_eq!(merge_where(None, &[]), None);
        assert_eq!(merge_where(Some(json!({ "a": 1 })), &[]), Some(json!({ "a": 1 })));
        assert_eq!(
            merge_where(Some(json!({ "a": 1 })), &[json!({ "b": 2 })]),
            Some(json!({ "$and": [{ "a": 1 }, { "b": 2 }] }))
        );
        assert_eq!(merge_where(None, &[json!({ "b": 2 })]), Some(json!({ "b": 2 })));
    }
}
