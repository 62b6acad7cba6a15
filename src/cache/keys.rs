//! Key naming scheme for the shared cache store.
//!
//! Per-user entries are keyed by user id alone; filter entries additionally
//! carry the connection id, because the same user is filtered differently
//! per tenant database.

/// Visible organization id set for a user
pub fn user_orgs(user_id: i64) -> String {
    format!("user:orgs:{}", user_id)
}

/// Broadest role-derived data scope for a user
pub fn user_max_data_scope(user_id: i64) -> String {
    format!("user:max-data-scope:{}", user_id)
}

/// Organization-scope filter set for a (connection, user) pair
pub fn org_filter(conn_id: &str, user_id: i64) -> String {
    format!("db:{}:org-filter:{}", conn_id, user_id)
}

/// Self-scope filter set for a (connection, user) pair
pub fn data_scope_filter(conn_id: &str, user_id: i64) -> String {
    format!("db:{}:data-scope:{}", conn_id, user_id)
}

/// Custom provider filter set for a (connection, user) pair
pub fn custom_filter(conn_id: &str, user_id: i64) -> String {
    format!("db:{}:custom:{}", conn_id, user_id)
}

/// Snapshot of the tenant registry table, read by the scope materializer
pub fn tenant_registry() -> String {
    "tenant:registry".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_keys_include_connection_and_user() {
        assert_eq!(org_filter("main", 7), "db:main:org-filter:7");
        assert_eq!(data_scope_filter("1300000000005", 7), "db:1300000000005:data-scope:7");
        assert_ne!(org_filter("a", 7), org_filter("b", 7));
    }
}
