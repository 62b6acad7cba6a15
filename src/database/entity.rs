use serde::{Deserialize, Serialize};

/// Which connection scope a table binds to.
///
/// Every persisted table carries exactly one affinity:
/// - `Tenant`: follows the caller's tenant (default scope for the default
///   tenant, a materialized tenant scope otherwise)
/// - `System`: always the default scope, regardless of caller
/// - `Log`: the log scope when one is configured, default scope otherwise
/// - `Dedicated`: pinned to a named connection, independent of the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableAffinity {
    Tenant,
    System,
    Log,
    Dedicated(&'static str),
}

/// Compile-time table metadata. `AUDITED` marks tables deriving from the
/// audited base shape (creator/org columns), which makes them subject to
/// row-level data-scope and organization filters.
pub trait Table {
    const TABLE: &'static str;
    const AFFINITY: TableAffinity;
    const AUDITED: bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityMeta {
    pub table: &'static str,
    pub affinity: TableAffinity,
    pub audited: bool,
}

impl EntityMeta {
    pub const fn of<T: Table>() -> Self {
        Self { table: T::TABLE, affinity: T::AFFINITY, audited: T::AUDITED }
    }
}

/// Explicit registration list of every known table, resolved once at startup
/// and passed into the filter builder. Replaces attribute scanning: a table
/// that is not registered here is invisible to row filtering.
#[derive(Debug, Clone)]
pub struct EntityCatalog {
    entries: Vec<EntityMeta>,
}

impl EntityCatalog {
    pub fn new(entries: Vec<EntityMeta>) -> Self {
        Self { entries }
    }

    /// All built-in admin tables.
    pub fn builtin() -> Self {
        use crate::database::models::{Menu, OpLog, Org, Role, RoleMenu, RoleOrg, Tenant, User, UserRole};
        Self::new(vec![
            EntityMeta::of::<User>(),
            EntityMeta::of::<Role>(),
            EntityMeta::of::<Org>(),
            EntityMeta::of::<Menu>(),
            EntityMeta::of::<Tenant>(),
            EntityMeta::of::<RoleMenu>(),
            EntityMeta::of::<RoleOrg>(),
            EntityMeta::of::<UserRole>(),
            EntityMeta::of::<OpLog>(),
        ])
    }

    pub fn with(mut self, meta: EntityMeta) -> Self {
        self.entries.push(meta);
        self
    }

    pub fn find(&self, table: &str) -> Option<&EntityMeta> {
        self.entries.iter().find(|m| m.table == table)
    }

    pub fn audited(&self) -> impl Iterator<Item = &EntityMeta> {
        self.entries.iter().filter(|m| m.audited)
    }

    /// A table pinned to a dedicated connection is only eligible for filters
    /// built against that connection; everything else is eligible everywhere.
    pub fn eligible(&self, meta: &EntityMeta, conn_id: &str) -> bool {
        match meta.affinity {
            TableAffinity::Dedicated(pinned) => pinned == conn_id,
            _ => true,
        }
    }

    /// Eligibility by table name; unregistered tables carry no tag and are
    /// eligible for every scope.
    pub fn eligible_table(&self, table: &str, conn_id: &str) -> bool {
        match self.find(table) {
            Some(meta) => self.eligible(meta, conn_id),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    impl Table for Widget {
        const TABLE: &'static str = "widget";
        const AFFINITY: TableAffinity = TableAffinity::Dedicated("analytics");
        const AUDITED: bool = true;
    }

    #[test]
    fn builtin_catalog_registers_admin_tables() {
        let catalog = EntityCatalog::builtin();
        assert!(catalog.find("sys_user").is_some());
        assert!(catalog.find("sys_role").is_some());
        assert!(catalog.find("sys_op_log").is_some());
        assert!(catalog.find("nope").is_none());
    }

    #[test]
    fn audited_tables_are_the_filterable_set() {
        let catalog = EntityCatalog::builtin();
        let audited: Vec<_> = catalog.audited().map(|m| m.table).collect();
        assert!(audited.contains(&"sys_user"));
        assert!(audited.contains(&"sys_role"));
        assert!(audited.contains(&"sys_org"));
        assert!(!audited.contains(&"sys_role_menu"));
        assert!(!audited.contains(&"sys_op_log"));
    }

    #[test]
    fn dedicated_tables_are_scope_exclusive() {
        let catalog = EntityCatalog::builtin().with(EntityMeta::of::<Widget>());
        assert!(catalog.eligible_table("widget", "analytics"));
        assert!(!catalog.eligible_table("widget", "main"));
        // untagged tables are eligible everywhere
        assert!(catalog.eligible_table("sys_user", "main"));
        assert!(catalog.eligible_table("sys_user", "analytics"));
        assert!(catalog.eligible_table("unregistered", "anything"));
    }
}
