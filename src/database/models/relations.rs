use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::entity::{Table, TableAffinity};

/// Menu grants per role
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleMenu {
    pub id: i64,
    pub role_id: i64,
    pub menu_id: i64,
}

impl Table for RoleMenu {
    const TABLE: &'static str = "sys_role_menu";
    const AFFINITY: TableAffinity = TableAffinity::System;
    const AUDITED: bool = false;
}

/// Organization grants per role (custom data scope)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoleOrg {
    pub id: i64,
    pub role_id: i64,
    pub org_id: i64,
}

impl Table for RoleOrg {
    const TABLE: &'static str = "sys_role_org";
    const AFFINITY: TableAffinity = TableAffinity::System;
    const AUDITED: bool = false;
}

/// Role assignments per user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRole {
    pub id: i64,
    pub user_id: i64,
    pub role_id: i64,
}

impl Table for UserRole {
    const TABLE: &'static str = "sys_user_role";
    const AFFINITY: TableAffinity = TableAffinity::System;
    const AUDITED: bool = false;
}
