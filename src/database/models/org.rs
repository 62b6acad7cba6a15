use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::entity::{Table, TableAffinity};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Org {
    pub id: i64,
    pub pid: i64,
    pub name: String,
    pub code: String,
    pub level: i32,
    pub status: i32,
    pub tenant_id: Option<i64>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub create_user_id: Option<i64>,
    pub create_user_name: Option<String>,
    pub update_user_id: Option<i64>,
    pub update_user_name: Option<String>,
    pub create_org_id: Option<i64>,
    pub is_delete: bool,
}

impl Table for Org {
    const TABLE: &'static str = "sys_org";
    const AFFINITY: TableAffinity = TableAffinity::Tenant;
    const AUDITED: bool = true;
}
