use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::entity::{Table, TableAffinity};
use crate::filter::row::DataScope;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub order_no: i32,
    pub data_scope: i32,
    pub status: i32,
    pub remark: Option<String>,
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

impl Role {
    pub fn data_scope(&self) -> DataScope {
        DataScope::from_i32(self.data_scope).unwrap_or(DataScope::SelfOnly)
    }
}

impl Table for Role {
    const TABLE: &'static str = "sys_role";
    const AFFINITY: TableAffinity = TableAffinity::Tenant;
    const AUDITED: bool = true;
}
