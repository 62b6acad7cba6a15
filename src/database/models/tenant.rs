use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::entity::{Table, TableAffinity};

/// Tenant isolation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantType {
    /// Shared schema, rows discriminated by tenant_id column
    Id = 0,
    /// Dedicated database, connection string stored encrypted on the row
    Db = 1,
}

impl TenantType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(TenantType::Id),
            1 => Some(TenantType::Db),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub org_id: Option<i64>,
    pub user_id: Option<i64>,
    pub host: Option<String>,
    pub tenant_type: i32,
    pub db_type: String,
    /// Connection URL, encrypted with the tenant cipher
    pub connection: String,
    /// JSON array of read-replica URLs, or null
    pub slave_connections: Option<String>,
    pub status: i32,
    pub remark: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
    pub create_user_id: Option<i64>,
    pub create_user_name: Option<String>,
    pub update_user_id: Option<i64>,
    pub update_user_name: Option<String>,
    pub create_org_id: Option<i64>,
    pub is_delete: bool,
}

impl Tenant {
    pub fn tenant_type(&self) -> Option<TenantType> {
        TenantType::from_i32(self.tenant_type)
    }

    pub fn is_db_isolated(&self) -> bool {
        self.tenant_type() == Some(TenantType::Db)
    }
}

impl Table for Tenant {
    const TABLE: &'static str = "sys_tenant";
    const AFFINITY: TableAffinity = TableAffinity::System;
    const AUDITED: bool = false;
}
