use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::entity::{Table, TableAffinity};
use crate::types::AccountType;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub account: String,
    pub nick_name: Option<String>,
    pub real_name: Option<String>,
    pub account_type: i32,
    pub org_id: Option<i64>,
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

impl User {
    pub fn account_type(&self) -> Option<AccountType> {
        AccountType::from_i32(self.account_type)
    }

    pub fn is_super_admin(&self) -> bool {
        self.account_type() == Some(AccountType::SuperAdmin)
    }
}

impl Table for User {
    const TABLE: &'static str = "sys_user";
    const AFFINITY: TableAffinity = TableAffinity::Tenant;
    const AUDITED: bool = true;
}
