use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::entity::{Table, TableAffinity};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Menu {
    pub id: i64,
    pub pid: i64,
    pub title: String,
    pub permission: Option<String>,
    pub order_no: i32,
    pub status: i32,
}

impl Table for Menu {
    const TABLE: &'static str = "sys_menu";
    const AFFINITY: TableAffinity = TableAffinity::System;
    const AUDITED: bool = false;
}
