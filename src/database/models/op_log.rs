use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::database::entity::{Table, TableAffinity};

/// Operation audit trail; lands in the log database when one is configured.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpLog {
    pub id: i64,
    pub account: Option<String>,
    pub method: String,
    pub message: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
}

impl Table for OpLog {
    const TABLE: &'static str = "sys_op_log";
    const AFFINITY: TableAffinity = TableAffinity::Log;
    const AUDITED: bool = false;
}
