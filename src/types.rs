/// Shared types used across the codebase
use serde::{Deserialize, Serialize};

/// Row status used by every toggleable entity (roles, users, orgs, tenants)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Enabled = 1,
    Disabled = 2,
}

impl Status {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(Status::Enabled),
            2 => Some(Status::Disabled),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Account classification carried in the JWT and on the user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    SuperAdmin = 1,
    SysAdmin = 2,
    Normal = 3,
    Member = 4,
}

impl AccountType {
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            1 => Some(AccountType::SuperAdmin),
            2 => Some(AccountType::SysAdmin),
            3 => Some(AccountType::Normal),
            4 => Some(AccountType::Member),
            _ => None,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Timestamp-prefixed unique id, shaped like the seeded snowflake ids
pub fn next_id() -> i64 {
    use rand::Rng;
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: i64 = rand::thread_rng().gen_range(0..1000);
    millis * 1000 + suffix
}

/// One page of results plus the unpaged total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        Self { items, total, page, page_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_i32() {
        assert_eq!(Status::from_i32(1), Some(Status::Enabled));
        assert_eq!(Status::from_i32(2), Some(Status::Disabled));
        assert_eq!(Status::from_i32(0), None);
        assert_eq!(Status::Enabled.as_i32(), 1);
    }

    #[test]
    fn account_type_rejects_unknown_values() {
        assert_eq!(AccountType::from_i32(4), Some(AccountType::Member));
        assert_eq!(AccountType::from_i32(9), None);
    }

    #[test]
    fn generated_ids_are_positive_and_vary() {
        let ids: std::collections::HashSet<i64> = (0..64).map(|_| next_id()).collect();
        assert!(ids.iter().all(|&id| id > 0));
        assert!(ids.len() > 1);
    }
}
