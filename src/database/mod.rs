pub mod entity;
pub mod models;
pub mod pg_store;
pub mod query_builder;
pub mod repository;
pub mod scope;
pub mod store;

pub use repository::Repository;
pub use scope::{ConnectionScope, ScopeError, ScopeRegistry, DEFAULT_TENANT_ID};
pub use store::{AdminStore, StoreError};
