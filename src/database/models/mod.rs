pub mod menu;
pub mod op_log;
pub mod org;
pub mod relations;
pub mod role;
pub mod tenant;
pub mod user;

pub use menu::Menu;
pub use op_log::OpLog;
pub use org::Org;
pub use relations::{RoleMenu, RoleOrg, UserRole};
pub use role::Role;
pub use tenant::{Tenant, TenantType};
pub use user::User;
