mod audit_log;
mod role;
mod user;

pub use audit_log::*;
pub use role::*;
pub use user::*;
