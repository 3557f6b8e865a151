mod audit_service;
mod dashboard_service;
mod user_service;

pub use audit_service::*;
pub use dashboard_service::*;
pub use user_service::*;
