use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::role::{RoleSet, ADMIN, SUPER_ADMIN};
use crate::config::AuthzConfig;

/// Every admin operation exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ViewSelf,
    ViewDashboard,
    ListUsers,
    ViewUser,
    UpdateUser,
    DeleteUser,
    ListRoles,
    AssignRole,
    RevokeRole,
    ListAuditLogs,
}

impl Operation {
    pub const ALL: [Operation; 10] = [
        Operation::ViewSelf,
        Operation::ViewDashboard,
        Operation::ListUsers,
        Operation::ViewUser,
        Operation::UpdateUser,
        Operation::DeleteUser,
        Operation::ListRoles,
        Operation::AssignRole,
        Operation::RevokeRole,
        Operation::ListAuditLogs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ViewSelf => "view_self",
            Operation::ViewDashboard => "view_dashboard",
            Operation::ListUsers => "list_users",
            Operation::ViewUser => "view_user",
            Operation::UpdateUser => "update_user",
            Operation::DeleteUser => "delete_user",
            Operation::ListRoles => "list_roles",
            Operation::AssignRole => "assign_role",
            Operation::RevokeRole => "revoke_role",
            Operation::ListAuditLogs => "list_audit_logs",
        }
    }

    /// Requirement used when configuration does not override the operation.
    pub fn default_requirement(&self) -> RoleSet {
        match self {
            Operation::ViewSelf => RoleSet::new(),
            Operation::ViewDashboard
            | Operation::ListUsers
            | Operation::ViewUser
            | Operation::UpdateUser
            | Operation::ListRoles => [SUPER_ADMIN, ADMIN].into_iter().collect(),
            Operation::DeleteUser
            | Operation::AssignRole
            | Operation::RevokeRole
            | Operation::ListAuditLogs => [SUPER_ADMIN].into_iter().collect(),
        }
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mapping from operation to the role set sufficient to run it.
///
/// An empty set means the operation is not role-gated.
#[derive(Debug, Clone)]
pub struct OperationPolicy {
    requirements: HashMap<Operation, RoleSet>,
}

impl OperationPolicy {
    pub fn defaults() -> Self {
        let requirements = Operation::ALL
            .iter()
            .map(|op| (*op, op.default_requirement()))
            .collect();
        Self { requirements }
    }

    pub fn from_config(config: &AuthzConfig) -> Self {
        let mut policy = Self::defaults();
        for (id, roles) in &config.operations {
            let op = match id.parse::<Operation>() {
                Ok(op) => op,
                Err(e) => {
                    tracing::warn!("Ignoring operation override: {}", e);
                    continue;
                }
            };
            let required: RoleSet = roles.iter().map(String::as_str).collect();
            if required.is_empty() {
                tracing::warn!(operation = %op, "operation override removes its role requirement");
            }
            policy.requirements.insert(op, required);
        }
        policy
    }

    pub fn required(&self, op: Operation) -> RoleSet {
        self.requirements.get(&op).cloned().unwrap_or_default()
    }
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self::defaults()
    }
}
