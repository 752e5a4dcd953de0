/// Admin identities, roles and the audit trail
///
/// Admin records are provisioned out of band and only read by the request
/// pipeline. Every administrative action is appended to the audit log.

pub mod audit;
pub mod directory;
pub mod roles;

pub use audit::{AuditLogEntry, AuditLogger, AuditRequestContext, NewAuditEntry};
pub use directory::AdminDirectory;
pub use roles::{has_permission, Role};

use serde::{Deserialize, Serialize};

/// Identity record for a back-office operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
}
