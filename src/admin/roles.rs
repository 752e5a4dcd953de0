/// Admin Role Management
use crate::{
    admin::AdminUser,
    error::{AppError, AppResult},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Admin role levels, lowest privilege first.
///
/// The derived `Ord` is the single definition of the privilege order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access to the back office
    Viewer,
    /// Can edit catalogue content (wines, wineries, knowledge base)
    Editor,
    /// Can perform most admin actions, including reading the audit log
    Admin,
    /// Full access
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    /// Check if this role can perform actions requiring another role
    pub fn can_act_as(&self, required: Role) -> bool {
        self >= &required
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "admin" => Ok(Role::Admin),
            "superadmin" | "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(AppError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `user` is active and holds `required` or a higher role
pub fn has_permission(user: &AdminUser, required: Role) -> bool {
    user.active && user.role.can_act_as(required)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_with(role: Role) -> AdminUser {
        AdminUser {
            id: "a1".to_string(),
            email: "staff@example.com".to_string(),
            name: "Staff".to_string(),
            role,
            active: true,
        }
    }

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::SuperAdmin > Role::Admin);
        assert!(Role::Admin > Role::Editor);
        assert!(Role::Editor > Role::Viewer);

        assert!(Role::SuperAdmin.can_act_as(Role::Admin));
        assert!(Role::Admin.can_act_as(Role::Editor));
        assert!(Role::Editor.can_act_as(Role::Editor));

        assert!(!Role::Viewer.can_act_as(Role::Editor));
        assert!(!Role::Admin.can_act_as(Role::SuperAdmin));
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("viewer".parse::<Role>().unwrap(), Role::Viewer);
        assert_eq!("editor".parse::<Role>().unwrap(), Role::Editor);
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("superadmin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert_eq!("super_admin".parse::<Role>().unwrap(), Role::SuperAdmin);

        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_names() {
        assert_eq!(serde_json::to_string(&Role::SuperAdmin).unwrap(), "\"superadmin\"");
        let role: Role = serde_json::from_str("\"editor\"").unwrap();
        assert_eq!(role, Role::Editor);
    }

    #[test]
    fn test_has_permission_exhaustive() {
        let all = [Role::Viewer, Role::Editor, Role::Admin, Role::SuperAdmin];
        for held in all {
            for required in all {
                assert_eq!(
                    has_permission(&admin_with(held), required),
                    held >= required,
                    "{held} vs {required}"
                );
            }
        }
    }

    #[test]
    fn test_inactive_admin_has_no_permissions() {
        let mut admin = admin_with(Role::SuperAdmin);
        admin.active = false;
        assert!(!has_permission(&admin, Role::Viewer));
    }

    #[test]
    fn test_editor_cannot_act_as_superadmin() {
        assert!(!has_permission(&admin_with(Role::Editor), Role::SuperAdmin));
    }
}
