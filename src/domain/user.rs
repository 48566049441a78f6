use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub enum Role {
    Admin,
    Doctor,
    Pharmacist,
    Billing,
}

/// Operations a signed-in user may be allowed to perform.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Permission {
    ManageUsers,
    ViewInventory,
    ManageInventory,
    Prescribe,
    Dispense,
    ProcessPayments,
    ViewRevenue,
    ViewReports,
    AuditIntegrity,
}

impl Role {
    pub fn grants(self, permission: Permission) -> bool {
        use Permission::*;
        match self {
            Role::Admin => matches!(
                permission,
                ManageUsers | ViewInventory | ViewRevenue | ViewReports | AuditIntegrity
            ),
            Role::Doctor => matches!(permission, ViewInventory | Prescribe),
            Role::Pharmacist => matches!(permission, ViewInventory | ManageInventory | Dispense),
            Role::Billing => matches!(permission, ProcessPayments | ViewRevenue),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Permission::ManageUsers => "manage users",
            Permission::ViewInventory => "view inventory",
            Permission::ManageInventory => "manage inventory",
            Permission::Prescribe => "prescribe",
            Permission::Dispense => "dispense",
            Permission::ProcessPayments => "process payments",
            Permission::ViewRevenue => "view revenue",
            Permission::ViewReports => "view reports",
            Permission::AuditIntegrity => "audit integrity",
        };
        f.write_str(action)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Admin => "Admin",
            Role::Doctor => "Doctor",
            Role::Pharmacist => "Pharmacist",
            Role::Billing => "Billing",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "admin" => Ok(Role::Admin),
            "1" | "doctor" => Ok(Role::Doctor),
            "2" | "pharmacist" => Ok(Role::Pharmacist),
            "3" | "billing" => Ok(Role::Billing),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            role,
        }
    }

    /// Accounts created on first start when no users have been stored yet.
    pub fn defaults() -> Vec<User> {
        vec![
            User::new("admin", "admin123", Role::Admin),
            User::new("doc", "1234", Role::Doctor),
            User::new("pharm", "1234", Role::Pharmacist),
            User::new("bill", "1234", Role::Billing),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_grants_follow_duties() {
        assert!(Role::Doctor.grants(Permission::Prescribe));
        assert!(!Role::Doctor.grants(Permission::Dispense));
        assert!(Role::Pharmacist.grants(Permission::Dispense));
        assert!(!Role::Pharmacist.grants(Permission::ProcessPayments));
        assert!(Role::Billing.grants(Permission::ProcessPayments));
        assert!(Role::Admin.grants(Permission::ManageUsers));
        assert!(!Role::Admin.grants(Permission::Prescribe));
    }

    #[test]
    fn test_role_parsing_accepts_index_and_name() {
        assert_eq!("1".parse::<Role>().unwrap(), Role::Doctor);
        assert_eq!("Billing".parse::<Role>().unwrap(), Role::Billing);
        assert!("nurse".parse::<Role>().is_err());
    }
}
