use super::engine::PharmacyEngine;
use crate::domain::user::{Permission, User};
use crate::error::{PharmacyError, Result};
use tracing::info;

/// The user logged in on one front end, if any.
#[derive(Debug, Default)]
pub struct Session {
    user: Option<User>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current user when the credentials match.
    pub async fn login(&mut self, engine: &PharmacyEngine, username: &str, password: &str) -> bool {
        match engine.login(username, password).await {
            Some(user) => {
                self.user = Some(user);
                true
            }
            None => false,
        }
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.user.take() {
            info!(user = %user.username, "logged out");
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The current user, provided their role grants `permission`.
    pub fn authorize(&self, permission: Permission) -> Result<&User> {
        let user = self
            .user
            .as_ref()
            .ok_or_else(|| PharmacyError::AccessDenied("not logged in".to_string()))?;
        if user.role.grants(permission) {
            Ok(user)
        } else {
            Err(PharmacyError::AccessDenied(format!(
                "{} may not {permission}",
                user.role
            )))
        }
    }
}
