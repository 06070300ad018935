//! Signed-in session as exposed by the auth provider.

use serde::{Deserialize, Serialize};

use super::user::UserRole;
use crate::error::AppError;

/// Current user identity and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub role: UserRole,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins and moderators.
    pub fn can_moderate(&self) -> bool {
        matches!(self.role, UserRole::Admin | UserRole::Moderator)
    }

    /// Fail with [`AppError::Forbidden`] unless the session is an admin.
    pub fn require_admin(&self, action: &str) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("{} requires the admin role", action)))
        }
    }

    /// Fail unless the session is an admin or moderator.
    pub fn require_moderator(&self, action: &str) -> Result<(), AppError> {
        if self.can_moderate() {
            Ok(())
        } else {
            Err(AppError::forbidden(format!("{} requires the moderator role", action)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gates() {
        let admin = Session::new("a", UserRole::Admin);
        let moderator = Session::new("m", UserRole::Moderator);
        let member = Session::new("u", UserRole::Member);

        assert!(admin.require_admin("Saving users").is_ok());
        assert!(moderator.require_admin("Saving users").is_err());
        assert!(moderator.require_moderator("Changing status").is_ok());

        let err = member.require_moderator("Changing status").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Forbidden: Changing status requires the moderator role"
        );
    }
}
