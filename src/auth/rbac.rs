//! Role checks applied by handlers after authentication.

use super::{AuthError, AuthUser};
use crate::entities::user::Role;

/// Allows only administrators.
pub fn require_admin(user: &AuthUser) -> Result<(), AuthError> {
    require_any(user, &[Role::Admin])
}

/// Allows administrators and clerks.
pub fn require_clerk_or_admin(user: &AuthUser) -> Result<(), AuthError> {
    require_any(user, &[Role::Admin, Role::Clerk])
}

fn require_any(user: &AuthUser, allowed: &[Role]) -> Result<(), AuthError> {
    if allowed.contains(&user.role) {
        Ok(())
    } else {
        tracing::debug!(user_id = user.id, role = %user.role, "role check failed");
        Err(AuthError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: 1,
            name: "Test".into(),
            email: "test@kasap.com".into(),
            role,
        }
    }

    #[rstest]
    #[case(Role::Admin, true, true)]
    #[case(Role::Clerk, false, true)]
    #[case(Role::Regular, false, false)]
    fn role_matrix(#[case] role: Role, #[case] admin_ok: bool, #[case] clerk_ok: bool) {
        let user = user(role);
        assert_eq!(require_admin(&user).is_ok(), admin_ok);
        assert_eq!(require_clerk_or_admin(&user).is_ok(), clerk_ok);
    }
}
