/// Role checks for staff members
///
/// Roles travel inside the access token, so every check here is a pure
/// function of the [`AuthContext`]. The named role sets mirror the club's
/// access matrix; anything not listed is open to every authenticated user.
///
/// # Example
///
/// ```
/// use clubdesk_shared::auth::authorization::{require_any_role, FINANCE_ROLES};
/// use clubdesk_shared::auth::middleware::AuthContext;
/// use clubdesk_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// let auth = AuthContext {
///     user_id: Uuid::new_v4(),
///     username: "coach".to_string(),
///     role: UserRole::Teacher,
/// };
///
/// assert!(require_any_role(&auth, FINANCE_ROLES).is_err());
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::user::UserRole;

/// Expenses and the finances pages
pub const FINANCE_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Financier];

/// Editing and deleting payments
pub const PAYMENT_EDIT_ROLES: &[UserRole] =
    &[UserRole::Admin, UserRole::Financier, UserRole::PaymentAdmin];

/// The payment desk's own history screen
pub const PAYMENT_HISTORY_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::PaymentAdmin];

/// Marking attendance by hand
pub const ROLL_CALL_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Teacher];

/// Issuing rewards to students
pub const REWARD_ISSUE_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Teacher];

/// Club settings updates
pub const SETTINGS_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Financier];

/// Cash handed over from the desk
pub const CASH_TRANSFER_ROLES: &[UserRole] =
    &[UserRole::Admin, UserRole::Financier, UserRole::PaymentAdmin];

/// Staff accounts, credentials and reward types
pub const ADMIN_ROLES: &[UserRole] = &[UserRole::Admin];

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Role not in the allowed set
    #[error("Access denied for role {0}")]
    InsufficientRole(UserRole),

    /// Teacher acting outside their own group
    #[error("Teachers can only manage students of their own group")]
    ForeignGroup,
}

/// Passes when the caller's role is one of `allowed`
pub fn require_any_role(auth: &AuthContext, allowed: &[UserRole]) -> Result<(), AuthzError> {
    if allowed.contains(&auth.role) {
        Ok(())
    } else {
        Err(AuthzError::InsufficientRole(auth.role))
    }
}

/// Shorthand for `require_any_role(auth, ADMIN_ROLES)`
pub fn require_admin(auth: &AuthContext) -> Result<(), AuthzError> {
    require_any_role(auth, ADMIN_ROLES)
}

/// Restricts teachers to students of their own group
///
/// Other roles pass unconditionally. A teacher without an assigned group can
/// manage nobody.
pub fn require_group_access(
    auth: &AuthContext,
    teacher_group: Option<Uuid>,
    student_group: Option<Uuid>,
) -> Result<(), AuthzError> {
    if auth.role != UserRole::Teacher {
        return Ok(());
    }

    match (teacher_group, student_group) {
        (Some(own), Some(theirs)) if own == theirs => Ok(()),
        _ => Err(AuthzError::ForeignGroup),
    }
}
