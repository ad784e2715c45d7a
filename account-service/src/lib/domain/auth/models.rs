use auth::IssuedTokens;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::NewPassword;
use crate::domain::account::models::OrganizationId;
use crate::domain::account::models::Role;
use crate::domain::session::models::DeviceDescriptor;

/// The authenticated caller, as attached to a request.
///
/// Carries no profile data or credential material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub account_id: AccountId,
    pub roles: Vec<Role>,
    pub organization_id: Option<OrganizationId>,
}

impl Identity {
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        self.roles.iter().any(|role| allowed.contains(role))
    }
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.id,
            roles: account.roles.clone(),
            organization_id: account.organization_id,
        }
    }
}

/// Login request after input validation.
#[derive(Debug)]
pub struct LoginCommand {
    pub email: EmailAddress,
    pub password: String,
    pub device: DeviceDescriptor,
}

/// Password change request after input validation.
#[derive(Debug)]
pub struct ChangePasswordCommand {
    pub current_password: String,
    pub new_password: NewPassword,
}

/// An account together with a freshly issued token pair.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub account: Account,
    pub tokens: IssuedTokens,
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub session: AuthSession,
    /// Last login before this one.
    pub previous_login_at: Option<DateTime<Utc>>,
}
