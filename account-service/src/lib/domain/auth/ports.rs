use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::CreateAccountCommand;
use crate::domain::auth::errors::AuthError;
use crate::domain::auth::errors::NotifierError;
use crate::domain::auth::models::AuthSession;
use crate::domain::auth::models::ChangePasswordCommand;
use crate::domain::auth::models::Identity;
use crate::domain::auth::models::LoginCommand;
use crate::domain::auth::models::LoginOutcome;
use crate::domain::session::models::DeviceDescriptor;

/// Port for authentication and token-lifecycle operations.
#[async_trait]
pub trait AuthServicePort: Send + Sync + 'static {
    /// Create an account and sign it in.
    ///
    /// New accounts get the `user` role and an unverified email; the
    /// verification token is handed to the notifier.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `TokenGenerationFailure` - Signing failed
    /// * `ServerError` - Storage or hashing failed
    async fn register(
        &self,
        command: CreateAccountCommand,
        device: DeviceDescriptor,
    ) -> Result<AuthSession, AuthError>;

    /// Authenticate with email and password.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown email, inactive account or wrong password
    /// * `AccountLocked` - Too many recent failures; the password was not checked
    /// * `EmailUnverified` - Correct password but unverified email; no tokens issued
    /// * `TokenGenerationFailure` - Signing failed
    /// * `ServerError` - Storage or hashing failed
    async fn login(&self, command: LoginCommand) -> Result<LoginOutcome, AuthError>;

    /// Exchange a refresh token for a new pair, revoking the presented one.
    ///
    /// # Errors
    /// * `TokenExpired` - Refresh token past its expiry
    /// * `TokenInvalid` - Bad signature, revoked, already rotated, or account gone
    async fn refresh(
        &self,
        refresh_token: &str,
        device: DeviceDescriptor,
    ) -> Result<AuthSession, AuthError>;

    /// Revoke every session of the account.
    async fn logout(&self, account_id: &AccountId) -> Result<(), AuthError>;

    /// Replace the password after checking the current one, then revoke every
    /// session.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Current password is wrong
    /// * `Validation` - New password equals the current one
    /// * `NotFound` - Account does not exist or is inactive
    async fn change_password(
        &self,
        account_id: &AccountId,
        command: ChangePasswordCommand,
    ) -> Result<(), AuthError>;

    /// Consume an email-verification token.
    ///
    /// # Errors
    /// * `InvalidVerificationToken` - Unknown or expired token
    async fn verify_email(&self, token: &str) -> Result<(), AuthError>;

    /// Resolve an access token to the identity of an active account.
    ///
    /// # Errors
    /// * `TokenExpired` - Signature valid but past expiry
    /// * `TokenInvalid` - Bad signature, malformed subject, missing or inactive account
    /// * `ServerError` - Account lookup failed
    async fn authenticate(&self, access_token: &str) -> Result<Identity, AuthError>;
}

/// Outbound notifications about account lifecycle events.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountNotifier: Send + Sync + 'static {
    /// A verification token was issued for `account`.
    ///
    /// # Arguments
    /// * `token` - Raw token to deliver; only its digest is stored
    async fn verification_issued(&self, account: &Account, token: &str)
        -> Result<(), NotifierError>;
}
