use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;

use crate::domain::account::errors::AccountError;
use crate::domain::account::lockout::FailureOutcome;
use crate::domain::account::lockout::LockoutPolicy;
use crate::domain::account::lockout::SuccessOutcome;
use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::UpdateProfileCommand;

/// Port for account management operations exposed over HTTP.
#[async_trait]
pub trait AccountServicePort: Send + Sync + 'static {
    /// Retrieve an account by identifier.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    async fn get_account(&self, id: &AccountId) -> Result<Account, AccountError>;

    /// Apply a partial profile update.
    ///
    /// # Arguments
    /// * `id` - Account to update
    /// * `command` - Fields to change; absent fields are kept
    ///
    /// # Returns
    /// Updated account entity
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update_profile(
        &self,
        id: &AccountId,
        command: UpdateProfileCommand,
    ) -> Result<Account, AccountError>;

    /// Deactivate an account and revoke all of its sessions.
    ///
    /// The row is kept; an inactive account can neither log in nor use
    /// tokens issued before deactivation.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    /// * `SessionStore` - Revoking sessions failed
    async fn deactivate_account(&self, id: &AccountId) -> Result<Account, AccountError>;
}

/// Persistence operations for the account aggregate.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AccountRepository: Send + Sync + 'static {
    /// Persist a new account.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Database operation failed
    async fn create(&self, account: Account) -> Result<Account, AccountError>;

    /// Retrieve account by identifier, including its credential hash.
    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, AccountError>;

    /// Retrieve account by normalized email, including its credential hash.
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, AccountError>;

    /// Mark the account holding an unexpired verification token with this
    /// digest as verified and drop the token, in one statement.
    ///
    /// A token is consumed at most once: of two concurrent calls with the
    /// same digest, only one returns the account.
    async fn consume_verification_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AccountError>;

    /// Write the profile fields: name, phone, roles and organization.
    ///
    /// Activation, credential, verification and lockout state are written
    /// only by their own single-statement operations.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update(&self, account: Account) -> Result<Account, AccountError>;

    /// Clear the active flag.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    async fn deactivate(&self, id: &AccountId, now: DateTime<Utc>)
        -> Result<Account, AccountError>;

    /// Replace the credential hash.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update_password_hash(
        &self,
        id: &AccountId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError>;

    /// Atomically apply one failed attempt under `policy`.
    ///
    /// Two concurrent calls never both observe the pre-lock counter: at most
    /// one of them returns `LockedOut`.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    async fn record_failed_login(
        &self,
        id: &AccountId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, AccountError>;

    /// Reset the failure counter and stamp the login time, unless a lock is
    /// in force at `now`.
    ///
    /// The check and the write are one atomic step, so a lock set by
    /// concurrent failures after the caller's own check is never lifted.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    /// * `DatabaseError` - Database operation failed
    async fn record_successful_login(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<SuccessOutcome, AccountError>;
}
