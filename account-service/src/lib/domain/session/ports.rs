use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
#[cfg(test)]
use mockall::automock;

use crate::domain::account::models::AccountId;
use crate::domain::session::errors::SessionError;
use crate::domain::session::models::RevocationScope;
use crate::domain::session::models::SessionRecord;

/// Persistence operations for refresh-token records.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    /// Delete the records covered by `scope` for the record's account, then
    /// insert `record`, as one atomic step.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn insert_replacing(
        &self,
        record: SessionRecord,
        scope: RevocationScope,
    ) -> Result<(), SessionError>;

    /// Retrieve the record with this token digest.
    ///
    /// # Returns
    /// `None` when absent or when `expires_at <= now`
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    async fn find_by_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, SessionError>;

    /// Delete the record with this token digest.
    ///
    /// # Returns
    /// Whether a record was removed
    async fn delete_by_digest(&self, digest: &str) -> Result<bool, SessionError>;

    /// Delete every record of an account, returning how many were removed.
    async fn delete_for_account(&self, account_id: &AccountId) -> Result<u64, SessionError>;

    /// Delete every record with `expires_at <= now`, returning how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError>;
}
