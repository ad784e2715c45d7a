use std::sync::Arc;

use chrono::DateTime;
use chrono::Utc;

use crate::domain::account::models::AccountId;
use crate::domain::session::errors::SessionError;
use crate::domain::session::models::NewSession;
use crate::domain::session::models::SessionId;
use crate::domain::session::models::SessionPolicy;
use crate::domain::session::models::SessionRecord;
use crate::domain::session::ports::SessionRepository;

/// Refresh-token store.
///
/// Callers hand it raw token values; only their digests reach the repository.
pub struct TokenStore<SR>
where
    SR: SessionRepository,
{
    repository: Arc<SR>,
    policy: SessionPolicy,
}

impl<SR> TokenStore<SR>
where
    SR: SessionRepository,
{
    pub fn new(repository: Arc<SR>, policy: SessionPolicy) -> Self {
        Self { repository, policy }
    }

    /// Persist a new refresh token, revoking the ones it replaces under the
    /// configured policy.
    ///
    /// The record is resolvable through [`find_valid`](Self::find_valid) once
    /// this returns.
    ///
    /// # Errors
    /// * `DatabaseError` - Database operation failed
    pub async fn store_refresh_token(
        &self,
        session: NewSession<'_>,
    ) -> Result<SessionRecord, SessionError> {
        let scope = self.policy.scope_for(&session.device);
        let record = SessionRecord {
            id: SessionId::new(),
            account_id: session.account_id,
            token_digest: auth::opaque::digest(session.token),
            jti: session.jti.to_string(),
            device: session.device,
            created_at: session.issued_at,
            expires_at: session.expires_at,
        };

        self.repository
            .insert_replacing(record.clone(), scope)
            .await?;

        tracing::debug!(
            account_id = %record.account_id,
            session_id = %record.id.0,
            "Refresh token stored"
        );

        Ok(record)
    }

    /// Look up an unexpired, unrevoked record by raw token value.
    pub async fn find_valid(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, SessionError> {
        self.repository
            .find_by_digest(&auth::opaque::digest(token), now)
            .await
    }

    /// Revoke a single token. Returns whether it was still present.
    pub async fn revoke(&self, token: &str) -> Result<bool, SessionError> {
        self.repository
            .delete_by_digest(&auth::opaque::digest(token))
            .await
    }

    pub async fn revoke_all_for_account(
        &self,
        account_id: &AccountId,
    ) -> Result<u64, SessionError> {
        let revoked = self.repository.delete_for_account(account_id).await?;
        tracing::info!(account_id = %account_id, revoked, "Sessions revoked");
        Ok(revoked)
    }

    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        self.repository.delete_expired(now).await
    }
}
