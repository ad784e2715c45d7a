//! Process-local repositories.
//!
//! Used for `storage.backend = "memory"` and by the HTTP integration tests.
//! Each map sits behind one mutex, so every repository call is atomic.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::account::errors::AccountError;
use crate::domain::account::lockout::FailureOutcome;
use crate::domain::account::lockout::LockoutPolicy;
use crate::domain::account::lockout::SuccessOutcome;
use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::ports::AccountRepository;
use crate::domain::session::errors::SessionError;
use crate::domain::session::models::RevocationScope;
use crate::domain::session::models::SessionRecord;
use crate::domain::session::ports::SessionRepository;

#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: Mutex<HashMap<AccountId, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn create(&self, account: Account) -> Result<Account, AccountError> {
        let mut accounts = self.accounts.lock().await;

        if accounts.values().any(|a| a.email == account.email) {
            return Err(AccountError::EmailAlreadyExists(
                account.email.as_str().to_string(),
            ));
        }

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts.lock().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, AccountError> {
        Ok(self
            .accounts
            .lock()
            .await
            .values()
            .find(|a| &a.email == email)
            .cloned())
    }

    async fn consume_verification_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AccountError> {
        let mut accounts = self.accounts.lock().await;
        let Some(stored) = accounts.values_mut().find(|a| {
            a.email_verification
                .as_ref()
                .is_some_and(|v| v.token_digest == digest && v.expires_at > now)
        }) else {
            return Ok(None);
        };

        stored.email_verified = true;
        stored.email_verification = None;
        stored.updated_at = now;
        Ok(Some(stored.clone()))
    }

    async fn update(&self, account: Account) -> Result<Account, AccountError> {
        let mut accounts = self.accounts.lock().await;
        let stored = accounts
            .get_mut(&account.id)
            .ok_or_else(|| AccountError::NotFound(account.id.to_string()))?;

        stored.name = account.name;
        stored.phone = account.phone;
        stored.roles = account.roles;
        stored.organization_id = account.organization_id;
        stored.updated_at = account.updated_at;
        Ok(stored.clone())
    }

    async fn deactivate(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Account, AccountError> {
        let mut accounts = self.accounts.lock().await;
        let stored = accounts
            .get_mut(id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        stored.active = false;
        stored.updated_at = now;
        Ok(stored.clone())
    }

    async fn update_password_hash(
        &self,
        id: &AccountId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let mut accounts = self.accounts.lock().await;
        let stored = accounts
            .get_mut(id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        stored.password_hash = password_hash.to_string();
        stored.updated_at = now;
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: &AccountId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, AccountError> {
        let mut accounts = self.accounts.lock().await;
        let stored = accounts
            .get_mut(id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        let (next, outcome) = policy.register_failure(&stored.lockout, now);
        if next != stored.lockout {
            stored.lockout = next;
            stored.updated_at = now;
        }

        Ok(outcome)
    }

    async fn record_successful_login(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<SuccessOutcome, AccountError> {
        let mut accounts = self.accounts.lock().await;
        let stored = accounts
            .get_mut(id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        let (next, outcome) = stored.lockout.register_success(now);
        if outcome == SuccessOutcome::Recorded {
            stored.lockout = next;
            stored.last_login_at = Some(now);
            stored.updated_at = now;
        }
        Ok(outcome)
    }
}

/// Refresh-token records keyed by token digest.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_scope(record: &SessionRecord, account_id: &AccountId, scope: &RevocationScope) -> bool {
    if record.account_id != *account_id {
        return false;
    }
    match scope {
        RevocationScope::Account => true,
        RevocationScope::Device(key) => record.device.key() == Some(key.as_str()),
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn insert_replacing(
        &self,
        record: SessionRecord,
        scope: RevocationScope,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, existing| !in_scope(existing, &record.account_id, &scope));
        sessions.insert(record.token_digest.clone(), record);
        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self
            .sessions
            .lock()
            .await
            .get(digest)
            .filter(|record| record.expires_at > now)
            .cloned())
    }

    async fn delete_by_digest(&self, digest: &str) -> Result<bool, SessionError> {
        Ok(self.sessions.lock().await.remove(digest).is_some())
    }

    async fn delete_for_account(&self, account_id: &AccountId) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.account_id != *account_id);
        Ok((before - sessions.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let mut sessions = self.sessions.lock().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        Ok((before - sessions.len()) as u64)
    }
}
