use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::account::errors::AccountError;
use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::UpdateProfileCommand;
use crate::domain::account::ports::AccountRepository;
use crate::domain::account::ports::AccountServicePort;
use crate::domain::clock::Clock;
use crate::domain::session::ports::SessionRepository;
use crate::domain::session::service::TokenStore;

/// Domain service implementation for account management.
pub struct AccountService<AR, SR>
where
    AR: AccountRepository,
    SR: SessionRepository,
{
    repository: Arc<AR>,
    sessions: Arc<TokenStore<SR>>,
    clock: Arc<dyn Clock>,
}

impl<AR, SR> AccountService<AR, SR>
where
    AR: AccountRepository,
    SR: SessionRepository,
{
    /// Create a new account service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - Account persistence implementation
    /// * `sessions` - Refresh-token store, used to revoke on deactivation
    /// * `clock` - Time source for `updated_at`
    pub fn new(repository: Arc<AR>, sessions: Arc<TokenStore<SR>>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            sessions,
            clock,
        }
    }

    async fn load(&self, id: &AccountId) -> Result<Account, AccountError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or(AccountError::NotFound(id.to_string()))
    }
}

#[async_trait]
impl<AR, SR> AccountServicePort for AccountService<AR, SR>
where
    AR: AccountRepository,
    SR: SessionRepository,
{
    async fn get_account(&self, id: &AccountId) -> Result<Account, AccountError> {
        self.load(id).await
    }

    async fn update_profile(
        &self,
        id: &AccountId,
        command: UpdateProfileCommand,
    ) -> Result<Account, AccountError> {
        let mut account = self.load(id).await?;

        if let Some(name) = command.name {
            account.name = name;
        }

        if let Some(phone) = command.phone {
            account.phone = Some(phone);
        }

        account.updated_at = self.clock.now();
        let updated = self.repository.update(account).await?;

        tracing::info!(account_id = %updated.id, "Account profile updated");
        Ok(updated)
    }

    async fn deactivate_account(&self, id: &AccountId) -> Result<Account, AccountError> {
        let updated = self.repository.deactivate(id, self.clock.now()).await?;

        self.sessions.revoke_all_for_account(id).await?;

        tracing::info!(account_id = %id, "Account deactivated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use chrono::Utc;

    use super::*;
    use crate::domain::account::lockout::LockoutState;
    use crate::domain::account::models::DisplayName;
    use crate::domain::account::models::EmailAddress;
    use crate::domain::account::models::MultiFactorConfig;
    use crate::domain::account::models::PhoneNumber;
    use crate::domain::account::models::Role;
    use crate::domain::account::ports::MockAccountRepository;
    use crate::domain::clock::ManualClock;
    use crate::domain::session::models::SessionPolicy;
    use crate::domain::session::ports::MockSessionRepository;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn account() -> Account {
        Account {
            id: AccountId::new(),
            name: DisplayName::new("Ann".to_string()).unwrap(),
            email: EmailAddress::new("ann@x.com".to_string()).unwrap(),
            phone: None,
            password_hash: "$argon2id$stub".to_string(),
            roles: vec![Role::User],
            organization_id: None,
            active: true,
            email_verified: true,
            email_verification: None,
            lockout: LockoutState::default(),
            mfa: MultiFactorConfig::default(),
            last_login_at: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn service(
        repository: MockAccountRepository,
        sessions: MockSessionRepository,
    ) -> AccountService<MockAccountRepository, MockSessionRepository> {
        AccountService::new(
            Arc::new(repository),
            Arc::new(TokenStore::new(Arc::new(sessions), SessionPolicy::Single)),
            Arc::new(ManualClock::new(now())),
        )
    }

    #[tokio::test]
    async fn test_get_account_not_found() {
        let mut repository = MockAccountRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let result = service(repository, MockSessionRepository::new())
            .get_account(&AccountId::new())
            .await;

        assert!(matches!(result, Err(AccountError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_profile_keeps_absent_fields() {
        let existing = account();
        let id = existing.id;
        let mut repository = MockAccountRepository::new();

        let found = existing.clone();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(found.clone())));
        repository
            .expect_update()
            .withf(|account| {
                account.name.as_str() == "Ann"
                    && account.phone.as_ref().map(|p| p.as_str()) == Some("+14155550123")
            })
            .times(1)
            .returning(Ok);

        let command = UpdateProfileCommand {
            name: None,
            phone: Some(PhoneNumber::new("+14155550123".to_string()).unwrap()),
        };
        let updated = service(repository, MockSessionRepository::new())
            .update_profile(&id, command)
            .await
            .unwrap();

        assert_eq!(updated.id, id);
        assert_eq!(updated.updated_at, now());
    }

    #[tokio::test]
    async fn test_deactivate_revokes_sessions() {
        let existing = account();
        let id = existing.id;
        let mut repository = MockAccountRepository::new();
        let mut sessions = MockSessionRepository::new();

        repository
            .expect_deactivate()
            .withf(move |account_id, at| *account_id == id && *at == now())
            .times(1)
            .returning(move |_, at| {
                let mut deactivated = existing.clone();
                deactivated.active = false;
                deactivated.updated_at = at;
                Ok(deactivated)
            });
        repository.expect_update().never();
        sessions
            .expect_delete_for_account()
            .withf(move |account_id| *account_id == id)
            .times(1)
            .returning(|_| Ok(2));

        let deactivated = service(repository, sessions)
            .deactivate_account(&id)
            .await
            .unwrap();

        assert!(!deactivated.active);
    }

    #[tokio::test]
    async fn test_deactivate_missing_account_touches_nothing() {
        let mut repository = MockAccountRepository::new();
        repository
            .expect_deactivate()
            .times(1)
            .returning(|id, _| Err(AccountError::NotFound(id.to_string())));

        let mut sessions = MockSessionRepository::new();
        sessions.expect_delete_for_account().never();

        let result = service(repository, sessions)
            .deactivate_account(&AccountId::new())
            .await;

        assert!(matches!(result, Err(AccountError::NotFound(_))));
    }
}
