use std::sync::Arc;

use async_trait::async_trait;
use auth::PasswordHasher;
use auth::TokenIssuer;
use auth::TokenSubject;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::domain::account::lockout::retry_after_secs;
use crate::domain::account::lockout::FailureOutcome;
use crate::domain::account::lockout::LockStatus;
use crate::domain::account::lockout::LockoutPolicy;
use crate::domain::account::lockout::LockoutState;
use crate::domain::account::lockout::SuccessOutcome;
use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::CreateAccountCommand;
use crate::domain::account::models::EmailVerification;
use crate::domain::account::models::MultiFactorConfig;
use crate::domain::account::models::Role;
use crate::domain::account::ports::AccountRepository;
use crate::domain::auth::credentials::CredentialCheck;
use crate::domain::auth::credentials::CredentialVerifier;
use crate::domain::auth::errors::AuthError;
use crate::domain::auth::models::AuthSession;
use crate::domain::auth::models::ChangePasswordCommand;
use crate::domain::auth::models::Identity;
use crate::domain::auth::models::LoginCommand;
use crate::domain::auth::models::LoginOutcome;
use crate::domain::auth::ports::AccountNotifier;
use crate::domain::auth::ports::AuthServicePort;
use crate::domain::clock::Clock;
use crate::domain::session::models::DeviceDescriptor;
use crate::domain::session::models::NewSession;
use crate::domain::session::ports::SessionRepository;
use crate::domain::session::service::TokenStore;
use crate::domain::validation::ValidationErrors;

const VERIFICATION_TOKEN_BYTES: usize = 32;
const VERIFICATION_TTL_HOURS: i64 = 1;

/// Domain service implementation for authentication flows.
pub struct AuthService<AR, SR, N>
where
    AR: AccountRepository,
    SR: SessionRepository,
    N: AccountNotifier,
{
    accounts: Arc<AR>,
    sessions: Arc<TokenStore<SR>>,
    notifier: Arc<N>,
    credentials: CredentialVerifier<AR>,
    issuer: Arc<TokenIssuer>,
    lockout: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl<AR, SR, N> AuthService<AR, SR, N>
where
    AR: AccountRepository,
    SR: SessionRepository,
    N: AccountNotifier,
{
    /// Create a new auth service with injected dependencies.
    ///
    /// # Arguments
    /// * `accounts` - Account persistence implementation
    /// * `sessions` - Refresh-token store
    /// * `notifier` - Receives verification tokens for delivery
    /// * `issuer` - Access/refresh token signer
    /// * `hasher` - Password hasher with the configured cost
    /// * `lockout` - Failed-attempt thresholds
    /// * `clock` - Time source
    ///
    /// # Errors
    /// * `ServerError` - The timing-equalisation hash could not be computed
    pub fn new(
        accounts: Arc<AR>,
        sessions: Arc<TokenStore<SR>>,
        notifier: Arc<N>,
        issuer: Arc<TokenIssuer>,
        hasher: PasswordHasher,
        lockout: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AuthError> {
        let credentials = CredentialVerifier::new(Arc::clone(&accounts), hasher)?;

        Ok(Self {
            accounts,
            sessions,
            notifier,
            credentials,
            issuer,
            lockout,
            clock,
        })
    }

    /// Mint a token pair for `account` and store its refresh token.
    async fn issue_session(
        &self,
        account: Account,
        device: DeviceDescriptor,
        now: DateTime<Utc>,
    ) -> Result<AuthSession, AuthError> {
        let subject_id = account.id.to_string();
        let roles = account.role_names();
        let organization = account.organization_id.map(|org| org.to_string());

        let tokens = self.issuer.issue(
            TokenSubject {
                id: &subject_id,
                roles: &roles,
                organization: organization.as_deref(),
            },
            now,
        )?;

        self.sessions
            .store_refresh_token(NewSession {
                account_id: account.id,
                token: &tokens.refresh_token,
                jti: &tokens.refresh_jti,
                device,
                issued_at: now,
                expires_at: tokens.refresh_expires_at,
            })
            .await?;

        Ok(AuthSession { account, tokens })
    }

    async fn record_failure(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<AuthError, AuthError> {
        let outcome = self
            .accounts
            .record_failed_login(&account.id, &self.lockout, now)
            .await?;

        Ok(match outcome {
            FailureOutcome::Counted { attempts } => {
                tracing::debug!(account_id = %account.id, attempts, "Failed login attempt");
                AuthError::InvalidCredentials
            }
            FailureOutcome::LockedOut { until } => {
                tracing::warn!(
                    account_id = %account.id,
                    locked_until = %until,
                    "Account locked after repeated failed logins"
                );
                AuthError::InvalidCredentials
            }
            FailureOutcome::AlreadyLocked { until } => AuthError::AccountLocked {
                retry_after_secs: retry_after_secs(until, now),
            },
        })
    }
}

#[async_trait]
impl<AR, SR, N> AuthServicePort for AuthService<AR, SR, N>
where
    AR: AccountRepository,
    SR: SessionRepository,
    N: AccountNotifier,
{
    async fn register(
        &self,
        command: CreateAccountCommand,
        device: DeviceDescriptor,
    ) -> Result<AuthSession, AuthError> {
        let now = self.clock.now();

        if self.accounts.find_by_email(&command.email).await?.is_some() {
            return Err(AuthError::EmailAlreadyExists(
                command.email.as_str().to_string(),
            ));
        }

        let password_hash = self.credentials.hash(command.password.expose()).await?;
        let verification_token = auth::opaque::generate_token(VERIFICATION_TOKEN_BYTES);

        let account = Account {
            id: AccountId::new(),
            name: command.name,
            email: command.email,
            phone: command.phone,
            password_hash,
            roles: vec![Role::User],
            organization_id: None,
            active: true,
            email_verified: false,
            email_verification: Some(EmailVerification {
                token_digest: auth::opaque::digest(&verification_token),
                expires_at: now + Duration::hours(VERIFICATION_TTL_HOURS),
            }),
            lockout: LockoutState::default(),
            mfa: MultiFactorConfig::default(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };

        let account = self.accounts.create(account).await?;
        tracing::info!(account_id = %account.id, "Account registered");

        if let Err(e) = self
            .notifier
            .verification_issued(&account, &verification_token)
            .await
        {
            tracing::warn!(
                account_id = %account.id,
                error = %e,
                "Failed to hand off email verification token"
            );
        }

        self.issue_session(account, device, now).await
    }

    async fn login(&self, command: LoginCommand) -> Result<LoginOutcome, AuthError> {
        let now = self.clock.now();
        let account = self.credentials.lookup(&command.email).await?;

        if let Some(account) = &account {
            if let LockStatus::Locked {
                retry_after_secs, ..
            } = self.lockout.status(&account.lockout, now)
            {
                tracing::info!(account_id = %account.id, "Login rejected: account locked");
                return Err(AuthError::AccountLocked { retry_after_secs });
            }
        }

        let mut account = match self.credentials.compare(account, &command.password).await? {
            CredentialCheck::Matched(account) => account,
            CredentialCheck::Mismatch(account) => {
                return Err(self.record_failure(&account, now).await?);
            }
            CredentialCheck::NotFound => return Err(AuthError::InvalidCredentials),
        };

        if !account.email_verified {
            tracing::info!(account_id = %account.id, "Login rejected: email unverified");
            return Err(AuthError::EmailUnverified);
        }

        // The lock check above read a snapshot; a lock set since then wins.
        if let SuccessOutcome::Locked { until } = self
            .accounts
            .record_successful_login(&account.id, now)
            .await?
        {
            tracing::info!(account_id = %account.id, "Login rejected: locked concurrently");
            return Err(AuthError::AccountLocked {
                retry_after_secs: retry_after_secs(until, now),
            });
        }

        let previous_login_at = account.last_login_at;
        account.lockout = LockoutState::cleared();
        account.last_login_at = Some(now);
        let session = self.issue_session(account, command.device, now).await?;

        tracing::info!(account_id = %session.account.id, "Login succeeded");

        Ok(LoginOutcome {
            session,
            previous_login_at,
        })
    }

    async fn refresh(
        &self,
        refresh_token: &str,
        device: DeviceDescriptor,
    ) -> Result<AuthSession, AuthError> {
        let now = self.clock.now();
        let claims = self.issuer.verify_refresh(refresh_token)?;

        let record = self
            .sessions
            .find_valid(refresh_token, now)
            .await?
            .ok_or(AuthError::TokenInvalid)?;

        if record.account_id.to_string() != claims.sub {
            tracing::warn!(account_id = %record.account_id, "Refresh token subject mismatch");
            return Err(AuthError::TokenInvalid);
        }

        let account = self
            .accounts
            .find_by_id(&record.account_id)
            .await?
            .filter(|account| account.active)
            .ok_or(AuthError::TokenInvalid)?;

        // A concurrent rotation may have consumed the token since the lookup.
        if !self.sessions.revoke(refresh_token).await? {
            return Err(AuthError::TokenInvalid);
        }

        let device = DeviceDescriptor {
            device_id: device.device_id.or(record.device.device_id),
            ..device
        };

        let session = self.issue_session(account, device, now).await?;
        tracing::debug!(account_id = %session.account.id, "Refresh token rotated");

        Ok(session)
    }

    async fn logout(&self, account_id: &AccountId) -> Result<(), AuthError> {
        self.sessions.revoke_all_for_account(account_id).await?;
        Ok(())
    }

    async fn change_password(
        &self,
        account_id: &AccountId,
        command: ChangePasswordCommand,
    ) -> Result<(), AuthError> {
        let now = self.clock.now();

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .filter(|account| account.active)
            .ok_or_else(|| AuthError::NotFound(account_id.to_string()))?;

        if !matches!(
            self.credentials
                .compare(Some(account), &command.current_password)
                .await?,
            CredentialCheck::Matched(_)
        ) {
            return Err(AuthError::InvalidCredentials);
        }

        if command.new_password.expose() == command.current_password {
            return Err(ValidationErrors::single(
                "newPassword",
                "New password must differ from the current password",
            )
            .into());
        }

        let password_hash = self
            .credentials
            .hash(command.new_password.expose())
            .await?;
        self.accounts
            .update_password_hash(account_id, &password_hash, now)
            .await?;

        self.sessions.revoke_all_for_account(account_id).await?;
        tracing::info!(account_id = %account_id, "Password changed");

        Ok(())
    }

    async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        let now = self.clock.now();

        let account = self
            .accounts
            .consume_verification_token(&auth::opaque::digest(token), now)
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        tracing::info!(account_id = %account.id, "Email verified");
        Ok(())
    }

    async fn authenticate(&self, access_token: &str) -> Result<Identity, AuthError> {
        let claims = self.issuer.verify_access(access_token)?;
        let account_id =
            AccountId::from_string(&claims.sub).map_err(|_| AuthError::TokenInvalid)?;

        let account = self
            .accounts
            .find_by_id(&account_id)
            .await?
            .filter(|account| account.active)
            .ok_or(AuthError::TokenInvalid)?;

        Ok(Identity::from(&account))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use auth::TokenIssuerConfig;

    use super::*;
    use crate::domain::account::errors::AccountError;
    use crate::domain::account::models::DisplayName;
    use crate::domain::account::models::EmailAddress;
    use crate::domain::account::models::NewPassword;
    use crate::domain::account::ports::MockAccountRepository;
    use crate::domain::auth::ports::MockAccountNotifier;
    use crate::domain::clock::ManualClock;
    use crate::domain::session::models::SessionId;
    use crate::domain::session::models::SessionPolicy;
    use crate::domain::session::models::SessionRecord;
    use crate::domain::session::ports::MockSessionRepository;

    const PASSWORD: &str = "Str0ng!Pass123";

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    fn issuer() -> Arc<TokenIssuer> {
        Arc::new(
            TokenIssuer::new(TokenIssuerConfig {
                access_secret: b"access_secret_at_least_32_bytes_long!".to_vec(),
                refresh_secret: b"refresh_secret_at_least_32_bytes_long".to_vec(),
                access_ttl: Duration::minutes(15),
                refresh_ttl: Duration::days(7),
            })
            .unwrap(),
        )
    }

    fn account(now: DateTime<Utc>) -> Account {
        Account {
            id: AccountId::new(),
            name: DisplayName::new("Ann".to_string()).unwrap(),
            email: EmailAddress::new("ann@x.com".to_string()).unwrap(),
            phone: None,
            password_hash: hasher().hash(PASSWORD).unwrap(),
            roles: vec![Role::User],
            organization_id: None,
            active: true,
            email_verified: true,
            email_verification: None,
            lockout: LockoutState::default(),
            mfa: MultiFactorConfig::default(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    struct Fixture {
        accounts: MockAccountRepository,
        sessions: MockSessionRepository,
        notifier: MockAccountNotifier,
        issuer: Arc<TokenIssuer>,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                accounts: MockAccountRepository::new(),
                sessions: MockSessionRepository::new(),
                notifier: MockAccountNotifier::new(),
                issuer: issuer(),
                clock: Arc::new(ManualClock::new(Utc::now())),
            }
        }

        fn now(&self) -> DateTime<Utc> {
            self.clock.now()
        }

        fn build(
            self,
        ) -> AuthService<MockAccountRepository, MockSessionRepository, MockAccountNotifier> {
            AuthService::new(
                Arc::new(self.accounts),
                Arc::new(TokenStore::new(
                    Arc::new(self.sessions),
                    SessionPolicy::Single,
                )),
                Arc::new(self.notifier),
                self.issuer,
                hasher(),
                LockoutPolicy::default(),
                self.clock,
            )
            .unwrap()
        }
    }

    fn login_command(password: &str) -> LoginCommand {
        LoginCommand {
            email: EmailAddress::new("ann@x.com".to_string()).unwrap(),
            password: password.to_string(),
            device: DeviceDescriptor::default(),
        }
    }

    #[tokio::test]
    async fn test_login_success_issues_tokens_and_resets_failures() {
        let mut fixture = Fixture::new();
        let mut existing = account(fixture.now());
        existing.lockout.failed_attempts = 3;
        existing.last_login_at = Some(fixture.now() - Duration::days(2));
        let id = existing.id;
        let previous = existing.last_login_at;

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture
            .sessions
            .expect_insert_replacing()
            .withf(move |record, _| record.account_id == id)
            .times(1)
            .returning(|_, _| Ok(()));
        fixture
            .accounts
            .expect_record_successful_login()
            .withf(move |account_id, _| *account_id == id)
            .times(1)
            .returning(|_, _| Ok(SuccessOutcome::Recorded));
        fixture.accounts.expect_record_failed_login().never();

        let issuer = Arc::clone(&fixture.issuer);
        let outcome = fixture.build().login(login_command(PASSWORD)).await.unwrap();

        assert_eq!(outcome.previous_login_at, previous);
        assert_eq!(outcome.session.account.lockout.failed_attempts, 0);
        let claims = issuer
            .verify_access(&outcome.session.tokens.access_token)
            .unwrap();
        assert_eq!(claims.sub, id.to_string());
        assert_eq!(claims.roles, vec!["user".to_string()]);
    }

    #[tokio::test]
    async fn test_login_wrong_password_counts_failure() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture
            .accounts
            .expect_record_failed_login()
            .times(1)
            .returning(|_, _, _| Ok(FailureOutcome::Counted { attempts: 1 }));
        fixture.sessions.expect_insert_replacing().never();

        let result = fixture.build().login(login_command("Wrong!Pass1234")).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_failure_that_locks_still_reports_invalid_credentials() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let until = fixture.now() + Duration::minutes(15);

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture
            .accounts
            .expect_record_failed_login()
            .times(1)
            .returning(move |_, _, _| Ok(FailureOutcome::LockedOut { until }));

        let result = fixture.build().login(login_command("Wrong!Pass1234")).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_while_locked_skips_password_check() {
        let mut fixture = Fixture::new();
        let mut existing = account(fixture.now());
        existing.lockout.locked_until = Some(fixture.now() + Duration::minutes(10));
        // Any comparison against this would fail with a server error.
        existing.password_hash = "not-a-phc-string".to_string();

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture.accounts.expect_record_failed_login().never();
        fixture.accounts.expect_record_successful_login().never();

        let result = fixture.build().login(login_command(PASSWORD)).await;

        assert!(matches!(
            result,
            Err(AuthError::AccountLocked {
                retry_after_secs: 600
            })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_lock_reports_locked() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let until = fixture.now() + Duration::seconds(90);

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture
            .accounts
            .expect_record_failed_login()
            .times(1)
            .returning(move |_, _, _| Ok(FailureOutcome::AlreadyLocked { until }));

        let result = fixture.build().login(login_command("Wrong!Pass1234")).await;

        assert!(matches!(
            result,
            Err(AuthError::AccountLocked {
                retry_after_secs: 90
            })
        ));
    }

    #[tokio::test]
    async fn test_login_lock_set_concurrently_is_kept() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let until = fixture.now() + Duration::minutes(15);

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture
            .accounts
            .expect_record_successful_login()
            .times(1)
            .returning(move |_, _| Ok(SuccessOutcome::Locked { until }));
        fixture.sessions.expect_insert_replacing().never();

        let result = fixture.build().login(login_command(PASSWORD)).await;

        assert!(matches!(
            result,
            Err(AuthError::AccountLocked {
                retry_after_secs: 900
            })
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut fixture = Fixture::new();

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        fixture.accounts.expect_record_failed_login().never();

        let result = fixture.build().login(login_command(PASSWORD)).await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_login_unverified_email_issues_nothing() {
        let mut fixture = Fixture::new();
        let mut existing = account(fixture.now());
        existing.email_verified = false;

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture.sessions.expect_insert_replacing().never();
        fixture.accounts.expect_record_successful_login().never();

        let result = fixture.build().login(login_command(PASSWORD)).await;

        assert!(matches!(result, Err(AuthError::EmailUnverified)));
    }

    #[tokio::test]
    async fn test_register_hands_raw_token_to_notifier() {
        let mut fixture = Fixture::new();
        let stored_digest = Arc::new(Mutex::new(None::<String>));
        let delivered_token = Arc::new(Mutex::new(None::<String>));

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        let digest_slot = Arc::clone(&stored_digest);
        fixture
            .accounts
            .expect_create()
            .withf(|account| {
                account.roles == vec![Role::User] && !account.email_verified && account.active
            })
            .times(1)
            .returning(move |account| {
                *digest_slot.lock().unwrap() = account
                    .email_verification
                    .as_ref()
                    .map(|v| v.token_digest.clone());
                Ok(account)
            });
        let token_slot = Arc::clone(&delivered_token);
        fixture
            .notifier
            .expect_verification_issued()
            .times(1)
            .returning(move |_, token| {
                *token_slot.lock().unwrap() = Some(token.to_string());
                Ok(())
            });
        fixture
            .sessions
            .expect_insert_replacing()
            .times(1)
            .returning(|_, _| Ok(()));

        let command = CreateAccountCommand {
            name: DisplayName::new("Ann".to_string()).unwrap(),
            email: EmailAddress::new("ann@x.com".to_string()).unwrap(),
            phone: None,
            password: NewPassword::new(PASSWORD.to_string()).unwrap(),
        };
        let session = fixture
            .build()
            .register(command, DeviceDescriptor::default())
            .await
            .unwrap();

        let token = delivered_token.lock().unwrap().clone().unwrap();
        assert_eq!(token.len(), 64);
        assert_eq!(
            stored_digest.lock().unwrap().clone(),
            Some(auth::opaque::digest(&token))
        );
        assert_ne!(session.account.password_hash, PASSWORD);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());

        fixture
            .accounts
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture.accounts.expect_create().never();

        let command = CreateAccountCommand {
            name: DisplayName::new("Ann".to_string()).unwrap(),
            email: EmailAddress::new("ANN@x.com".to_string()).unwrap(),
            phone: None,
            password: NewPassword::new(PASSWORD.to_string()).unwrap(),
        };
        let result = fixture
            .build()
            .register(command, DeviceDescriptor::default())
            .await;

        assert!(matches!(result, Err(AuthError::EmailAlreadyExists(_))));
    }

    fn session_record(account_id: AccountId, token: &str, now: DateTime<Utc>) -> SessionRecord {
        SessionRecord {
            id: SessionId::new(),
            account_id,
            token_digest: auth::opaque::digest(token),
            jti: "jti".to_string(),
            device: DeviceDescriptor {
                device_id: Some("phone-1".to_string()),
                ..Default::default()
            },
            created_at: now,
            expires_at: now + Duration::days(7),
        }
    }

    fn issue_refresh(issuer: &TokenIssuer, account: &Account, now: DateTime<Utc>) -> String {
        let roles = account.role_names();
        let id = account.id.to_string();
        issuer
            .issue(
                TokenSubject {
                    id: &id,
                    roles: &roles,
                    organization: None,
                },
                now,
            )
            .unwrap()
            .refresh_token
    }

    #[tokio::test]
    async fn test_refresh_rotates_token() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let id = existing.id;
        let token = issue_refresh(&fixture.issuer, &existing, fixture.now());
        let record = session_record(id, &token, fixture.now());

        fixture
            .sessions
            .expect_find_by_digest()
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));
        fixture
            .accounts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        let old_digest = auth::opaque::digest(&token);
        fixture
            .sessions
            .expect_delete_by_digest()
            .withf(move |digest| digest.to_string() == old_digest)
            .times(1)
            .returning(|_| Ok(true));
        fixture
            .sessions
            .expect_insert_replacing()
            .withf(|record, _| record.device.device_id.as_deref() == Some("phone-1"))
            .times(1)
            .returning(|_, _| Ok(()));

        let session = fixture
            .build()
            .refresh(&token, DeviceDescriptor::default())
            .await
            .unwrap();

        assert_ne!(session.tokens.refresh_token, token);
    }

    #[tokio::test]
    async fn test_refresh_revoked_token() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let token = issue_refresh(&fixture.issuer, &existing, fixture.now());

        fixture
            .sessions
            .expect_find_by_digest()
            .times(1)
            .returning(|_, _| Ok(None));
        fixture.sessions.expect_insert_replacing().never();

        let result = fixture
            .build()
            .refresh(&token, DeviceDescriptor::default())
            .await;

        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn test_refresh_already_rotated_concurrently() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let token = issue_refresh(&fixture.issuer, &existing, fixture.now());
        let record = session_record(existing.id, &token, fixture.now());

        fixture
            .sessions
            .expect_find_by_digest()
            .times(1)
            .returning(move |_, _| Ok(Some(record.clone())));
        fixture
            .accounts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture
            .sessions
            .expect_delete_by_digest()
            .times(1)
            .returning(|_| Ok(false));
        fixture.sessions.expect_insert_replacing().never();

        let result = fixture
            .build()
            .refresh(&token, DeviceDescriptor::default())
            .await;

        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_access_token() {
        let fixture = Fixture::new();
        let existing = account(fixture.now());
        let roles = existing.role_names();
        let id = existing.id.to_string();
        let access = fixture
            .issuer
            .issue(
                TokenSubject {
                    id: &id,
                    roles: &roles,
                    organization: None,
                },
                fixture.now(),
            )
            .unwrap()
            .access_token;

        let result = fixture
            .build()
            .refresh(&access, DeviceDescriptor::default())
            .await;

        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn test_authenticate_inactive_account() {
        let mut fixture = Fixture::new();
        let mut existing = account(fixture.now());
        existing.active = false;
        let roles = existing.role_names();
        let id = existing.id.to_string();
        let access = fixture
            .issuer
            .issue(
                TokenSubject {
                    id: &id,
                    roles: &roles,
                    organization: None,
                },
                fixture.now(),
            )
            .unwrap()
            .access_token;

        fixture
            .accounts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));

        let result = fixture.build().authenticate(&access).await;

        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }

    #[tokio::test]
    async fn test_authenticate_expired_token() {
        let fixture = Fixture::new();
        let existing = account(fixture.now());
        let roles = existing.role_names();
        let id = existing.id.to_string();
        let access = fixture
            .issuer
            .issue(
                TokenSubject {
                    id: &id,
                    roles: &roles,
                    organization: None,
                },
                fixture.now() - Duration::hours(1),
            )
            .unwrap()
            .access_token;

        let result = fixture.build().authenticate(&access).await;

        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_authenticate_store_failure_is_server_error() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let roles = existing.role_names();
        let id = existing.id.to_string();
        let access = fixture
            .issuer
            .issue(
                TokenSubject {
                    id: &id,
                    roles: &roles,
                    organization: None,
                },
                fixture.now(),
            )
            .unwrap()
            .access_token;

        fixture
            .accounts
            .expect_find_by_id()
            .times(1)
            .returning(|_| Err(AccountError::DatabaseError("timeout".to_string())));

        let result = fixture.build().authenticate(&access).await;

        assert!(matches!(result, Err(AuthError::ServerError(_))));
    }

    #[tokio::test]
    async fn test_change_password_wrong_current() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let id = existing.id;

        fixture
            .accounts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture.accounts.expect_update_password_hash().never();
        fixture.sessions.expect_delete_for_account().never();

        let result = fixture
            .build()
            .change_password(
                &id,
                ChangePasswordCommand {
                    current_password: "Wrong!Pass1234".to_string(),
                    new_password: NewPassword::new("N3w!Password99".to_string()).unwrap(),
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let id = existing.id;
        let old_hash = existing.password_hash.clone();

        fixture
            .accounts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture
            .accounts
            .expect_update_password_hash()
            .withf(move |account_id, hash, _| *account_id == id && hash.to_string() != old_hash)
            .times(1)
            .returning(|_, _, _| Ok(()));
        fixture.accounts.expect_update().never();
        fixture
            .sessions
            .expect_delete_for_account()
            .times(1)
            .returning(|_| Ok(1));

        let result = fixture
            .build()
            .change_password(
                &id,
                ChangePasswordCommand {
                    current_password: PASSWORD.to_string(),
                    new_password: NewPassword::new("N3w!Password99".to_string()).unwrap(),
                },
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_must_differ() {
        let mut fixture = Fixture::new();
        let existing = account(fixture.now());
        let id = existing.id;

        fixture
            .accounts
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        fixture.accounts.expect_update_password_hash().never();

        let result = fixture
            .build()
            .change_password(
                &id,
                ChangePasswordCommand {
                    current_password: PASSWORD.to_string(),
                    new_password: NewPassword::new(PASSWORD.to_string()).unwrap(),
                },
            )
            .await;

        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn test_verify_email_marks_verified() {
        let mut fixture = Fixture::new();
        let mut existing = account(fixture.now());
        existing.email_verified = false;
        existing.email_verification = Some(EmailVerification {
            token_digest: auth::opaque::digest("raw-token"),
            expires_at: fixture.now() + Duration::hours(1),
        });

        fixture
            .accounts
            .expect_consume_verification_token()
            .withf(|digest, _| digest.to_string() == auth::opaque::digest("raw-token"))
            .times(1)
            .returning(move |_, _| {
                let mut verified = existing.clone();
                verified.email_verified = true;
                verified.email_verification = None;
                Ok(Some(verified))
            });
        fixture.accounts.expect_update().never();

        assert!(fixture.build().verify_email("raw-token").await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_email_unknown_token() {
        let mut fixture = Fixture::new();

        fixture
            .accounts
            .expect_consume_verification_token()
            .times(1)
            .returning(|_, _| Ok(None));

        let result = fixture.build().verify_email("nope").await;

        assert!(matches!(result, Err(AuthError::InvalidVerificationToken)));
    }
}
