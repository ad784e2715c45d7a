use std::sync::Arc;

use auth::PasswordError;
use auth::PasswordHasher;

use crate::domain::account::models::Account;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::ports::AccountRepository;
use crate::domain::auth::errors::AuthError;

/// Plaintext hashed once at startup to produce the stand-in hash compared
/// against when no account matches.
const DUMMY_PASSWORD: &str = "unused-credential-for-timing-equalisation";

/// Outcome of checking a candidate password.
#[derive(Debug)]
pub enum CredentialCheck {
    Matched(Account),
    Mismatch(Account),
    /// No active account with that email.
    NotFound,
}

/// Checks email/password pairs against stored Argon2id hashes.
///
/// Every check costs one hash comparison, whether or not the account
/// exists. Hashing runs on the blocking pool. Never mutates state.
pub struct CredentialVerifier<AR>
where
    AR: AccountRepository,
{
    accounts: Arc<AR>,
    hasher: PasswordHasher,
    dummy_hash: String,
}

impl<AR> CredentialVerifier<AR>
where
    AR: AccountRepository,
{
    /// # Errors
    /// * `HashingFailed` - The stand-in hash could not be computed
    pub fn new(accounts: Arc<AR>, hasher: PasswordHasher) -> Result<Self, PasswordError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            accounts,
            hasher,
            dummy_hash,
        })
    }

    /// Find the active account for `email`. Inactive accounts are reported
    /// as absent.
    pub async fn lookup(&self, email: &EmailAddress) -> Result<Option<Account>, AuthError> {
        Ok(self
            .accounts
            .find_by_email(email)
            .await?
            .filter(|account| account.active))
    }

    /// Compare `candidate` with the account's hash, or with the stand-in hash
    /// when there is no account.
    pub async fn compare(
        &self,
        account: Option<Account>,
        candidate: &str,
    ) -> Result<CredentialCheck, AuthError> {
        match account {
            Some(account) => {
                if self.matches(candidate, &account.password_hash).await? {
                    Ok(CredentialCheck::Matched(account))
                } else {
                    Ok(CredentialCheck::Mismatch(account))
                }
            }
            None => {
                self.matches(candidate, &self.dummy_hash).await?;
                Ok(CredentialCheck::NotFound)
            }
        }
    }

    /// Look up and compare in one step.
    pub async fn verify(
        &self,
        email: &EmailAddress,
        candidate: &str,
    ) -> Result<CredentialCheck, AuthError> {
        let account = self.lookup(email).await?;
        self.compare(account, candidate).await
    }

    /// Hash a new password on the blocking pool.
    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::ServerError(format!("Hashing task failed: {}", e)))?
            .map_err(AuthError::from)
    }

    async fn matches(&self, candidate: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let candidate = candidate.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&candidate, &hash))
            .await
            .map_err(|e| AuthError::ServerError(format!("Verification task failed: {}", e)))?
            .map_err(AuthError::from)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::domain::account::lockout::LockoutState;
    use crate::domain::account::models::AccountId;
    use crate::domain::account::models::DisplayName;
    use crate::domain::account::models::MultiFactorConfig;
    use crate::domain::account::models::Role;
    use crate::domain::account::ports::MockAccountRepository;

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(1024, 1, 1).unwrap()
    }

    fn account(password: &str, active: bool) -> Account {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        Account {
            id: AccountId::new(),
            name: DisplayName::new("Ann".to_string()).unwrap(),
            email: EmailAddress::new("ann@x.com".to_string()).unwrap(),
            phone: None,
            password_hash: hasher().hash(password).unwrap(),
            roles: vec![Role::User],
            organization_id: None,
            active,
            email_verified: true,
            email_verification: None,
            lockout: LockoutState::default(),
            mfa: MultiFactorConfig::default(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn verifier_returning(account: Option<Account>) -> CredentialVerifier<MockAccountRepository> {
        let mut repository = MockAccountRepository::new();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(account.clone()));
        CredentialVerifier::new(Arc::new(repository), hasher()).unwrap()
    }

    fn email() -> EmailAddress {
        EmailAddress::new("ann@x.com".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_matching_password() {
        let verifier = verifier_returning(Some(account("Str0ng!Pass123", true)));
        let check = verifier.verify(&email(), "Str0ng!Pass123").await.unwrap();
        assert!(matches!(check, CredentialCheck::Matched(_)));
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let verifier = verifier_returning(Some(account("Str0ng!Pass123", true)));
        let check = verifier.verify(&email(), "Wrong!Pass1234").await.unwrap();
        assert!(matches!(check, CredentialCheck::Mismatch(_)));
    }

    #[tokio::test]
    async fn test_unknown_email() {
        let verifier = verifier_returning(None);
        let check = verifier.verify(&email(), "Str0ng!Pass123").await.unwrap();
        assert!(matches!(check, CredentialCheck::NotFound));
    }

    #[tokio::test]
    async fn test_inactive_account_is_not_found() {
        let verifier = verifier_returning(Some(account("Str0ng!Pass123", false)));
        let check = verifier.verify(&email(), "Str0ng!Pass123").await.unwrap();
        assert!(matches!(check, CredentialCheck::NotFound));
    }

    #[tokio::test]
    async fn test_hash_produces_verifiable_phc_string() {
        let verifier = CredentialVerifier::new(Arc::new(MockAccountRepository::new()), hasher())
            .unwrap();
        let hash = verifier.hash("Str0ng!Pass123").await.unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher().verify("Str0ng!Pass123", &hash).unwrap());
    }
}
