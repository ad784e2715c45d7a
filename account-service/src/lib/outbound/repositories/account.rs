use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::account::errors::AccountError;
use crate::domain::account::lockout::FailureOutcome;
use crate::domain::account::lockout::LockoutPolicy;
use crate::domain::account::lockout::LockoutState;
use crate::domain::account::lockout::SuccessOutcome;
use crate::domain::account::models::Account;
use crate::domain::account::models::AccountId;
use crate::domain::account::models::DisplayName;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::EmailVerification;
use crate::domain::account::models::MultiFactorConfig;
use crate::domain::account::models::OrganizationId;
use crate::domain::account::models::PhoneNumber;
use crate::domain::account::models::Role;
use crate::domain::account::ports::AccountRepository;

const ACCOUNT_COLUMNS: &str = r#"
    id, name, email, phone, password_hash, roles, organization_id, active,
    email_verified, verification_token_digest, verification_expires_at,
    failed_login_attempts, locked_until, mfa_enabled, mfa_secret,
    mfa_recovery_codes, last_login_at, created_at, updated_at
"#;

#[derive(FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    email: String,
    phone: Option<String>,
    password_hash: String,
    roles: Vec<String>,
    organization_id: Option<Uuid>,
    active: bool,
    email_verified: bool,
    verification_token_digest: Option<String>,
    verification_expires_at: Option<DateTime<Utc>>,
    failed_login_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    mfa_enabled: bool,
    mfa_secret: Option<String>,
    mfa_recovery_codes: Vec<String>,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = AccountError;

    fn try_from(r: AccountRow) -> Result<Self, Self::Error> {
        let id = r.id;
        let corrupt = |field: &str, e: String| {
            AccountError::CorruptRecord(format!("account {} {}: {}", id, field, e))
        };

        let roles = r
            .roles
            .iter()
            .map(|role| role.parse::<Role>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| corrupt("roles", e.to_string()))?;

        let email_verification = match (r.verification_token_digest, r.verification_expires_at) {
            (Some(token_digest), Some(expires_at)) => Some(EmailVerification {
                token_digest,
                expires_at,
            }),
            _ => None,
        };

        Ok(Account {
            id: AccountId(id),
            name: DisplayName::new(r.name).map_err(|e| corrupt("name", e.to_string()))?,
            email: EmailAddress::new(r.email).map_err(|e| corrupt("email", e.to_string()))?,
            phone: r
                .phone
                .map(PhoneNumber::new)
                .transpose()
                .map_err(|e| corrupt("phone", e.to_string()))?,
            password_hash: r.password_hash,
            roles,
            organization_id: r.organization_id.map(OrganizationId),
            active: r.active,
            email_verified: r.email_verified,
            email_verification,
            lockout: LockoutState {
                failed_attempts: r.failed_login_attempts.max(0) as u32,
                locked_until: r.locked_until,
            },
            mfa: MultiFactorConfig {
                enabled: r.mfa_enabled,
                secret: r.mfa_secret,
                recovery_codes: r.mfa_recovery_codes,
            },
            last_login_at: r.last_login_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn select_where(clause: &str) -> String {
    format!("SELECT {} FROM accounts WHERE {}", ACCOUNT_COLUMNS, clause)
}

fn database_error(e: sqlx::Error) -> AccountError {
    AccountError::DatabaseError(e.to_string())
}

pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn create(&self, account: Account) -> Result<Account, AccountError> {
        let (verification_digest, verification_expires_at) = match &account.email_verification {
            Some(v) => (Some(v.token_digest.as_str()), Some(v.expires_at)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, name, email, phone, password_hash, roles, organization_id, active,
                email_verified, verification_token_digest, verification_expires_at,
                failed_login_attempts, locked_until, mfa_enabled, mfa_secret,
                mfa_recovery_codes, last_login_at, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19
            )
            "#,
        )
        .bind(account.id.0)
        .bind(account.name.as_str())
        .bind(account.email.as_str())
        .bind(account.phone.as_ref().map(|p| p.as_str()))
        .bind(&account.password_hash)
        .bind(account.role_names())
        .bind(account.organization_id.map(|o| o.0))
        .bind(account.active)
        .bind(account.email_verified)
        .bind(verification_digest)
        .bind(verification_expires_at)
        .bind(account.lockout.failed_attempts as i32)
        .bind(account.lockout.locked_until)
        .bind(account.mfa.enabled)
        .bind(account.mfa.secret.as_deref())
        .bind(&account.mfa.recovery_codes)
        .bind(account.last_login_at)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let Some(db_err) = e.as_database_error() {
                if db_err.is_unique_violation() && db_err.constraint() == Some("accounts_email_key")
                {
                    return AccountError::EmailAlreadyExists(account.email.as_str().to_string());
                }
            }
            database_error(e)
        })?;

        Ok(account)
    }

    async fn find_by_id(&self, id: &AccountId) -> Result<Option<Account>, AccountError> {
        sqlx::query_as::<_, AccountRow>(&select_where("id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<Account>, AccountError> {
        sqlx::query_as::<_, AccountRow>(&select_where("email = $1"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn consume_verification_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>, AccountError> {
        let sql = format!(
            r#"
            UPDATE accounts
            SET email_verified = TRUE, verification_token_digest = NULL,
                verification_expires_at = NULL, updated_at = $2
            WHERE verification_token_digest = $1 AND verification_expires_at > $2
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );

        sqlx::query_as::<_, AccountRow>(&sql)
            .bind(digest)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .map(Account::try_from)
            .transpose()
    }

    async fn update(&self, account: Account) -> Result<Account, AccountError> {
        let sql = format!(
            r#"
            UPDATE accounts
            SET name = $2, phone = $3, roles = $4, organization_id = $5, updated_at = $6
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(account.id.0)
            .bind(account.name.as_str())
            .bind(account.phone.as_ref().map(|p| p.as_str()))
            .bind(account.role_names())
            .bind(account.organization_id.map(|o| o.0))
            .bind(account.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or_else(|| AccountError::NotFound(account.id.to_string()))?;

        Account::try_from(row)
    }

    async fn deactivate(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<Account, AccountError> {
        let sql = format!(
            "UPDATE accounts SET active = FALSE, updated_at = $2 WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        );

        let row = sqlx::query_as::<_, AccountRow>(&sql)
            .bind(id.0)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        Account::try_from(row)
    }

    async fn update_password_hash(
        &self,
        id: &AccountId,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AccountError> {
        let result =
            sqlx::query("UPDATE accounts SET password_hash = $2, updated_at = $3 WHERE id = $1")
                .bind(id.0)
                .bind(password_hash)
                .bind(now)
                .execute(&self.pool)
                .await
                .map_err(database_error)?;

        if result.rows_affected() == 0 {
            return Err(AccountError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: &AccountId,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<FailureOutcome, AccountError> {
        let until = now + policy.window;

        // Single conditional statement: the row lock serialises concurrent
        // failures so exactly one of them crosses the threshold.
        let updated: Option<(i32, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            UPDATE accounts
            SET failed_login_attempts = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN 0
                    ELSE failed_login_attempts + 1
                END,
                locked_until = CASE
                    WHEN failed_login_attempts + 1 >= $2 THEN $3
                    ELSE locked_until
                END,
                updated_at = $4
            WHERE id = $1 AND (locked_until IS NULL OR locked_until <= $4)
            RETURNING failed_login_attempts, locked_until
            "#,
        )
        .bind(id.0)
        .bind(policy.max_attempts as i32)
        .bind(until)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        if let Some((attempts, locked_until)) = updated {
            return Ok(match locked_until {
                Some(locked) if attempts == 0 && locked > now => {
                    FailureOutcome::LockedOut { until: locked }
                }
                _ => FailureOutcome::Counted {
                    attempts: attempts.max(0) as u32,
                },
            });
        }

        let current: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT locked_until FROM accounts WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(database_error)?;

        match current {
            Some((Some(until),)) => Ok(FailureOutcome::AlreadyLocked { until }),
            Some((None,)) => Err(AccountError::DatabaseError(format!(
                "lockout update for account {} matched no row",
                id
            ))),
            None => Err(AccountError::NotFound(id.to_string())),
        }
    }

    async fn record_successful_login(
        &self,
        id: &AccountId,
        now: DateTime<Utc>,
    ) -> Result<SuccessOutcome, AccountError> {
        // Guarded like record_failed_login so a lock set after the caller's
        // read is never cleared.
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET failed_login_attempts = 0, locked_until = NULL,
                last_login_at = $2, updated_at = $2
            WHERE id = $1 AND (locked_until IS NULL OR locked_until <= $2)
            "#,
        )
        .bind(id.0)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        if result.rows_affected() == 1 {
            return Ok(SuccessOutcome::Recorded);
        }

        let current: Option<(Option<DateTime<Utc>>,)> =
            sqlx::query_as("SELECT locked_until FROM accounts WHERE id = $1")
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await
                .map_err(database_error)?;

        match current {
            Some((Some(until),)) if until > now => Ok(SuccessOutcome::Locked { until }),
            Some(_) => Err(AccountError::DatabaseError(format!(
                "login update for account {} matched no row",
                id
            ))),
            None => Err(AccountError::NotFound(id.to_string())),
        }
    }
}
