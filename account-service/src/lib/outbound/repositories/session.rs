use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::account::models::AccountId;
use crate::domain::session::errors::SessionError;
use crate::domain::session::models::DeviceDescriptor;
use crate::domain::session::models::RevocationScope;
use crate::domain::session::models::SessionId;
use crate::domain::session::models::SessionRecord;
use crate::domain::session::ports::SessionRepository;

#[derive(FromRow)]
struct SessionRow {
    id: Uuid,
    account_id: Uuid,
    token_digest: String,
    jti: String,
    user_agent: Option<String>,
    ip: Option<String>,
    device_id: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl From<SessionRow> for SessionRecord {
    fn from(r: SessionRow) -> Self {
        SessionRecord {
            id: SessionId(r.id),
            account_id: AccountId(r.account_id),
            token_digest: r.token_digest,
            jti: r.jti,
            device: DeviceDescriptor {
                user_agent: r.user_agent,
                ip: r.ip,
                device_id: r.device_id,
            },
            created_at: r.created_at,
            expires_at: r.expires_at,
        }
    }
}

fn database_error(e: sqlx::Error) -> SessionError {
    SessionError::DatabaseError(e.to_string())
}

pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    async fn insert_replacing(
        &self,
        record: SessionRecord,
        scope: RevocationScope,
    ) -> Result<(), SessionError> {
        let mut tx = self.pool.begin().await.map_err(database_error)?;

        // Concurrent logins for one account queue on the account row, so each
        // DELETE sees the session the previous transaction committed.
        sqlx::query("SELECT 1 FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(record.account_id.0)
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        match &scope {
            RevocationScope::Account => {
                sqlx::query("DELETE FROM sessions WHERE account_id = $1")
                    .bind(record.account_id.0)
                    .execute(&mut *tx)
                    .await
                    .map_err(database_error)?;
            }
            RevocationScope::Device(key) => {
                sqlx::query(
                    r#"
                    DELETE FROM sessions
                    WHERE account_id = $1
                      AND NULLIF(COALESCE(NULLIF(device_id, ''), user_agent), '') = $2
                    "#,
                )
                .bind(record.account_id.0)
                .bind(key)
                .execute(&mut *tx)
                .await
                .map_err(database_error)?;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, account_id, token_digest, jti, user_agent, ip, device_id, created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id.0)
        .bind(record.account_id.0)
        .bind(&record.token_digest)
        .bind(&record.jti)
        .bind(record.device.user_agent.as_deref())
        .bind(record.device.ip.as_deref())
        .bind(record.device.device_id.as_deref())
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&mut *tx)
        .await
        .map_err(database_error)?;

        tx.commit().await.map_err(database_error)?;
        Ok(())
    }

    async fn find_by_digest(
        &self,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<SessionRecord>, SessionError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT id, account_id, token_digest, jti, user_agent, ip, device_id,
                   created_at, expires_at
            FROM sessions
            WHERE token_digest = $1 AND expires_at > $2
            "#,
        )
        .bind(digest)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(row.map(SessionRecord::from))
    }

    async fn delete_by_digest(&self, digest: &str) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_digest = $1")
            .bind(digest)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_account(&self, account_id: &AccountId) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE account_id = $1")
            .bind(account_id.0)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(database_error)?;

        Ok(result.rows_affected())
    }
}
