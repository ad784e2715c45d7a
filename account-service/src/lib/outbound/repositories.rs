use sqlx::postgres::PgPoolOptions;
use sqlx::Executor;
use sqlx::PgPool;

use crate::config::DatabaseConfig;

pub mod account;
pub mod memory;
pub mod session;

pub use account::PostgresAccountRepository;
pub use memory::InMemoryAccountRepository;
pub use memory::InMemorySessionRepository;
pub use session::PostgresSessionRepository;

/// Open the Postgres pool.
///
/// Every connection gets a session `statement_timeout`, so no query can hold
/// a request longer than the configured bound.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    let statement_timeout = format!("SET statement_timeout = {}", config.statement_timeout_ms);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .after_connect(move |conn, _meta| {
            let statement_timeout = statement_timeout.clone();
            Box::pin(async move {
                conn.execute(statement_timeout.as_str()).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await
}
