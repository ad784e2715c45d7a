use std::env;
use std::time::Duration as StdDuration;

use auth::PasswordError;
use auth::PasswordHasher;
use auth::TokenIssuerConfig;
use chrono::Duration;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::domain::account::lockout::LockoutPolicy;
use crate::domain::session::models::SessionPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub lockout: LockoutConfig,
    pub session: SessionConfig,
    pub cache: CacheConfig,
    pub storage: StorageConfig,
    pub hashing: HashingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
    pub statement_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    pub auth_timeout_ms: u64,
}

#[derive(Deserialize, Clone)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LockoutConfig {
    pub max_attempts: u32,
    pub window_minutes: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub policy: SessionPolicy,
    pub purge_interval_secs: u64,
    pub cookie_secure: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    pub default_ttl_secs: i64,
    pub max_body_bytes: usize,
    pub max_entries: u64,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

/// Argon2id cost parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct HashingConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_secret", &"***")
            .field("refresh_secret", &"***")
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .finish()
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.acquire_timeout_ms)
    }
}

impl ServerConfig {
    pub fn auth_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.auth_timeout_ms)
    }
}

impl JwtConfig {
    pub fn issuer_config(&self) -> TokenIssuerConfig {
        TokenIssuerConfig {
            access_secret: self.access_secret.as_bytes().to_vec(),
            refresh_secret: self.refresh_secret.as_bytes().to_vec(),
            access_ttl: Duration::minutes(self.access_ttl_minutes),
            refresh_ttl: Duration::days(self.refresh_ttl_days),
        }
    }
}

impl LockoutConfig {
    pub fn policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.max_attempts,
            window: Duration::minutes(self.window_minutes),
        }
    }
}

impl SessionConfig {
    pub fn purge_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.purge_interval_secs)
    }
}

impl CacheConfig {
    pub fn default_ttl(&self) -> Duration {
        Duration::seconds(self.default_ttl_secs)
    }
}

impl HashingConfig {
    /// # Errors
    /// * `InvalidParameters` - Argon2 rejected the cost parameters
    pub fn hasher(&self) -> Result<PasswordHasher, PasswordError> {
        PasswordHasher::with_params(self.memory_kib, self.iterations, self.parallelism)
    }
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JWT__ACCESS_SECRET, SERVER__HTTP_PORT, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: DATABASE__URL=postgres://... overrides database.url
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;

        Ok(config)
    }
}
