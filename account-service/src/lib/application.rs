//! Wiring of services, HTTP state and background maintenance.

use std::sync::Arc;
use std::time::Duration;

use auth::JwtError;
use auth::PasswordError;
use auth::PasswordHasher;
use auth::TokenIssuer;
use auth::TokenIssuerConfig;
use axum::Router;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::domain::account::lockout::LockoutPolicy;
use crate::domain::account::ports::AccountRepository;
use crate::domain::account::service::AccountService;
use crate::domain::auth::errors::AuthError;
use crate::domain::auth::ports::AccountNotifier;
use crate::domain::auth::service::AuthService;
use crate::domain::cache::ResponseCache;
use crate::domain::clock::Clock;
use crate::domain::session::models::SessionPolicy;
use crate::domain::session::ports::SessionRepository;
use crate::domain::session::service::TokenStore;
use crate::inbound::http::router::create_router;
use crate::inbound::http::router::AppState;
use crate::inbound::http::router::HttpSettings;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("Invalid token settings: {0}")]
    Tokens(#[from] JwtError),

    #[error("Invalid hashing settings: {0}")]
    Hashing(#[from] PasswordError),

    #[error("Service initialisation failed: {0}")]
    Service(#[from] AuthError),
}

/// Storage and collaborator implementations.
pub struct Adapters<AR, SR, N> {
    pub accounts: Arc<AR>,
    pub sessions: Arc<SR>,
    pub notifier: Arc<N>,
    pub cache: Arc<dyn ResponseCache>,
    pub clock: Arc<dyn Clock>,
}

/// Tunables resolved from configuration.
pub struct Settings {
    pub issuer: TokenIssuerConfig,
    pub hasher: PasswordHasher,
    pub lockout: LockoutPolicy,
    pub session_policy: SessionPolicy,
    pub http: HttpSettings,
}

impl Settings {
    /// # Errors
    /// * `Hashing` - Argon2 rejected the configured cost
    pub fn from_config(config: &Config) -> Result<Self, ApplicationError> {
        Ok(Self {
            issuer: config.jwt.issuer_config(),
            hasher: config.hashing.hasher()?,
            lockout: config.lockout.policy(),
            session_policy: config.session.policy,
            http: HttpSettings {
                auth_timeout: config.server.auth_timeout(),
                cache_default_ttl: config.cache.default_ttl(),
                cache_max_body_bytes: config.cache.max_body_bytes,
                cookie_secure: config.session.cookie_secure,
            },
        })
    }
}

pub struct Application<SR>
where
    SR: SessionRepository,
{
    state: AppState,
    sessions: Arc<TokenStore<SR>>,
}

impl<SR> Application<SR>
where
    SR: SessionRepository,
{
    /// Assemble the services over the given adapters.
    ///
    /// # Errors
    /// * `Tokens` - Secrets too short or shared between token classes
    /// * `Service` - The auth service could not be initialised
    pub fn build<AR, N>(
        adapters: Adapters<AR, SR, N>,
        settings: Settings,
    ) -> Result<Self, ApplicationError>
    where
        AR: AccountRepository,
        N: AccountNotifier,
    {
        let issuer = Arc::new(TokenIssuer::new(settings.issuer)?);
        let sessions = Arc::new(TokenStore::new(adapters.sessions, settings.session_policy));

        let auth_service = AuthService::new(
            Arc::clone(&adapters.accounts),
            Arc::clone(&sessions),
            adapters.notifier,
            issuer,
            settings.hasher,
            settings.lockout,
            Arc::clone(&adapters.clock),
        )?;
        let account_service = AccountService::new(
            adapters.accounts,
            Arc::clone(&sessions),
            Arc::clone(&adapters.clock),
        );

        let state = AppState {
            auth_service: Arc::new(auth_service),
            account_service: Arc::new(account_service),
            cache: adapters.cache,
            clock: adapters.clock,
            settings: settings.http,
        };

        Ok(Self { state, sessions })
    }

    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Run one maintenance pass: drop expired sessions and cache entries.
    pub async fn purge_expired(&self) {
        purge_once(&self.sessions, self.state.cache.as_ref(), self.state.clock.as_ref()).await;
    }

    /// Spawn the periodic maintenance task. The first pass runs after one
    /// full `interval`.
    pub fn spawn_maintenance(&self, interval: Duration) -> JoinHandle<()> {
        let sessions = Arc::clone(&self.sessions);
        let cache = Arc::clone(&self.state.cache);
        let clock = Arc::clone(&self.state.clock);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                purge_once(&sessions, cache.as_ref(), clock.as_ref()).await;
            }
        })
    }
}

async fn purge_once<SR>(sessions: &TokenStore<SR>, cache: &dyn ResponseCache, clock: &dyn Clock)
where
    SR: SessionRepository,
{
    let now = clock.now();

    match sessions.purge_expired(now).await {
        Ok(removed) => tracing::info!(removed, "Expired sessions purged"),
        Err(e) => tracing::error!(error = %e, "Session purge failed"),
    }

    let evicted = cache.purge_expired(now).await;
    tracing::debug!(evicted, "Expired cache entries purged");
}
