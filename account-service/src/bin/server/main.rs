use std::net::SocketAddr;
use std::sync::Arc;

use account_service::application::Adapters;
use account_service::application::Application;
use account_service::application::Settings;
use account_service::config::Config;
use account_service::config::StorageBackend;
use account_service::domain::account::ports::AccountRepository;
use account_service::domain::clock::Clock;
use account_service::domain::clock::SystemClock;
use account_service::domain::session::ports::SessionRepository;
use account_service::outbound::cache::InMemoryResponseCache;
use account_service::outbound::notifier::LoggingNotifier;
use account_service::outbound::repositories::connect_pool;
use account_service::outbound::repositories::InMemoryAccountRepository;
use account_service::outbound::repositories::InMemorySessionRepository;
use account_service::outbound::repositories::PostgresAccountRepository;
use account_service::outbound::repositories::PostgresSessionRepository;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "account_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "account-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        storage = ?config.storage.backend,
        session_policy = ?config.session.policy,
        "Configuration loaded"
    );

    match config.storage.backend {
        StorageBackend::Postgres => {
            let pg_pool = connect_pool(&config.database).await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            serve(
                &config,
                Arc::new(PostgresAccountRepository::new(pg_pool.clone())),
                Arc::new(PostgresSessionRepository::new(pg_pool)),
            )
            .await
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            serve(
                &config,
                Arc::new(InMemoryAccountRepository::new()),
                Arc::new(InMemorySessionRepository::new()),
            )
            .await
        }
    }
}

async fn serve<AR, SR>(
    config: &Config,
    accounts: Arc<AR>,
    sessions: Arc<SR>,
) -> Result<(), anyhow::Error>
where
    AR: AccountRepository,
    SR: SessionRepository,
{
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let adapters = Adapters {
        accounts,
        sessions,
        notifier: Arc::new(LoggingNotifier),
        cache: Arc::new(InMemoryResponseCache::new(
            config.cache.max_entries,
            Arc::clone(&clock),
        )),
        clock,
    };
    let application = Application::build(adapters, Settings::from_config(config)?)?;

    let maintenance = application.spawn_maintenance(config.session.purge_interval());

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    axum::serve(
        http_listener,
        application
            .router()
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    maintenance.abort();
    tracing::info!("Server exited successfully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
