use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use card_service::api::{self, middleware::state::AppState};
use card_service::config::Config;
use card_service::db;
use card_service::repository::CardRepository;
use card_service::services::account_client::HttpAccountClient;
use card_service::services::card_lifecycle::CardService;
use card_service::services::context::RequestContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "card_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting card service...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        pod_name = %config.pod_name,
        environment = %config.environment,
        "Configuration loaded successfully"
    );

    // Create database pool
    let pool = db::connect_with_retry(
        config.database_url.expose_secret(),
        config.db_max_connections,
        Duration::from_secs(config.db_acquire_timeout_secs),
    )
    .await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let accounts = HttpAccountClient::new(config.account_service.clone())?;
    let service = CardService::new(CardRepository::new(pool), Arc::new(accounts));

    // Report dependency health once, serving starts either way
    let ctx = RequestContext::new("startup", config.ctx_timeout());
    match service.health_check(&ctx).await {
        Ok(()) => tracing::info!("Startup health check passed"),
        Err(e) => tracing::warn!(error = %e, "Startup health check failed"),
    }

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        service,
        config: config.clone(),
    };
    let app = api::app(state);

    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for CTRL+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received, cleaning up...");
}
