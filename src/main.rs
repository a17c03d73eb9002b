use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod db;
mod error;
mod routes;
mod services;

use config::Config;
use services::monitor::JobMonitor;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "notification_delivery=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting notification delivery service");

    let pool = services::init::init_db(&config).await?;

    let provider = services::providers::build_provider(&config.email)
        .map_err(|e| anyhow::anyhow!("failed to construct email provider: {}", e))?;
    tracing::info!(provider = provider.name(), "email provider configured");

    // Claims, renders, and delivers jobs in the background.
    let mut monitor = JobMonitor::start(pool.clone(), &config.notifier, provider);

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
    });

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api/notifications", routes::notifications::router())
        .with_state(app_state)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down job monitor");
    monitor.stop();
    monitor
        .join(Duration::from_secs(config.notifier.join_timeout_seconds))
        .await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to install ctrl-c handler: {}", e);
    }
}
