//! Quillboard - a moderated blog backend

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quillboard::{
    api::{self, AppState},
    config::Config,
    db,
    services::{LoginRateLimiter, MaintenanceService},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quillboard=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Quillboard...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    let applied = db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed ({} applied)", applied);

    let state = AppState::new(pool, &config);

    spawn_cleanup_job(
        state.maintenance.clone(),
        state.rate_limiter.clone(),
        config.jobs.token_cleanup_interval_secs,
    );

    // Build router
    let app = api::build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Purge expired reset tokens, sessions and stale login attempts on an interval
fn spawn_cleanup_job(
    maintenance: Arc<MaintenanceService>,
    limiter: Arc<LoginRateLimiter>,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(interval_secs.max(1)));
        loop {
            interval.tick().await;

            if let Err(e) = maintenance.clean_expired_tokens().await {
                tracing::warn!("Token cleanup failed: {:#}", e);
            }

            let dropped = limiter.cleanup().await;
            if dropped > 0 {
                tracing::debug!("Dropped {} stale login attempt entries", dropped);
            }
        }
    });
}
