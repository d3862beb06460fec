mod analytics;
mod config;
mod db;
mod domain;
mod middleware;
mod services;
mod state;
mod time_utils;
mod web;

use crate::config::AppConfig;
use crate::db::{IssueStore, MemoryStore, PgStore};
use crate::middleware::RateLimiter;
use crate::state::SharedState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const LIMITER_CLEANUP_CRON: &str = "0 30 * * * *";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn IssueStore> = match &config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to run database migrations: {}", e);
                    e
                })?;
            tracing::info!("Database migrations completed");

            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, issues are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let shared: SharedState = Arc::new(state::AppState {
        store,
        session_key: config.session_key.clone(),
        anon_limiter: RateLimiter::new(config.anon_report_limit, config.anon_report_window_secs),
    });

    let scheduler = JobScheduler::new().await?;

    // Safety net for refreshes lost to crashes or failed spawns
    let shared_for_rollup = shared.clone();
    scheduler
        .add(Job::new_async(config.rollup_cron.as_str(), move |_uuid, _l| {
            let state = shared_for_rollup.clone();
            Box::pin(async move {
                if let Err(e) =
                    analytics::rollup::refresh_daily_rollup(state.store.as_ref(), chrono::Utc::now())
                        .await
                {
                    tracing::error!("Scheduled rollup refresh failed: {}", e);
                }
            })
        })?)
        .await?;

    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async(LIMITER_CLEANUP_CRON, move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                let remaining = state.anon_limiter.cleanup().await;
                tracing::debug!("Rate limiter cleanup done, {} clients tracked", remaining);
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - Daily rollup refresh: {}", config.rollup_cron);
    tracing::info!("  - Rate limiter cleanup: hourly");

    let app = web::routes(shared)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
