use axum::extract::FromRef;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::sync::Arc;
use std::time::Duration;

use crate::messaging::LiveSender;

/// Handler state. `FromRef` lets handlers extract `State<Pool<Postgres>>`
/// or `State<Arc<LiveSender>>` on their own.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub sender: Arc<LiveSender>,
}

impl AppState {
    /// Channel transports follow the loaded feature flags.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            sender: Arc::new(LiveSender::from_flags(crate::config::feature_flags())),
        }
    }
}

/// Lazy pool over `DATABASE_URL`; nothing connects until the first query.
///
/// Panics when `DATABASE_URL` is unset, which only happens at startup.
pub fn create_pool() -> Pool<Postgres> {
    let _ = dotenvy::dotenv();
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    PgPoolOptions::new()
        .max_connections(crate::config::env_parse("DATABASE_MAX_CONNECTIONS", 10))
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(&url)
        .expect("DATABASE_URL is not a valid PostgreSQL URL")
}

/// Apply the workspace `migrations/` directory.
pub async fn run_migrations(pool: &Pool<Postgres>) {
    match sqlx::migrate!("../../migrations").run(pool).await {
        Ok(()) => tracing::info!("Database schema is up to date"),
        Err(e) => panic!("Failed to run database migrations: {e}"),
    }
}
