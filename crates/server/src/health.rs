use axum::extract::State;
use axum::Json;
use serde::Serialize;
use shared_types::{Channel, FeatureFlags};
use sqlx::{Pool, Postgres};
use std::sync::OnceLock;
use std::time::Instant;

static STARTED_AT: OnceLock<Instant> = OnceLock::new();

/// Remember when the process started; later calls are ignored.
pub fn record_start_time() {
    STARTED_AT.get_or_init(Instant::now);
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database does not answer.
    pub status: &'static str,
    pub db: String,
    pub uptime_seconds: u64,
    pub version: &'static str,
    /// Delivery channels this instance can use.
    pub channels: Vec<Channel>,
}

/// Channels available under `flags`. In-app delivery is always on.
pub fn enabled_channels(flags: &FeatureFlags) -> Vec<Channel> {
    [
        (Channel::Email, flags.mailgun),
        (Channel::Whatsapp, flags.whatsapp),
        (Channel::Telegram, flags.telegram),
        (Channel::System, true),
    ]
    .into_iter()
    .filter_map(|(channel, on)| on.then_some(channel))
    .collect()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(pool): State<Pool<Postgres>>) -> Json<HealthResponse> {
    let ping = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&pool).await;
    let (status, db) = match ping {
        Ok(_) => ("ok", "connected".to_string()),
        Err(e) => {
            tracing::warn!(error = %e, "Database unreachable from health check");
            ("degraded", format!("error: {e}"))
        }
    };

    Json(HealthResponse {
        status,
        db,
        uptime_seconds: STARTED_AT.get().map_or(0, |t| t.elapsed().as_secs()),
        version: env!("CARGO_PKG_VERSION"),
        channels: enabled_channels(crate::config::feature_flags()),
    })
}
