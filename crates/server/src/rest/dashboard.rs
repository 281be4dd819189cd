use axum::{extract::State, Json};
use sqlx::{Pool, Postgres};

use shared_types::{AppError, DashboardStats};

use crate::access::{Actor, ListScope};
use crate::auth::extractors::AuthRequired;

// ---------------------------------------------------------------------------
// GET /api/dashboard/stats
// ---------------------------------------------------------------------------

/// Home counters scoped to what the caller can see.
#[utoipa::path(
    get,
    path = "/api/dashboard/stats",
    responses(
        (status = 200, description = "Dashboard counters", body = DashboardStats)
    ),
    tag = "dashboard"
)]
pub async fn stats(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
) -> Result<Json<DashboardStats>, AppError> {
    let actor = Actor::from(&claims);
    let stats = crate::repo::dashboard::stats(
        &pool,
        actor.is_master(),
        actor.user_id,
        actor.entity_id,
        ListScope::for_actor(&actor).entity_filter(),
    )
    .await?;
    Ok(Json(stats))
}
