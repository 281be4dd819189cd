use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    AppError, BadgeRequest, BadgeResponse, EvaluateResponse, LeaderboardEntry,
    UserAchievementsResponse,
};

use crate::access::{self, Action, Actor, Resource};
use crate::auth::extractors::{AuthRequired, RoleRequired, MASTER};
use crate::error_convert::ValidateRequest;

/// Number of users shown on the leaderboard.
const LEADERBOARD_SIZE: i64 = 10;

// ---------------------------------------------------------------------------
// GET /api/achievements
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/achievements",
    responses(
        (status = 200, description = "Badge catalogue", body = Vec<BadgeResponse>)
    ),
    tag = "achievements"
)]
pub async fn list_badges(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(_claims): AuthRequired,
) -> Result<Json<Vec<BadgeResponse>>, AppError> {
    let badges = crate::repo::achievement::list(&pool).await?;
    Ok(Json(badges.into_iter().map(BadgeResponse::from).collect()))
}

// ---------------------------------------------------------------------------
// POST /api/achievements
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/achievements",
    request_body = BadgeRequest,
    responses(
        (status = 201, description = "Badge created", body = BadgeResponse),
        (status = 403, description = "Master only", body = AppError),
        (status = 409, description = "Code already in use", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "achievements"
)]
pub async fn create_badge(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(_claims): RoleRequired<MASTER>,
    Json(body): Json<BadgeRequest>,
) -> Result<(StatusCode, Json<BadgeResponse>), AppError> {
    body.validate_request()?;
    let badge = crate::repo::achievement::create(&pool, &body).await?;
    Ok((StatusCode::CREATED, Json(BadgeResponse::from(badge))))
}

// ---------------------------------------------------------------------------
// PUT /api/achievements/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/achievements/{id}",
    params(("id" = i64, Path, description = "Badge ID")),
    request_body = BadgeRequest,
    responses(
        (status = 200, description = "Badge updated", body = BadgeResponse),
        (status = 403, description = "Master only", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "achievements"
)]
pub async fn update_badge(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(_claims): RoleRequired<MASTER>,
    Path(id): Path<i64>,
    Json(body): Json<BadgeRequest>,
) -> Result<Json<BadgeResponse>, AppError> {
    body.validate_request()?;
    let badge = crate::repo::achievement::update(&pool, id, &body)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Badge {} not found", id)))?;
    Ok(Json(BadgeResponse::from(badge)))
}

// ---------------------------------------------------------------------------
// DELETE /api/achievements/{id}
// ---------------------------------------------------------------------------

/// Delete a badge. Users who earned it lose it.
#[utoipa::path(
    delete,
    path = "/api/achievements/{id}",
    params(("id" = i64, Path, description = "Badge ID")),
    responses(
        (status = 204, description = "Badge deleted"),
        (status = 403, description = "Master only", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "achievements"
)]
pub async fn delete_badge(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(_claims): RoleRequired<MASTER>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let deleted = crate::repo::achievement::delete(&pool, id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Badge {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// GET /api/achievements/leaderboard
// ---------------------------------------------------------------------------

/// Users with the most badges. Non-masters see their own entity only.
#[utoipa::path(
    get,
    path = "/api/achievements/leaderboard",
    responses(
        (status = 200, description = "Top badge holders", body = Vec<LeaderboardEntry>)
    ),
    tag = "achievements"
)]
pub async fn leaderboard(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let actor = Actor::from(&claims);
    let entity_id = if actor.is_master() { None } else { actor.entity_id };
    let rows = crate::repo::achievement::leaderboard(&pool, entity_id, LEADERBOARD_SIZE).await?;
    Ok(Json(rows))
}

// ---------------------------------------------------------------------------
// GET /api/users/{id}/achievements
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/users/{id}/achievements",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Counters and earned badges", body = UserAchievementsResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "achievements"
)]
pub async fn user_achievements(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<UserAchievementsResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::User(id)).await?;

    let counters = crate::repo::achievement::counters(&pool, id).await?;
    let badges = crate::repo::achievement::user_badges(&pool, id).await?;
    Ok(Json(UserAchievementsResponse {
        user_id: id,
        counters,
        badges,
    }))
}

// ---------------------------------------------------------------------------
// POST /api/users/{id}/achievements/evaluate
// ---------------------------------------------------------------------------

/// Award every badge the user qualifies for. Returns only new badges.
#[utoipa::path(
    post,
    path = "/api/users/{id}/achievements/evaluate",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Newly awarded badges", body = EvaluateResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "achievements"
)]
pub async fn evaluate_user(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<EvaluateResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::User(id)).await?;

    let awarded = crate::repo::achievement::evaluate(&pool, id).await?;
    if !awarded.is_empty() {
        tracing::info!(user_id = id, count = awarded.len(), "Badges awarded");
    }
    Ok(Json(EvaluateResponse {
        user_id: id,
        awarded: awarded.into_iter().map(BadgeResponse::from).collect(),
    }))
}
