use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    normalize_pagination, page_offset, AppError, HearingListParams, HearingRequest,
    HearingResponse, HearingStatus, HoldHearingRequest, PaginatedResponse,
};

use crate::access::{self, Action, Actor, Resource};
use crate::auth::extractors::{AuthRequired, RoleRequired, HEAD};
use crate::error_convert::ValidateRequest;

/// Entity a new hearing belongs to. Heads organize hearings for their own
/// entity; masters must name one.
fn hearing_entity(actor: &Actor, requested: Option<i64>) -> Result<i64, AppError> {
    requested
        .or(if actor.is_master() { None } else { actor.entity_id })
        .ok_or_else(|| AppError::invalid_field("entity_id", "entity_id is required"))
}

fn already_closed(id: i64) -> AppError {
    AppError::conflict(format!("Hearing {} is no longer scheduled", id))
}

// ---------------------------------------------------------------------------
// GET /api/hearings
// ---------------------------------------------------------------------------

/// Hearings are public: every authenticated user can browse them.
#[utoipa::path(
    get,
    path = "/api/hearings",
    params(HearingListParams),
    responses(
        (status = 200, description = "Hearings", body = PaginatedResponse<HearingResponse>)
    ),
    tag = "hearings"
)]
pub async fn list_hearings(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(_claims): AuthRequired,
    Query(params): Query<HearingListParams>,
) -> Result<Json<PaginatedResponse<HearingResponse>>, AppError> {
    let (page, limit) = normalize_pagination(params.page, params.limit);
    let (rows, total) = crate::repo::hearing::search(
        &pool,
        params.entity_id,
        params.status.map(|s| s.as_str()),
        params.upcoming,
        page_offset(page, limit),
        limit,
    )
    .await?;

    let response = PaginatedResponse::new(rows, page, limit, total).map(HearingResponse::from);
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/hearings
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/hearings",
    request_body = HearingRequest,
    responses(
        (status = 201, description = "Hearing scheduled", body = HearingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "hearings"
)]
pub async fn create_hearing(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(claims): RoleRequired<HEAD>,
    Json(body): Json<HearingRequest>,
) -> Result<(StatusCode, Json<HearingResponse>), AppError> {
    body.validate_request()?;
    let actor = Actor::from(&claims);
    let entity_id = hearing_entity(&actor, body.entity_id)?;
    access::authorize(&pool, &actor, Action::Create, Resource::Entity(entity_id)).await?;

    let hearing = crate::repo::hearing::create(&pool, entity_id, claims.sub, &body).await?;
    tracing::info!(hearing_id = hearing.id, entity_id, "Public hearing scheduled");
    Ok((StatusCode::CREATED, Json(HearingResponse::from(hearing))))
}

// ---------------------------------------------------------------------------
// GET /api/hearings/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/hearings/{id}",
    params(("id" = i64, Path, description = "Hearing ID")),
    responses(
        (status = 200, description = "Hearing found", body = HearingResponse),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "hearings"
)]
pub async fn get_hearing(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(_claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<HearingResponse>, AppError> {
    let hearing = crate::repo::hearing::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Hearing {} not found", id)))?;
    Ok(Json(HearingResponse::from(hearing)))
}

// ---------------------------------------------------------------------------
// PUT /api/hearings/{id}
// ---------------------------------------------------------------------------

/// Reschedule or edit a hearing that has not taken place yet.
#[utoipa::path(
    put,
    path = "/api/hearings/{id}",
    params(("id" = i64, Path, description = "Hearing ID")),
    request_body = HearingRequest,
    responses(
        (status = 200, description = "Hearing updated", body = HearingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Hearing already held or cancelled", body = AppError)
    ),
    tag = "hearings"
)]
pub async fn update_hearing(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<HearingRequest>,
) -> Result<Json<HearingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Hearing(id)).await?;
    body.validate_request()?;

    let hearing = crate::repo::hearing::update_scheduled(&pool, id, &body)
        .await?
        .ok_or_else(|| already_closed(id))?;
    Ok(Json(HearingResponse::from(hearing)))
}

// ---------------------------------------------------------------------------
// DELETE /api/hearings/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/hearings/{id}",
    params(("id" = i64, Path, description = "Hearing ID")),
    responses(
        (status = 204, description = "Hearing deleted"),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "hearings"
)]
pub async fn delete_hearing(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Hearing(id)).await?;

    let deleted = crate::repo::hearing::delete(&pool, id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Hearing {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// POST /api/hearings/{id}/hold
// ---------------------------------------------------------------------------

/// Record that a scheduled hearing took place. The heads of the organizing
/// entity are then evaluated for badges.
#[utoipa::path(
    post,
    path = "/api/hearings/{id}/hold",
    params(("id" = i64, Path, description = "Hearing ID")),
    request_body = HoldHearingRequest,
    responses(
        (status = 200, description = "Hearing held", body = HearingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Hearing already held or cancelled", body = AppError),
        (status = 422, description = "Negative attendance", body = AppError)
    ),
    tag = "hearings"
)]
pub async fn hold_hearing(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<HoldHearingRequest>,
) -> Result<Json<HearingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::UpdateStatus, Resource::Hearing(id))
        .await?;
    body.validate_request()?;

    let hearing = crate::repo::hearing::close(
        &pool,
        id,
        HearingStatus::Held,
        Some(body.attendance_count),
        body.summary.as_deref(),
    )
    .await?
    .ok_or_else(|| already_closed(id))?;

    for head_id in crate::repo::user::head_ids_in_entity(&pool, hearing.entity_id).await? {
        crate::repo::achievement::evaluate(&pool, head_id).await?;
    }

    tracing::info!(
        hearing_id = id,
        attendance = body.attendance_count,
        "Public hearing held"
    );
    Ok(Json(HearingResponse::from(hearing)))
}

// ---------------------------------------------------------------------------
// POST /api/hearings/{id}/cancel
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/hearings/{id}/cancel",
    params(("id" = i64, Path, description = "Hearing ID")),
    responses(
        (status = 200, description = "Hearing cancelled", body = HearingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Hearing already held or cancelled", body = AppError)
    ),
    tag = "hearings"
)]
pub async fn cancel_hearing(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<HearingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::UpdateStatus, Resource::Hearing(id))
        .await?;

    let hearing = crate::repo::hearing::close(&pool, id, HearingStatus::Cancelled, None, None)
        .await?
        .ok_or_else(|| already_closed(id))?;
    Ok(Json(HearingResponse::from(hearing)))
}
