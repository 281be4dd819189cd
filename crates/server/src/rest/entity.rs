use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    normalize_pagination, page_offset, AppError, EntityListParams, EntityRequest, EntityResponse,
    EntityStats, PaginatedResponse, UserResponse,
};

use crate::access::{self, Action, Actor, Resource};
use crate::auth::extractors::{AuthRequired, RoleRequired, MASTER};
use crate::error_convert::ValidateRequest;

// ---------------------------------------------------------------------------
// GET /api/entities
// ---------------------------------------------------------------------------

/// Search entities. Non-master callers only ever see their own entity.
#[utoipa::path(
    get,
    path = "/api/entities",
    params(EntityListParams),
    responses(
        (status = 200, description = "Entities", body = PaginatedResponse<EntityResponse>),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "entities"
)]
pub async fn list_entities(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Query(params): Query<EntityListParams>,
) -> Result<Json<PaginatedResponse<EntityResponse>>, AppError> {
    let actor = Actor::from(&claims);
    let (page, limit) = normalize_pagination(params.page, params.limit);

    let only_id = match (actor.is_master(), actor.entity_id) {
        (true, _) => None,
        (false, Some(entity_id)) => Some(entity_id),
        (false, None) => return Ok(Json(PaginatedResponse::new(Vec::new(), page, limit, 0))),
    };

    let (entities, total) = crate::repo::entity::search(
        &pool,
        only_id,
        params.q.as_deref(),
        params.entity_type.map(|t| t.as_str()),
        params.active,
        page_offset(page, limit),
        limit,
    )
    .await?;

    let response = PaginatedResponse::new(entities, page, limit, total).map(EntityResponse::from);
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/entities
// ---------------------------------------------------------------------------

/// Create an entity (master only).
#[utoipa::path(
    post,
    path = "/api/entities",
    request_body = EntityRequest,
    responses(
        (status = 201, description = "Entity created", body = EntityResponse),
        (status = 400, description = "Invalid request", body = AppError),
        (status = 409, description = "Name already in use", body = AppError)
    ),
    tag = "entities"
)]
pub async fn create_entity(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(_claims): RoleRequired<MASTER>,
    Json(body): Json<EntityRequest>,
) -> Result<(StatusCode, Json<EntityResponse>), AppError> {
    body.validate_request()?;
    let entity = crate::repo::entity::create(&pool, &body).await?;
    tracing::info!(entity_id = entity.id, name = %entity.name, "Entity created");
    Ok((StatusCode::CREATED, Json(EntityResponse::from(entity))))
}

// ---------------------------------------------------------------------------
// GET /api/entities/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/entities/{id}",
    params(("id" = i64, Path, description = "Entity ID")),
    responses(
        (status = 200, description = "Entity found", body = EntityResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "entities"
)]
pub async fn get_entity(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<EntityResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Entity(id)).await?;

    let entity = crate::repo::entity::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Entity {} not found", id)))?;
    Ok(Json(EntityResponse::from(entity)))
}

// ---------------------------------------------------------------------------
// PUT /api/entities/{id}
// ---------------------------------------------------------------------------

/// Replace an entity's fields (head of the entity or master).
#[utoipa::path(
    put,
    path = "/api/entities/{id}",
    params(("id" = i64, Path, description = "Entity ID")),
    request_body = EntityRequest,
    responses(
        (status = 200, description = "Entity updated", body = EntityResponse),
        (status = 400, description = "Invalid request", body = AppError),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "entities"
)]
pub async fn update_entity(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<EntityRequest>,
) -> Result<Json<EntityResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Entity(id)).await?;
    body.validate_request()?;

    let entity = crate::repo::entity::update(&pool, id, &body)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Entity {} not found", id)))?;
    Ok(Json(EntityResponse::from(entity)))
}

// ---------------------------------------------------------------------------
// DELETE /api/entities/{id}
// ---------------------------------------------------------------------------

/// Delete an entity (master only). Refused while users still belong to it.
#[utoipa::path(
    delete,
    path = "/api/entities/{id}",
    params(("id" = i64, Path, description = "Entity ID")),
    responses(
        (status = 204, description = "Entity deleted"),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Entity still has users", body = AppError)
    ),
    tag = "entities"
)]
pub async fn delete_entity(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(_claims): RoleRequired<MASTER>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let users = crate::repo::entity::user_count(&pool, id).await?;
    if users > 0 {
        return Err(AppError::conflict(format!(
            "Entity {} still has {} user(s); move or delete them first",
            id, users
        )));
    }

    let deleted = crate::repo::entity::delete(&pool, id).await?;
    if deleted {
        tracing::info!(entity_id = id, "Entity deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Entity {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// GET /api/entities/{id}/users
// ---------------------------------------------------------------------------

/// Directory of the entity's users, visible to anyone in the entity.
#[utoipa::path(
    get,
    path = "/api/entities/{id}/users",
    params(("id" = i64, Path, description = "Entity ID")),
    responses(
        (status = 200, description = "Users of the entity", body = Vec<UserResponse>),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "entities"
)]
pub async fn list_entity_users(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<Vec<UserResponse>>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Entity(id)).await?;

    let users = crate::repo::user::list_by_entity(&pool, id).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

// ---------------------------------------------------------------------------
// GET /api/entities/{id}/stats
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/entities/{id}/stats",
    params(("id" = i64, Path, description = "Entity ID")),
    responses(
        (status = 200, description = "Entity counters", body = EntityStats),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "entities"
)]
pub async fn entity_stats(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<EntityStats>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Entity(id)).await?;
    let stats = crate::repo::entity::stats(&pool, id).await?;
    Ok(Json(stats))
}
