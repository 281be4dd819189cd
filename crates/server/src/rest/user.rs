use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    normalize_pagination, page_offset, AppError, CreateUserRequest, CreatedUserResponse,
    PaginatedResponse, PasswordResetResponse, SetActiveRequest, SetRoleRequest,
    UpdateUserRequest, UserListParams, UserResponse, UserRole,
};

use crate::access::{self, Action, Actor, ListScope, Resource};
use crate::auth::extractors::{AuthRequired, RoleRequired, HEAD, MASTER};
use crate::auth::password::{generate_password, hash_password};
use crate::error_convert::ValidateRequest;
use crate::repo::user::NewUser;

async fn ensure_entity_exists(pool: &Pool<Postgres>, entity_id: i64) -> Result<(), AppError> {
    match crate::repo::entity::find_by_id(pool, entity_id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::invalid_field(
            "entity_id",
            format!("Entity {} does not exist", entity_id),
        )),
    }
}

/// Resolve the role and entity a new account gets, given who creates it.
fn placement_for(
    actor: &Actor,
    role: UserRole,
    entity_id: Option<i64>,
) -> Result<(UserRole, Option<i64>), AppError> {
    match actor.role {
        UserRole::MasterImplementer => {
            if role.requires_entity() && entity_id.is_none() {
                return Err(AppError::invalid_field(
                    "entity_id",
                    format!("{} accounts must belong to an entity", role.label()),
                ));
            }
            Ok((role, entity_id))
        }
        UserRole::EntityHead => {
            if role != UserRole::EntityMember {
                return Err(AppError::forbidden("Entity heads can only create members"));
            }
            let own = actor
                .entity_id
                .ok_or_else(|| AppError::forbidden("Your account is not attached to an entity"))?;
            if entity_id.is_some_and(|e| e != own) {
                return Err(AppError::forbidden("Entity heads can only add users to their own entity"));
            }
            Ok((UserRole::EntityMember, Some(own)))
        }
        UserRole::EntityMember => Err(AppError::forbidden("Entity head role or higher required")),
    }
}

fn hash_or_internal(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))
}

// ---------------------------------------------------------------------------
// GET /api/users
// ---------------------------------------------------------------------------

/// Search users within the caller's scope.
#[utoipa::path(
    get,
    path = "/api/users",
    params(UserListParams),
    responses(
        (status = 200, description = "Users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Query(params): Query<UserListParams>,
) -> Result<Json<PaginatedResponse<UserResponse>>, AppError> {
    let scope = ListScope::for_actor(&Actor::from(&claims));
    let (page, limit) = normalize_pagination(params.page, params.limit);

    let entity_filter = match scope {
        ListScope::All => params.entity_id,
        _ => scope.entity_filter(),
    };

    let (users, total) = crate::repo::user::search(
        &pool,
        entity_filter,
        scope.user_filter(),
        params.q.as_deref(),
        params.role.map(|r| r.as_str()),
        params.active,
        page_offset(page, limit),
        limit,
    )
    .await?;

    let response = PaginatedResponse::new(users, page, limit, total).map(UserResponse::from);
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/users
// ---------------------------------------------------------------------------

/// Create a user. Masters may create any role; heads only members of their
/// own entity. A password is generated when none is given.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = CreatedUserResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 409, description = "Username or email already in use", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(claims): RoleRequired<HEAD>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CreatedUserResponse>), AppError> {
    body.validate_request()?;
    let actor = Actor::from(&claims);
    let (role, entity_id) = placement_for(&actor, body.role, body.entity_id)?;
    if let Some(entity_id) = entity_id {
        ensure_entity_exists(&pool, entity_id).await?;
    }

    let generated = body.password.is_none().then(generate_password);
    let password = body
        .password
        .as_deref()
        .or(generated.as_deref())
        .unwrap_or_default();
    let password_hash = hash_or_internal(password)?;

    let user = crate::repo::user::create(
        &pool,
        &NewUser {
            username: body.username.trim(),
            email: body.email.as_deref(),
            password_hash: &password_hash,
            display_name: body.display_name.trim(),
            role,
            entity_id,
            phone: body.phone.as_deref(),
            whatsapp: body.whatsapp.as_deref(),
            telegram_chat_id: body.telegram_chat_id.as_deref(),
        },
    )
    .await?;

    tracing::info!(
        user_id = user.id,
        created_by = claims.sub,
        role = role.as_str(),
        ?entity_id,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            user: UserResponse::from(user),
            generated_password: generated,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/users/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<UserResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::User(id)).await?;

    let user = crate::repo::user::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))?;
    Ok(Json(UserResponse::from(user)))
}

// ---------------------------------------------------------------------------
// PUT /api/users/{id}
// ---------------------------------------------------------------------------

/// Update profile and contact fields.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::User(id)).await?;
    body.validate_request()?;

    let user = crate::repo::user::update_profile(&pool, id, &body)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))?;
    Ok(Json(UserResponse::from(user)))
}

// ---------------------------------------------------------------------------
// DELETE /api/users/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "User still owns records", body = AppError)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if id == claims.sub {
        return Err(AppError::forbidden("You cannot delete your own account"));
    }
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::User(id)).await?;

    let deleted = crate::repo::user::delete(&pool, id).await?;
    if deleted {
        tracing::info!(user_id = id, deleted_by = claims.sub, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("User {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// PUT /api/users/{id}/role
// ---------------------------------------------------------------------------

/// Change a user's role and entity (master only).
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = i64, Path, description = "User ID")),
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "users"
)]
pub async fn set_user_role(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(claims): RoleRequired<MASTER>,
    Path(id): Path<i64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if id == claims.sub {
        return Err(AppError::forbidden("You cannot change your own role"));
    }
    if body.role.requires_entity() && body.entity_id.is_none() {
        return Err(AppError::invalid_field(
            "entity_id",
            format!("{} accounts must belong to an entity", body.role.label()),
        ));
    }
    if let Some(entity_id) = body.entity_id {
        ensure_entity_exists(&pool, entity_id).await?;
    }

    let user = crate::repo::user::set_role(&pool, id, body.role, body.entity_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))?;

    tracing::info!(user_id = id, role = body.role.as_str(), entity_id = ?body.entity_id, "User role changed");
    Ok(Json(UserResponse::from(user)))
}

// ---------------------------------------------------------------------------
// PUT /api/users/{id}/active
// ---------------------------------------------------------------------------

/// Activate or deactivate an account. Deactivation signs the user out.
#[utoipa::path(
    put,
    path = "/api/users/{id}/active",
    params(("id" = i64, Path, description = "User ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Status updated", body = UserResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "users"
)]
pub async fn set_user_active(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if id == claims.sub {
        return Err(AppError::forbidden("You cannot change the status of your own account"));
    }
    access::authorize(&pool, &Actor::from(&claims), Action::UpdateStatus, Resource::User(id)).await?;

    let user = crate::repo::user::set_active(&pool, id, body.active)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))?;
    if !body.active {
        crate::repo::refresh_token::revoke_all_for_user(&pool, id).await?;
    }

    tracing::info!(user_id = id, active = body.active, "User status changed");
    Ok(Json(UserResponse::from(user)))
}

// ---------------------------------------------------------------------------
// POST /api/users/{id}/reset-password
// ---------------------------------------------------------------------------

/// Replace a user's password with a generated one, returned once.
#[utoipa::path(
    post,
    path = "/api/users/{id}/reset-password",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "Password reset", body = PasswordResetResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "users"
)]
pub async fn reset_password(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(claims): RoleRequired<HEAD>,
    Path(id): Path<i64>,
) -> Result<Json<PasswordResetResponse>, AppError> {
    if id == claims.sub {
        return Err(AppError::forbidden("Use the change password endpoint for your own account"));
    }
    access::authorize(&pool, &Actor::from(&claims), Action::UpdateStatus, Resource::User(id)).await?;

    let user = crate::repo::user::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))?;

    let password = generate_password();
    let hash = hash_or_internal(&password)?;
    crate::repo::user::set_password_hash(&pool, id, &hash).await?;
    crate::repo::refresh_token::revoke_all_for_user(&pool, id).await?;

    tracing::info!(user_id = id, reset_by = claims.sub, "Password reset");
    Ok(Json(PasswordResetResponse {
        username: user.username,
        password,
    }))
}
