use axum::{extract::State, Json};
use sqlx::{Pool, Postgres};

use shared_types::{
    AppError, AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, RefreshRequest,
    User, UserResponse,
};

use crate::auth::extractors::AuthRequired;
use crate::auth::jwt::{self, TokenSubject};
use crate::auth::password::{hash_password, verify_password};
use crate::error_convert::ValidateRequest;

/// Mint an access/refresh pair for `user` and persist the refresh hash.
async fn issue_tokens(pool: &Pool<Postgres>, user: User) -> Result<AuthResponse, AppError> {
    let subject = TokenSubject::from(&user);
    let access_token = jwt::create_access_token(&subject)
        .map_err(|e| AppError::internal(format!("Token creation failed: {}", e)))?;
    let (refresh_token, expires_at) = jwt::create_refresh_token(&subject)
        .map_err(|e| AppError::internal(format!("Token creation failed: {}", e)))?;

    crate::repo::refresh_token::store(pool, user.id, &jwt::hash_token(&refresh_token), expires_at)
        .await?;

    Ok(AuthResponse {
        user: UserResponse::from(user),
        access_token,
        refresh_token,
    })
}

// ---------------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------------

/// Log in with username or email.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = AppError),
        (status = 403, description = "Account deactivated", body = AppError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(pool): State<Pool<Postgres>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::unauthorized("Invalid login or password");

    let user = crate::repo::user::find_by_login(&pool, body.login.trim())
        .await?
        .ok_or_else(invalid)?;
    let hash = crate::repo::user::password_hash(&pool, user.id)
        .await?
        .ok_or_else(invalid)?;

    let valid = verify_password(&body.password, &hash).map_err(|e| AppError::internal(e.to_string()))?;
    if !valid {
        tracing::debug!(user_id = user.id, "Login rejected: wrong password");
        return Err(invalid());
    }
    if !user.active {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    let user = crate::auth::maybe_promote_master(&pool, user).await;
    tracing::info!(user_id = user.id, role = %user.role, "User logged in");
    issue_tokens(&pool, user).await.map(Json)
}

// ---------------------------------------------------------------------------
// POST /api/auth/refresh
// ---------------------------------------------------------------------------

/// Exchange a refresh token for a new token pair. The old refresh token is
/// revoked.
#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = AuthResponse),
        (status = 401, description = "Invalid or revoked refresh token", body = AppError)
    ),
    tag = "auth"
)]
pub async fn refresh(
    State(pool): State<Pool<Postgres>>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let invalid = || AppError::unauthorized("Invalid or expired refresh token");

    let claims = jwt::validate_refresh_token(&body.refresh_token).map_err(|_| invalid())?;
    let user_id = crate::repo::refresh_token::consume(&pool, &jwt::hash_token(&body.refresh_token))
        .await?
        .ok_or_else(invalid)?;
    if user_id != claims.sub {
        return Err(invalid());
    }

    let user = crate::repo::user::find_by_id(&pool, user_id)
        .await?
        .ok_or_else(invalid)?;
    if !user.active {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    issue_tokens(&pool, user).await.map(Json)
}

// ---------------------------------------------------------------------------
// POST /api/auth/logout
// ---------------------------------------------------------------------------

/// Revoke every refresh token of the caller.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "auth"
)]
pub async fn logout(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
) -> Result<Json<MessageResponse>, AppError> {
    let revoked = crate::repo::refresh_token::revoke_all_for_user(&pool, claims.sub).await?;
    tracing::info!(user_id = claims.sub, revoked, "User logged out");
    Ok(Json(MessageResponse::new("Logged out")))
}

// ---------------------------------------------------------------------------
// GET /api/auth/me
// ---------------------------------------------------------------------------

/// Profile of the authenticated user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated", body = AppError)
    ),
    tag = "auth"
)]
pub async fn me(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
) -> Result<Json<UserResponse>, AppError> {
    let user = crate::repo::user::find_by_id(&pool, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;
    Ok(Json(UserResponse::from(user)))
}

// ---------------------------------------------------------------------------
// PUT /api/auth/password
// ---------------------------------------------------------------------------

/// Change the caller's password. All sessions are signed out.
#[utoipa::path(
    put,
    path = "/api/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid request", body = AppError),
        (status = 401, description = "Current password is wrong", body = AppError)
    ),
    tag = "auth"
)]
pub async fn change_password(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    body.validate_request()?;

    let hash = crate::repo::user::password_hash(&pool, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthorized("Account no longer exists"))?;
    let valid = verify_password(&body.current_password, &hash)
        .map_err(|e| AppError::internal(e.to_string()))?;
    if !valid {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    let new_hash = hash_password(&body.new_password)
        .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;
    crate::repo::user::set_password_hash(&pool, claims.sub, &new_hash).await?;
    crate::repo::refresh_token::revoke_all_for_user(&pool, claims.sub).await?;

    tracing::info!(user_id = claims.sub, "Password changed");
    Ok(Json(MessageResponse::new("Password changed")))
}
