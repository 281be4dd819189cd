use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    normalize_pagination, page_offset, AppError, MessageResponse, NotificationListParams,
    NotificationResponse, PaginatedResponse,
};

use crate::auth::extractors::AuthRequired;

// ---------------------------------------------------------------------------
// GET /api/notifications
// ---------------------------------------------------------------------------

/// The caller's own notifications, newest first.
#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationListParams),
    responses(
        (status = 200, description = "Notifications", body = PaginatedResponse<NotificationResponse>)
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Query(params): Query<NotificationListParams>,
) -> Result<Json<PaginatedResponse<NotificationResponse>>, AppError> {
    let (page, limit) = normalize_pagination(params.page, params.limit);
    let (rows, total) = crate::repo::notification::list_for_user(
        &pool,
        claims.sub,
        params.unread,
        page_offset(page, limit),
        limit,
    )
    .await?;

    let response = PaginatedResponse::new(rows, page, limit, total).map(NotificationResponse::from);
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/notifications/{id}/read
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    params(("id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = NotificationResponse),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "notifications"
)]
pub async fn mark_notification_read(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<NotificationResponse>, AppError> {
    // Other users' notifications are reported as missing.
    let notification = crate::repo::notification::mark_read(&pool, id, claims.sub)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Notification {} not found", id)))?;
    Ok(Json(NotificationResponse::from(notification)))
}

// ---------------------------------------------------------------------------
// POST /api/notifications/read-all
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "All notifications marked as read", body = MessageResponse)
    ),
    tag = "notifications"
)]
pub async fn mark_all_notifications_read(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
) -> Result<Json<MessageResponse>, AppError> {
    let updated = crate::repo::notification::mark_all_read(&pool, claims.sub).await?;
    Ok(Json(MessageResponse::new(format!(
        "{} notification(s) marked as read",
        updated
    ))))
}
