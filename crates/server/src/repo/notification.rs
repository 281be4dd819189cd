use shared_types::{AppError, Notification};
use sqlx::{Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

/// Create the same notification for every user in `user_ids`.
pub async fn create_many(
    pool: &Pool<Postgres>,
    user_ids: &[i64],
    communication_id: Option<i64>,
    title: &str,
    body: &str,
) -> Result<u64, AppError> {
    if user_ids.is_empty() {
        return Ok(0);
    }
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (user_id, communication_id, title, body)
        SELECT UNNEST($1::BIGINT[]), $2, $3, $4
        "#,
    )
    .bind(user_ids)
    .bind(communication_id)
    .bind(title)
    .bind(body)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected())
}

/// The user's notifications, newest first. Returns (notifications, total_count).
pub async fn list_for_user(
    pool: &Pool<Postgres>,
    user_id: i64,
    unread_only: bool,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Notification>, i64), AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)",
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, communication_id, title, body, read_at, created_at
        FROM notifications
        WHERE user_id = $1 AND (NOT $2 OR read_at IS NULL)
        ORDER BY created_at DESC, id DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// Mark one of the user's notifications as read. Returns None when it does
/// not exist or belongs to someone else.
pub async fn mark_read(
    pool: &Pool<Postgres>,
    id: i64,
    user_id: i64,
) -> Result<Option<Notification>, AppError> {
    let row = sqlx::query_as::<_, Notification>(
        r#"
        UPDATE notifications SET read_at = COALESCE(read_at, NOW())
        WHERE id = $1 AND user_id = $2
        RETURNING id, user_id, communication_id, title, body, read_at, created_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Mark all of the user's notifications as read. Returns how many changed.
pub async fn mark_all_read(pool: &Pool<Postgres>, user_id: i64) -> Result<u64, AppError> {
    let result =
        sqlx::query("UPDATE notifications SET read_at = NOW() WHERE user_id = $1 AND read_at IS NULL")
            .bind(user_id)
            .execute(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected())
}

pub async fn unread_count(pool: &Pool<Postgres>, user_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND read_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
