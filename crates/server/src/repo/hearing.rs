use shared_types::{AppError, HearingRequest, HearingStatus, PublicHearing};
use sqlx::{Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

pub async fn create(
    pool: &Pool<Postgres>,
    entity_id: i64,
    created_by: i64,
    req: &HearingRequest,
) -> Result<PublicHearing, AppError> {
    let row = sqlx::query_as::<_, PublicHearing>(
        r#"
        INSERT INTO public_hearings
            (entity_id, title, description, location, scheduled_at, created_by)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, entity_id, title, description, location, scheduled_at, status,
                  attendance_count, summary, created_by, created_at, updated_at
        "#,
    )
    .bind(entity_id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(&req.location)
    .bind(req.scheduled_at)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<PublicHearing>, AppError> {
    let row = sqlx::query_as::<_, PublicHearing>(
        r#"
        SELECT id, entity_id, title, description, location, scheduled_at, status,
               attendance_count, summary, created_by, created_at, updated_at
        FROM public_hearings
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Search hearings. Hearings are public, so there is no scope filter.
/// `upcoming` keeps scheduled hearings from now on, soonest first.
pub async fn search(
    pool: &Pool<Postgres>,
    entity_id: Option<i64>,
    status: Option<&str>,
    upcoming: bool,
    offset: i64,
    limit: i64,
) -> Result<(Vec<PublicHearing>, i64), AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM public_hearings
        WHERE ($1::BIGINT IS NULL OR entity_id = $1)
          AND ($2::TEXT IS NULL OR status = $2)
          AND (NOT $3 OR (status = 'scheduled' AND scheduled_at >= NOW()))
        "#,
    )
    .bind(entity_id)
    .bind(status)
    .bind(upcoming)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, PublicHearing>(
        r#"
        SELECT id, entity_id, title, description, location, scheduled_at, status,
               attendance_count, summary, created_by, created_at, updated_at
        FROM public_hearings
        WHERE ($1::BIGINT IS NULL OR entity_id = $1)
          AND ($2::TEXT IS NULL OR status = $2)
          AND (NOT $3 OR (status = 'scheduled' AND scheduled_at >= NOW()))
        ORDER BY
            CASE WHEN $3 THEN scheduled_at END ASC,
            CASE WHEN NOT $3 THEN scheduled_at END DESC,
            id
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(entity_id)
    .bind(status)
    .bind(upcoming)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// Replace the editable fields of a scheduled hearing. Returns None when the
/// hearing does not exist or already left the scheduled state.
pub async fn update_scheduled(
    pool: &Pool<Postgres>,
    id: i64,
    req: &HearingRequest,
) -> Result<Option<PublicHearing>, AppError> {
    let row = sqlx::query_as::<_, PublicHearing>(
        r#"
        UPDATE public_hearings SET
            title = $2,
            description = $3,
            location = $4,
            scheduled_at = $5,
            updated_at = NOW()
        WHERE id = $1 AND status = 'scheduled'
        RETURNING id, entity_id, title, description, location, scheduled_at, status,
                  attendance_count, summary, created_by, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(&req.location)
    .bind(req.scheduled_at)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Close a scheduled hearing as `held` or `cancelled`.
///
/// Attendance and summary are only written for `held`. Returns None when
/// the hearing is no longer scheduled.
pub async fn close(
    pool: &Pool<Postgres>,
    id: i64,
    status: HearingStatus,
    attendance_count: Option<i32>,
    summary: Option<&str>,
) -> Result<Option<PublicHearing>, AppError> {
    let row = sqlx::query_as::<_, PublicHearing>(
        r#"
        UPDATE public_hearings SET
            status = $2,
            attendance_count = $3,
            summary = $4,
            updated_at = NOW()
        WHERE id = $1 AND status = 'scheduled'
        RETURNING id, entity_id, title, description, location, scheduled_at, status,
                  attendance_count, summary, created_by, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .bind(attendance_count)
    .bind(summary)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn delete(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM public_hearings WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}
