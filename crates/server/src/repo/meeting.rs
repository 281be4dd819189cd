use chrono::{DateTime, Utc};
use shared_types::{AppError, Meeting, MeetingParticipant, MeetingRequest, MeetingStatus};
use sqlx::{PgConnection, Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

/// Insert a meeting and its initial participants in one transaction.
pub async fn create(
    pool: &Pool<Postgres>,
    organizer_id: i64,
    req: &MeetingRequest,
) -> Result<Meeting, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let meeting = sqlx::query_as::<_, Meeting>(
        r#"
        INSERT INTO meetings
            (title, description, location, meeting_url, starts_at, ends_at,
             subject_id, organizer_id, minutes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, title, description, location, meeting_url, starts_at, ends_at,
                  status, subject_id, organizer_id, minutes, created_at, updated_at
        "#,
    )
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(&req.location)
    .bind(&req.meeting_url)
    .bind(req.starts_at)
    .bind(req.ends_at)
    .bind(req.subject_id)
    .bind(organizer_id)
    .bind(&req.minutes)
    .fetch_one(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    insert_participants(&mut tx, meeting.id, &req.participant_ids).await?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(meeting)
}

async fn insert_participants(
    conn: &mut PgConnection,
    meeting_id: i64,
    user_ids: &[i64],
) -> Result<(), AppError> {
    if user_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO meeting_participants (meeting_id, user_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(meeting_id)
    .bind(user_ids)
    .execute(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<Meeting>, AppError> {
    let row = sqlx::query_as::<_, Meeting>(
        r#"
        SELECT id, title, description, location, meeting_url, starts_at, ends_at,
               status, subject_id, organizer_id, minutes, created_at, updated_at
        FROM meetings
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Participants with display names, ordered by name.
pub async fn list_participants(
    pool: &Pool<Postgres>,
    meeting_id: i64,
) -> Result<Vec<MeetingParticipant>, AppError> {
    let rows = sqlx::query_as::<_, MeetingParticipant>(
        r#"
        SELECT p.user_id, u.display_name, p.attended
        FROM meeting_participants p
        JOIN users u ON u.id = p.user_id
        WHERE p.meeting_id = $1
        ORDER BY u.display_name, p.user_id
        "#,
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}

/// Participants marked as having attended.
pub async fn attendee_ids(pool: &Pool<Postgres>, meeting_id: i64) -> Result<Vec<i64>, AppError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT user_id FROM meeting_participants WHERE meeting_id = $1 AND attended IS TRUE ORDER BY user_id",
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Search meetings visible to a viewer.
///
/// With both `entity_id` and `viewer_id` unset every meeting matches.
/// Otherwise a meeting matches when its organizer belongs to `entity_id`, or
/// `viewer_id` organizes or participates in it.
pub async fn search(
    pool: &Pool<Postgres>,
    entity_id: Option<i64>,
    viewer_id: Option<i64>,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
    status: Option<&str>,
    subject_id: Option<i64>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Meeting>, i64), AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM meetings m
        JOIN users o ON o.id = m.organizer_id
        WHERE (($1::BIGINT IS NULL AND $2::BIGINT IS NULL)
               OR o.entity_id = $1
               OR m.organizer_id = $2
               OR EXISTS (SELECT 1 FROM meeting_participants p
                          WHERE p.meeting_id = m.id AND p.user_id = $2))
          AND ($3::TIMESTAMPTZ IS NULL OR m.starts_at >= $3)
          AND ($4::TIMESTAMPTZ IS NULL OR m.starts_at <= $4)
          AND ($5::TEXT IS NULL OR m.status = $5)
          AND ($6::BIGINT IS NULL OR m.subject_id = $6)
        "#,
    )
    .bind(entity_id)
    .bind(viewer_id)
    .bind(from)
    .bind(to)
    .bind(status)
    .bind(subject_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, Meeting>(
        r#"
        SELECT m.id, m.title, m.description, m.location, m.meeting_url, m.starts_at, m.ends_at,
               m.status, m.subject_id, m.organizer_id, m.minutes, m.created_at, m.updated_at
        FROM meetings m
        JOIN users o ON o.id = m.organizer_id
        WHERE (($1::BIGINT IS NULL AND $2::BIGINT IS NULL)
               OR o.entity_id = $1
               OR m.organizer_id = $2
               OR EXISTS (SELECT 1 FROM meeting_participants p
                          WHERE p.meeting_id = m.id AND p.user_id = $2))
          AND ($3::TIMESTAMPTZ IS NULL OR m.starts_at >= $3)
          AND ($4::TIMESTAMPTZ IS NULL OR m.starts_at <= $4)
          AND ($5::TEXT IS NULL OR m.status = $5)
          AND ($6::BIGINT IS NULL OR m.subject_id = $6)
        ORDER BY m.starts_at, m.id
        LIMIT $7 OFFSET $8
        "#,
    )
    .bind(entity_id)
    .bind(viewer_id)
    .bind(from)
    .bind(to)
    .bind(status)
    .bind(subject_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// Replace the editable fields. Status and participants are managed separately.
pub async fn update(
    pool: &Pool<Postgres>,
    id: i64,
    req: &MeetingRequest,
) -> Result<Option<Meeting>, AppError> {
    let row = sqlx::query_as::<_, Meeting>(
        r#"
        UPDATE meetings SET
            title = $2,
            description = $3,
            location = $4,
            meeting_url = $5,
            starts_at = $6,
            ends_at = $7,
            subject_id = $8,
            minutes = $9,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, title, description, location, meeting_url, starts_at, ends_at,
                  status, subject_id, organizer_id, minutes, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(&req.location)
    .bind(&req.meeting_url)
    .bind(req.starts_at)
    .bind(req.ends_at)
    .bind(req.subject_id)
    .bind(&req.minutes)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Replace the participant set. Attendance of users that stay is kept.
pub async fn set_participants(
    pool: &Pool<Postgres>,
    meeting_id: i64,
    user_ids: &[i64],
) -> Result<(), AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    sqlx::query("DELETE FROM meeting_participants WHERE meeting_id = $1 AND NOT (user_id = ANY($2))")
        .bind(meeting_id)
        .bind(user_ids)
        .execute(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    insert_participants(&mut tx, meeting_id, user_ids).await?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Record attendance. Returns false when the user is not a participant.
pub async fn set_attendance(
    pool: &Pool<Postgres>,
    meeting_id: i64,
    user_id: i64,
    attended: bool,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE meeting_participants SET attended = $3 WHERE meeting_id = $1 AND user_id = $2",
    )
    .bind(meeting_id)
    .bind(user_id)
    .bind(attended)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}

/// Move a meeting to `next` if it is still in `current`.
///
/// Returns None when the row changed status concurrently.
pub async fn transition_status(
    pool: &Pool<Postgres>,
    id: i64,
    current: MeetingStatus,
    next: MeetingStatus,
) -> Result<Option<Meeting>, AppError> {
    let row = sqlx::query_as::<_, Meeting>(
        r#"
        UPDATE meetings SET status = $3, updated_at = NOW()
        WHERE id = $1 AND status = $2
        RETURNING id, title, description, location, meeting_url, starts_at, ends_at,
                  status, subject_id, organizer_id, minutes, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(current.as_str())
    .bind(next.as_str())
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn delete(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM meetings WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}
