use shared_types::{AppError, Task, TaskRequest, TaskStatus};
use sqlx::{Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

/// Insert a new task owned by `entity_id`.
pub async fn create(
    pool: &Pool<Postgres>,
    created_by: i64,
    entity_id: i64,
    req: &TaskRequest,
) -> Result<Task, AppError> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        INSERT INTO tasks
            (title, description, priority, due_date, entity_id, subject_id,
             meeting_id, assigned_to, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, title, description, status, priority, due_date, entity_id,
                  subject_id, meeting_id, assigned_to, created_by, completed_at,
                  created_at, updated_at
        "#,
    )
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.priority.as_str())
    .bind(req.due_date)
    .bind(entity_id)
    .bind(req.subject_id)
    .bind(req.meeting_id)
    .bind(req.assigned_to)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, title, description, status, priority, due_date, entity_id,
               subject_id, meeting_id, assigned_to, created_by, completed_at,
               created_at, updated_at
        FROM tasks
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Search tasks visible to a viewer.
///
/// `scope_entity` / `viewer_id` both unset means no restriction; otherwise a
/// task matches when it belongs to `scope_entity` or the viewer created it or
/// is its assignee. `overdue` keeps open tasks whose due date has passed.
pub async fn search(
    pool: &Pool<Postgres>,
    scope_entity: Option<i64>,
    viewer_id: Option<i64>,
    status: Option<&str>,
    priority: Option<&str>,
    entity_id: Option<i64>,
    subject_id: Option<i64>,
    assigned_to: Option<i64>,
    overdue: bool,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Task>, i64), AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM tasks
        WHERE (($1::BIGINT IS NULL AND $2::BIGINT IS NULL)
               OR entity_id = $1 OR assigned_to = $2 OR created_by = $2)
          AND ($3::TEXT IS NULL OR status = $3)
          AND ($4::TEXT IS NULL OR priority = $4)
          AND ($5::BIGINT IS NULL OR entity_id = $5)
          AND ($6::BIGINT IS NULL OR subject_id = $6)
          AND ($7::BIGINT IS NULL OR assigned_to = $7)
          AND (NOT $8 OR (status IN ('pending', 'in_progress') AND due_date < CURRENT_DATE))
        "#,
    )
    .bind(scope_entity)
    .bind(viewer_id)
    .bind(status)
    .bind(priority)
    .bind(entity_id)
    .bind(subject_id)
    .bind(assigned_to)
    .bind(overdue)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, title, description, status, priority, due_date, entity_id,
               subject_id, meeting_id, assigned_to, created_by, completed_at,
               created_at, updated_at
        FROM tasks
        WHERE (($1::BIGINT IS NULL AND $2::BIGINT IS NULL)
               OR entity_id = $1 OR assigned_to = $2 OR created_by = $2)
          AND ($3::TEXT IS NULL OR status = $3)
          AND ($4::TEXT IS NULL OR priority = $4)
          AND ($5::BIGINT IS NULL OR entity_id = $5)
          AND ($6::BIGINT IS NULL OR subject_id = $6)
          AND ($7::BIGINT IS NULL OR assigned_to = $7)
          AND (NOT $8 OR (status IN ('pending', 'in_progress') AND due_date < CURRENT_DATE))
        ORDER BY due_date ASC NULLS LAST, id
        LIMIT $9 OFFSET $10
        "#,
    )
    .bind(scope_entity)
    .bind(viewer_id)
    .bind(status)
    .bind(priority)
    .bind(entity_id)
    .bind(subject_id)
    .bind(assigned_to)
    .bind(overdue)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// Replace the editable fields. Status goes through [`set_status`].
pub async fn update(
    pool: &Pool<Postgres>,
    id: i64,
    entity_id: i64,
    req: &TaskRequest,
) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks SET
            title = $2,
            description = $3,
            priority = $4,
            due_date = $5,
            entity_id = $6,
            subject_id = $7,
            meeting_id = $8,
            assigned_to = $9,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, title, description, status, priority, due_date, entity_id,
                  subject_id, meeting_id, assigned_to, created_by, completed_at,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.title.trim())
    .bind(&req.description)
    .bind(req.priority.as_str())
    .bind(req.due_date)
    .bind(entity_id)
    .bind(req.subject_id)
    .bind(req.meeting_id)
    .bind(req.assigned_to)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Change the status. Entering `completed` stamps `completed_at` (kept when
/// already completed); any other status clears it.
pub async fn set_status(
    pool: &Pool<Postgres>,
    id: i64,
    status: TaskStatus,
) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, Task>(
        r#"
        UPDATE tasks SET
            status = $2,
            completed_at = CASE WHEN $2 = 'completed' THEN COALESCE(completed_at, NOW()) ELSE NULL END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, title, description, status, priority, due_date, entity_id,
                  subject_id, meeting_id, assigned_to, created_by, completed_at,
                  created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn delete(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}
