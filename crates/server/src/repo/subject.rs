use shared_types::{AppError, Subject, SubjectRequest};
use sqlx::{Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

pub async fn create(
    pool: &Pool<Postgres>,
    created_by: i64,
    req: &SubjectRequest,
) -> Result<Subject, AppError> {
    let row = sqlx::query_as::<_, Subject>(
        r#"
        INSERT INTO subjects (name, description, color, created_by)
        VALUES ($1, $2, $3, $4)
        RETURNING id, name, description, color, created_by, created_at, updated_at
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.color)
    .bind(created_by)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<Subject>, AppError> {
    let row = sqlx::query_as::<_, Subject>(
        r#"
        SELECT id, name, description, color, created_by, created_at, updated_at
        FROM subjects
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Whether a subject exists.
pub async fn exists(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM subjects WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Search subjects by name. Returns (subjects, total_count).
pub async fn search(
    pool: &Pool<Postgres>,
    q: Option<&str>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Subject>, i64), AppError> {
    let search_pattern = q.map(|s| format!("%{}%", s.trim()));

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM subjects WHERE ($1::TEXT IS NULL OR name ILIKE $1)",
    )
    .bind(&search_pattern)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, Subject>(
        r#"
        SELECT id, name, description, color, created_by, created_at, updated_at
        FROM subjects
        WHERE ($1::TEXT IS NULL OR name ILIKE $1)
        ORDER BY name, id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&search_pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

pub async fn update(
    pool: &Pool<Postgres>,
    id: i64,
    req: &SubjectRequest,
) -> Result<Option<Subject>, AppError> {
    let row = sqlx::query_as::<_, Subject>(
        r#"
        UPDATE subjects SET
            name = $2,
            description = $3,
            color = $4,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, description, color, created_by, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.color)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Delete a subject. Linked tasks and meetings are detached by the schema.
pub async fn delete(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM subjects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}
