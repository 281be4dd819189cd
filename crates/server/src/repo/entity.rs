use shared_types::{AppError, Entity, EntityRequest, EntityStats};
use sqlx::{PgConnection, Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

/// Insert a new entity.
pub async fn create(pool: &Pool<Postgres>, req: &EntityRequest) -> Result<Entity, AppError> {
    let mut conn = pool.acquire().await.map_err(SqlxErrorExt::into_app_error)?;
    insert(&mut conn, req).await
}

/// Insert on an existing connection (used inside import transactions).
pub async fn insert(conn: &mut PgConnection, req: &EntityRequest) -> Result<Entity, AppError> {
    let row = sqlx::query_as::<_, Entity>(
        r#"
        INSERT INTO entities
            (name, acronym, entity_type, email, phone, whatsapp, telegram_chat_id,
             address, responsible_name, active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, name, acronym, entity_type, email, phone, whatsapp, telegram_chat_id,
                  address, responsible_name, active, created_at, updated_at
        "#,
    )
    .bind(req.name.trim())
    .bind(&req.acronym)
    .bind(req.entity_type.as_str())
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.whatsapp)
    .bind(&req.telegram_chat_id)
    .bind(&req.address)
    .bind(&req.responsible_name)
    .bind(req.active)
    .fetch_one(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Find an entity by ID.
pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<Entity>, AppError> {
    let row = sqlx::query_as::<_, Entity>(
        r#"
        SELECT id, name, acronym, entity_type, email, phone, whatsapp, telegram_chat_id,
               address, responsible_name, active, created_at, updated_at
        FROM entities
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Lowercased names of all entities, for duplicate detection during import.
pub async fn existing_names(conn: &mut PgConnection) -> Result<Vec<String>, AppError> {
    let rows = sqlx::query_scalar::<_, String>("SELECT LOWER(name) FROM entities")
        .fetch_all(conn)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}

/// Search entities. `only_id` restricts the result to a single entity
/// (non-master callers). Returns (entities, total_count).
pub async fn search(
    pool: &Pool<Postgres>,
    only_id: Option<i64>,
    q: Option<&str>,
    entity_type: Option<&str>,
    active: Option<bool>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Entity>, i64), AppError> {
    let search_pattern = q.map(|s| format!("%{}%", s.trim()));

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM entities
        WHERE ($1::BIGINT IS NULL OR id = $1)
          AND ($2::TEXT IS NULL OR name ILIKE $2 OR acronym ILIKE $2)
          AND ($3::TEXT IS NULL OR entity_type = $3)
          AND ($4::BOOLEAN IS NULL OR active = $4)
        "#,
    )
    .bind(only_id)
    .bind(&search_pattern)
    .bind(entity_type)
    .bind(active)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, Entity>(
        r#"
        SELECT id, name, acronym, entity_type, email, phone, whatsapp, telegram_chat_id,
               address, responsible_name, active, created_at, updated_at
        FROM entities
        WHERE ($1::BIGINT IS NULL OR id = $1)
          AND ($2::TEXT IS NULL OR name ILIKE $2 OR acronym ILIKE $2)
          AND ($3::TEXT IS NULL OR entity_type = $3)
          AND ($4::BOOLEAN IS NULL OR active = $4)
        ORDER BY name
        LIMIT $5 OFFSET $6
        "#,
    )
    .bind(only_id)
    .bind(&search_pattern)
    .bind(entity_type)
    .bind(active)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// Replace an entity's fields. Returns None if it does not exist.
pub async fn update(
    pool: &Pool<Postgres>,
    id: i64,
    req: &EntityRequest,
) -> Result<Option<Entity>, AppError> {
    let row = sqlx::query_as::<_, Entity>(
        r#"
        UPDATE entities SET
            name = $2,
            acronym = $3,
            entity_type = $4,
            email = $5,
            phone = $6,
            whatsapp = $7,
            telegram_chat_id = $8,
            address = $9,
            responsible_name = $10,
            active = $11,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, name, acronym, entity_type, email, phone, whatsapp, telegram_chat_id,
                  address, responsible_name, active, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.name.trim())
    .bind(&req.acronym)
    .bind(req.entity_type.as_str())
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.whatsapp)
    .bind(&req.telegram_chat_id)
    .bind(&req.address)
    .bind(&req.responsible_name)
    .bind(req.active)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Number of users attached to the entity.
pub async fn user_count(pool: &Pool<Postgres>, id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE entity_id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Delete an entity. Returns true if a row was actually deleted.
pub async fn delete(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM entities WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}

/// Per-entity counters.
pub async fn stats(pool: &Pool<Postgres>, id: i64) -> Result<EntityStats, AppError> {
    let (user_count, open_tasks, completed_tasks, scheduled_hearings, held_hearings) =
        sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE entity_id = $1),
                (SELECT COUNT(*) FROM tasks WHERE entity_id = $1
                    AND status IN ('pending', 'in_progress')),
                (SELECT COUNT(*) FROM tasks WHERE entity_id = $1 AND status = 'completed'),
                (SELECT COUNT(*) FROM public_hearings WHERE entity_id = $1 AND status = 'scheduled'),
                (SELECT COUNT(*) FROM public_hearings WHERE entity_id = $1 AND status = 'held')
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(EntityStats {
        entity_id: id,
        user_count,
        open_tasks,
        completed_tasks,
        scheduled_hearings,
        held_hearings,
    })
}
