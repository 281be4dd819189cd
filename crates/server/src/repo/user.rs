use shared_types::{AppError, UpdateUserRequest, User, UserRole};
use sqlx::{PgConnection, Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

/// Fields of a user row to insert. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: Option<&'a str>,
    pub password_hash: &'a str,
    pub display_name: &'a str,
    pub role: UserRole,
    pub entity_id: Option<i64>,
    pub phone: Option<&'a str>,
    pub whatsapp: Option<&'a str>,
    pub telegram_chat_id: Option<&'a str>,
}

/// Insert a new user.
pub async fn create(pool: &Pool<Postgres>, new: &NewUser<'_>) -> Result<User, AppError> {
    let mut conn = pool.acquire().await.map_err(SqlxErrorExt::into_app_error)?;
    insert(&mut conn, new).await
}

/// Insert on an existing connection (used inside import transactions).
pub async fn insert(conn: &mut PgConnection, new: &NewUser<'_>) -> Result<User, AppError> {
    let row = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (username, email, password_hash, display_name, role, entity_id,
             phone, whatsapp, telegram_chat_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id, username, email, display_name, role, entity_id,
                  phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        "#,
    )
    .bind(new.username)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.display_name)
    .bind(new.role.as_str())
    .bind(new.entity_id)
    .bind(new.phone)
    .bind(new.whatsapp)
    .bind(new.telegram_chat_id)
    .fetch_one(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Find a user by ID.
pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, display_name, role, entity_id,
               phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Find a user by username or email (case-insensitive).
pub async fn find_by_login(pool: &Pool<Postgres>, login: &str) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, display_name, role, entity_id,
               phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        FROM users
        WHERE LOWER(username) = LOWER($1) OR LOWER(email) = LOWER($1)
        ORDER BY (LOWER(username) = LOWER($1)) DESC
        LIMIT 1
        "#,
    )
    .bind(login.trim())
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Stored argon2 hash for a user.
pub async fn password_hash(pool: &Pool<Postgres>, id: i64) -> Result<Option<String>, AppError> {
    sqlx::query_scalar::<_, String>("SELECT password_hash FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Search users. `entity_id` / `user_id` are scope filters (NULL = no
/// restriction). Returns (users, total_count).
pub async fn search(
    pool: &Pool<Postgres>,
    entity_id: Option<i64>,
    user_id: Option<i64>,
    q: Option<&str>,
    role: Option<&str>,
    active: Option<bool>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<User>, i64), AppError> {
    let search_pattern = q.map(|s| format!("%{}%", s.trim()));

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM users
        WHERE ($1::BIGINT IS NULL OR entity_id = $1)
          AND ($2::BIGINT IS NULL OR id = $2)
          AND ($3::TEXT IS NULL OR display_name ILIKE $3 OR username ILIKE $3 OR email ILIKE $3)
          AND ($4::TEXT IS NULL OR role = $4)
          AND ($5::BOOLEAN IS NULL OR active = $5)
        "#,
    )
    .bind(entity_id)
    .bind(user_id)
    .bind(&search_pattern)
    .bind(role)
    .bind(active)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, display_name, role, entity_id,
               phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        FROM users
        WHERE ($1::BIGINT IS NULL OR entity_id = $1)
          AND ($2::BIGINT IS NULL OR id = $2)
          AND ($3::TEXT IS NULL OR display_name ILIKE $3 OR username ILIKE $3 OR email ILIKE $3)
          AND ($4::TEXT IS NULL OR role = $4)
          AND ($5::BOOLEAN IS NULL OR active = $5)
        ORDER BY display_name, id
        LIMIT $6 OFFSET $7
        "#,
    )
    .bind(entity_id)
    .bind(user_id)
    .bind(&search_pattern)
    .bind(role)
    .bind(active)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// All users of an entity, heads first.
pub async fn list_by_entity(pool: &Pool<Postgres>, entity_id: i64) -> Result<Vec<User>, AppError> {
    let rows = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, display_name, role, entity_id,
               phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        FROM users
        WHERE entity_id = $1
        ORDER BY (role = 'entity_head') DESC, display_name
        "#,
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}

/// IDs of the active users of an entity.
pub async fn active_ids_in_entity(pool: &Pool<Postgres>, entity_id: i64) -> Result<Vec<i64>, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE entity_id = $1 AND active ORDER BY id")
        .bind(entity_id)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// IDs of the heads of an entity.
pub async fn head_ids_in_entity(pool: &Pool<Postgres>, entity_id: i64) -> Result<Vec<i64>, AppError> {
    sqlx::query_scalar::<_, i64>(
        "SELECT id FROM users WHERE entity_id = $1 AND role = 'entity_head' ORDER BY id",
    )
    .bind(entity_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Users among `ids` that do not belong to `entity_id`.
pub async fn ids_outside_entity(
    pool: &Pool<Postgres>,
    ids: &[i64],
    entity_id: i64,
) -> Result<Vec<i64>, AppError> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT id FROM users
        WHERE id = ANY($1) AND (entity_id IS NULL OR entity_id <> $2)
        ORDER BY id
        "#,
    )
    .bind(ids)
    .bind(entity_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Which of `ids` exist.
pub async fn existing_ids(pool: &Pool<Postgres>, ids: &[i64]) -> Result<Vec<i64>, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = ANY($1) ORDER BY id")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// All usernames, for collision checks during import.
pub async fn all_usernames(conn: &mut PgConnection) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar::<_, String>("SELECT username FROM users")
        .fetch_all(conn)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Lowercased emails of all users, for duplicate detection during import.
pub async fn all_emails(conn: &mut PgConnection) -> Result<Vec<String>, AppError> {
    sqlx::query_scalar::<_, String>("SELECT LOWER(email) FROM users WHERE email IS NOT NULL")
        .fetch_all(conn)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Update profile and contact fields.
pub async fn update_profile(
    pool: &Pool<Postgres>,
    id: i64,
    req: &UpdateUserRequest,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET
            display_name = $2,
            email = $3,
            phone = $4,
            whatsapp = $5,
            telegram_chat_id = $6,
            updated_at = NOW()
        WHERE id = $1
        RETURNING id, username, email, display_name, role, entity_id,
                  phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.display_name.trim())
    .bind(&req.email)
    .bind(&req.phone)
    .bind(&req.whatsapp)
    .bind(&req.telegram_chat_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

/// Change role and entity together (the CHECK constraint ties them).
pub async fn set_role(
    pool: &Pool<Postgres>,
    id: i64,
    role: UserRole,
    entity_id: Option<i64>,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET role = $2, entity_id = $3, updated_at = NOW()
        WHERE id = $1
        RETURNING id, username, email, display_name, role, entity_id,
                  phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(role.as_str())
    .bind(entity_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn set_active(pool: &Pool<Postgres>, id: i64, active: bool) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, User>(
        r#"
        UPDATE users SET active = $2, updated_at = NOW()
        WHERE id = $1
        RETURNING id, username, email, display_name, role, entity_id,
                  phone, whatsapp, telegram_chat_id, active, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(active)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn set_password_hash(pool: &Pool<Postgres>, id: i64, hash: &str) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(id)
        .bind(hash)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}

/// Delete a user. Users that still own subjects, meetings, tasks,
/// communications or hearings cannot be deleted (409); deactivate them instead.
pub async fn delete(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
                AppError::conflict("User still owns records; deactivate the account instead")
            }
            _ => e.into_app_error(),
        })?;

    Ok(result.rows_affected() > 0)
}
