use shared_types::{ActivityCounters, AppError, Badge, BadgeRequest, LeaderboardEntry, UserBadge};
use sqlx::{Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

pub async fn list(pool: &Pool<Postgres>) -> Result<Vec<Badge>, AppError> {
    let rows = sqlx::query_as::<_, Badge>(
        r#"
        SELECT id, code, name, description, icon, criterion, threshold, created_at
        FROM achievements
        ORDER BY criterion, threshold, id
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<Badge>, AppError> {
    let row = sqlx::query_as::<_, Badge>(
        r#"
        SELECT id, code, name, description, icon, criterion, threshold, created_at
        FROM achievements
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn create(pool: &Pool<Postgres>, req: &BadgeRequest) -> Result<Badge, AppError> {
    let row = sqlx::query_as::<_, Badge>(
        r#"
        INSERT INTO achievements (code, name, description, icon, criterion, threshold)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, code, name, description, icon, criterion, threshold, created_at
        "#,
    )
    .bind(req.code.trim())
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.icon)
    .bind(req.criterion.as_str())
    .bind(req.threshold)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn update(
    pool: &Pool<Postgres>,
    id: i64,
    req: &BadgeRequest,
) -> Result<Option<Badge>, AppError> {
    let row = sqlx::query_as::<_, Badge>(
        r#"
        UPDATE achievements SET
            code = $2,
            name = $3,
            description = $4,
            icon = $5,
            criterion = $6,
            threshold = $7
        WHERE id = $1
        RETURNING id, code, name, description, icon, criterion, threshold, created_at
        "#,
    )
    .bind(id)
    .bind(req.code.trim())
    .bind(req.name.trim())
    .bind(&req.description)
    .bind(&req.icon)
    .bind(req.criterion.as_str())
    .bind(req.threshold)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn delete(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM achievements WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}

/// Activity counters of a user. Hearings count only for entity heads, as the
/// hearings held by their entity.
pub async fn counters(pool: &Pool<Postgres>, user_id: i64) -> Result<ActivityCounters, AppError> {
    let (tasks_completed, meetings_attended, communications_sent, hearings_held) =
        sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM tasks
                    WHERE assigned_to = u.id AND status = 'completed'),
                (SELECT COUNT(*) FROM meeting_participants
                    WHERE user_id = u.id AND attended IS TRUE),
                (SELECT COUNT(*) FROM communications
                    WHERE sender_id = u.id AND status NOT IN ('draft', 'sending')),
                CASE WHEN u.role = 'entity_head' THEN
                    (SELECT COUNT(*) FROM public_hearings
                        WHERE entity_id = u.entity_id AND status = 'held')
                ELSE 0 END
            FROM users u
            WHERE u.id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?
        .unwrap_or_default();

    Ok(ActivityCounters {
        tasks_completed,
        meetings_attended,
        communications_sent,
        hearings_held,
    })
}

/// Badges held by a user, in award order.
pub async fn user_badges(pool: &Pool<Postgres>, user_id: i64) -> Result<Vec<UserBadge>, AppError> {
    let rows = sqlx::query_as::<_, UserBadge>(
        r#"
        SELECT a.id AS badge_id, a.code, a.name, a.icon, ua.awarded_at
        FROM user_achievements ua
        JOIN achievements a ON a.id = ua.achievement_id
        WHERE ua.user_id = $1
        ORDER BY ua.awarded_at, a.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}

/// Award badges. Already held badges are ignored; returns the IDs that
/// were newly awarded.
pub async fn award(
    pool: &Pool<Postgres>,
    user_id: i64,
    badge_ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    if badge_ids.is_empty() {
        return Ok(Vec::new());
    }
    sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO user_achievements (user_id, achievement_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        RETURNING achievement_id
        "#,
    )
    .bind(user_id)
    .bind(badge_ids)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Evaluate every badge for a user and award the newly earned ones.
pub async fn evaluate(pool: &Pool<Postgres>, user_id: i64) -> Result<Vec<Badge>, AppError> {
    let counters = counters(pool, user_id).await?;
    let badges = list(pool).await?;

    let earned: Vec<i64> = badges
        .iter()
        .filter(|b| b.is_earned_by(&counters))
        .map(|b| b.id)
        .collect();
    let awarded = award(pool, user_id, &earned).await?;

    if !awarded.is_empty() {
        tracing::info!(user_id, count = awarded.len(), "Badges awarded");
    }

    Ok(badges.into_iter().filter(|b| awarded.contains(&b.id)).collect())
}

/// Top users by badge count. `entity_id` restricts to one entity.
pub async fn leaderboard(
    pool: &Pool<Postgres>,
    entity_id: Option<i64>,
    limit: i64,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    let rows = sqlx::query_as::<_, LeaderboardEntry>(
        r#"
        SELECT u.id AS user_id, u.display_name, u.entity_id, COUNT(*) AS badge_count
        FROM user_achievements ua
        JOIN users u ON u.id = ua.user_id
        WHERE u.active AND ($1::BIGINT IS NULL OR u.entity_id = $1)
        GROUP BY u.id, u.display_name, u.entity_id
        ORDER BY badge_count DESC, MIN(ua.awarded_at), u.id
        LIMIT $2
        "#,
    )
    .bind(entity_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}
