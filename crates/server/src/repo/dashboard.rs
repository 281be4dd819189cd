use shared_types::{AppError, DashboardStats};
use sqlx::{FromRow, Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

#[derive(FromRow)]
struct StatsRow {
    entities: i64,
    users: i64,
    open_tasks: i64,
    overdue_tasks: i64,
    tasks_completed_30d: i64,
    upcoming_meetings_7d: i64,
    communications_sent_30d: i64,
    upcoming_hearings: i64,
    unread_notifications: i64,
}

/// Dashboard counters as seen by one viewer.
///
/// `all` lifts every restriction. Otherwise counts are limited to the
/// viewer's entity (`viewer_entity`), to what heads oversee (`head_entity`)
/// and to rows the viewer owns or is assigned to.
pub async fn stats(
    pool: &Pool<Postgres>,
    all: bool,
    viewer_id: i64,
    viewer_entity: Option<i64>,
    head_entity: Option<i64>,
) -> Result<DashboardStats, AppError> {
    let row = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM entities
                WHERE $1 OR id = $3) AS entities,
            (SELECT COUNT(*) FROM users
                WHERE active AND ($1 OR entity_id = $4 OR id = $2)) AS users,
            (SELECT COUNT(*) FROM tasks
                WHERE status IN ('pending', 'in_progress')
                  AND ($1 OR entity_id = $4 OR assigned_to = $2 OR created_by = $2)) AS open_tasks,
            (SELECT COUNT(*) FROM tasks
                WHERE status IN ('pending', 'in_progress') AND due_date < CURRENT_DATE
                  AND ($1 OR entity_id = $4 OR assigned_to = $2 OR created_by = $2)) AS overdue_tasks,
            (SELECT COUNT(*) FROM tasks
                WHERE status = 'completed' AND completed_at >= NOW() - INTERVAL '30 days'
                  AND ($1 OR entity_id = $4 OR assigned_to = $2 OR created_by = $2)) AS tasks_completed_30d,
            (SELECT COUNT(*) FROM meetings m
                JOIN users o ON o.id = m.organizer_id
                WHERE m.status = 'scheduled'
                  AND m.starts_at >= NOW() AND m.starts_at < NOW() + INTERVAL '7 days'
                  AND ($1 OR o.entity_id = $4 OR m.organizer_id = $2
                       OR EXISTS (SELECT 1 FROM meeting_participants p
                                  WHERE p.meeting_id = m.id AND p.user_id = $2))) AS upcoming_meetings_7d,
            (SELECT COUNT(*) FROM communications c
                JOIN users s ON s.id = c.sender_id
                WHERE c.status <> 'draft' AND c.sent_at >= NOW() - INTERVAL '30 days'
                  AND ($1 OR s.entity_id = $4 OR c.sender_id = $2)) AS communications_sent_30d,
            (SELECT COUNT(*) FROM public_hearings
                WHERE status = 'scheduled' AND scheduled_at >= NOW()
                  AND ($1 OR entity_id = $3)) AS upcoming_hearings,
            (SELECT COUNT(*) FROM notifications
                WHERE user_id = $2 AND read_at IS NULL) AS unread_notifications
        "#,
    )
    .bind(all)
    .bind(viewer_id)
    .bind(viewer_entity)
    .bind(head_entity)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(DashboardStats {
        entities: row.entities,
        users: row.users,
        open_tasks: row.open_tasks,
        overdue_tasks: row.overdue_tasks,
        tasks_completed_30d: row.tasks_completed_30d,
        upcoming_meetings_7d: row.upcoming_meetings_7d,
        communications_sent_30d: row.communications_sent_30d,
        upcoming_hearings: row.upcoming_hearings,
        unread_notifications: row.unread_notifications,
    })
}
