pub mod achievement;
pub mod auth;
pub mod communication;
pub mod config;
pub mod dashboard;
pub mod entity;
pub mod hearing;
pub mod import;
pub mod meeting;
pub mod notification;
pub mod subject;
pub mod task;
pub mod user;

use axum::{routing::{delete, get, patch, post, put}, Router};
use crate::db::AppState;

/// Build the REST API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Auth
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/password", put(auth::change_password))
        // Entities
        .route("/api/entities", get(entity::list_entities).post(entity::create_entity))
        .route(
            "/api/entities/{id}",
            get(entity::get_entity).put(entity::update_entity).delete(entity::delete_entity),
        )
        .route("/api/entities/{id}/users", get(entity::list_entity_users))
        .route("/api/entities/{id}/stats", get(entity::entity_stats))
        // Users
        .route("/api/users", get(user::list_users).post(user::create_user))
        .route(
            "/api/users/{id}",
            get(user::get_user).put(user::update_user).delete(user::delete_user),
        )
        .route("/api/users/{id}/role", put(user::set_user_role))
        .route("/api/users/{id}/active", put(user::set_user_active))
        .route("/api/users/{id}/reset-password", post(user::reset_password))
        .route("/api/users/{id}/achievements", get(achievement::user_achievements))
        .route("/api/users/{id}/achievements/evaluate", post(achievement::evaluate_user))
        // Subjects
        .route("/api/subjects", get(subject::list_subjects).post(subject::create_subject))
        .route(
            "/api/subjects/{id}",
            get(subject::get_subject).put(subject::update_subject).delete(subject::delete_subject),
        )
        .route("/api/subjects/{id}/tasks", get(subject::list_subject_tasks))
        .route("/api/subjects/{id}/meetings", get(subject::list_subject_meetings))
        // Meetings
        .route("/api/meetings", get(meeting::list_meetings).post(meeting::create_meeting))
        .route(
            "/api/meetings/{id}",
            get(meeting::get_meeting).put(meeting::update_meeting).delete(meeting::delete_meeting),
        )
        .route("/api/meetings/{id}/participants", put(meeting::set_participants))
        .route("/api/meetings/{id}/attendance", post(meeting::record_attendance))
        .route("/api/meetings/{id}/status", patch(meeting::update_meeting_status))
        .route("/api/meetings/{id}/notify", post(meeting::notify_participants))
        // Tasks
        .route("/api/tasks", get(task::list_tasks).post(task::create_task))
        .route(
            "/api/tasks/{id}",
            get(task::get_task).put(task::update_task).delete(task::delete_task),
        )
        .route("/api/tasks/{id}/status", patch(task::update_task_status))
        // Communications
        .route(
            "/api/communications",
            get(communication::list_communications).post(communication::create_communication),
        )
        .route(
            "/api/communications/{id}",
            get(communication::get_communication)
                .put(communication::update_communication)
                .delete(communication::delete_communication),
        )
        .route("/api/communications/{id}/send", post(communication::send_communication))
        .route("/api/communications/{id}/read", post(communication::mark_communication_read))
        .route(
            "/api/communications/{id}/attachments",
            get(communication::list_attachments).post(communication::create_attachment),
        )
        .route(
            "/api/communications/{id}/attachments/{attachment_id}",
            delete(communication::delete_attachment),
        )
        .route(
            "/api/communications/{id}/attachments/{attachment_id}/finalize",
            post(communication::finalize_attachment),
        )
        .route(
            "/api/communications/{id}/attachments/{attachment_id}/download",
            get(communication::download_attachment),
        )
        // Notifications
        .route("/api/notifications", get(notification::list_notifications))
        .route("/api/notifications/read-all", post(notification::mark_all_notifications_read))
        .route("/api/notifications/{id}/read", post(notification::mark_notification_read))
        // CSV import
        .route("/api/import/entities", post(import::import_entities))
        .route("/api/import/entities/{id}/users", post(import::import_users))
        // Public hearings
        .route("/api/hearings", get(hearing::list_hearings).post(hearing::create_hearing))
        .route(
            "/api/hearings/{id}",
            get(hearing::get_hearing).put(hearing::update_hearing).delete(hearing::delete_hearing),
        )
        .route("/api/hearings/{id}/hold", post(hearing::hold_hearing))
        .route("/api/hearings/{id}/cancel", post(hearing::cancel_hearing))
        // Achievements
        .route("/api/achievements", get(achievement::list_badges).post(achievement::create_badge))
        .route("/api/achievements/leaderboard", get(achievement::leaderboard))
        .route(
            "/api/achievements/{id}",
            put(achievement::update_badge).delete(achievement::delete_badge),
        )
        // Dashboard and platform
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/config/features", get(config::get_features))
}

/// Build the REST API router with rate limiting applied.
pub fn api_router_with_rate_limit(
    rate_limit: crate::rate_limit::RateLimitState,
) -> Router<AppState> {
    api_router().layer(axum::middleware::from_fn_with_state(
        rate_limit,
        crate::rate_limit::rate_limit_middleware,
    ))
}
