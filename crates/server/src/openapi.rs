use axum::Router;
use shared_types::{
    // Auth and users
    AppError, AppErrorKind, AuthResponse, ChangePasswordRequest, CreateUserRequest,
    CreatedUserResponse, LoginRequest, MessageResponse, PasswordResetResponse, RefreshRequest,
    SetActiveRequest, SetRoleRequest, UpdateUserRequest, UserResponse, UserRole,
    // Entities
    EntityRequest, EntityResponse, EntityStats, EntityType,
    // Subjects
    SubjectRequest, SubjectResponse,
    // Meetings
    AttendanceRequest, MeetingRequest, MeetingResponse, MeetingParticipant, MeetingStatus,
    SetParticipantsRequest, UpdateMeetingStatusRequest,
    // Tasks
    TaskPriority, TaskRequest, TaskResponse, TaskStatus, UpdateTaskStatusRequest,
    // Communications
    AttachmentResponse, Channel, CommunicationRequest, CommunicationResponse,
    CommunicationStatus, CreateAttachmentRequest, CreateAttachmentResponse, DeliveryStatus,
    DispatchSummary, DownloadUrlResponse, Mailbox, NotificationResponse, RecipientResponse,
    // Import
    GeneratedCredential, ImportReport, RowError,
    // Hearings
    HearingRequest, HearingResponse, HearingStatus, HoldHearingRequest,
    // Achievements
    ActivityCounters, BadgeRequest, BadgeResponse, Criterion, EvaluateResponse,
    LeaderboardEntry, UserAchievementsResponse, UserBadge,
    // Platform
    DashboardStats, FeatureFlags, PaginationMeta,
};
use sqlx::{Pool, Postgres};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::db::AppState;
use crate::health;
use crate::rest;

/// OpenAPI documentation for the API.
#[derive(OpenApi)]
#[openapi(
    paths(
        // Auth
        rest::auth::login,
        rest::auth::refresh,
        rest::auth::logout,
        rest::auth::me,
        rest::auth::change_password,
        // Entities
        rest::entity::list_entities,
        rest::entity::create_entity,
        rest::entity::get_entity,
        rest::entity::update_entity,
        rest::entity::delete_entity,
        rest::entity::list_entity_users,
        rest::entity::entity_stats,
        // Users
        rest::user::list_users,
        rest::user::create_user,
        rest::user::get_user,
        rest::user::update_user,
        rest::user::delete_user,
        rest::user::set_user_role,
        rest::user::set_user_active,
        rest::user::reset_password,
        // Subjects
        rest::subject::list_subjects,
        rest::subject::create_subject,
        rest::subject::get_subject,
        rest::subject::update_subject,
        rest::subject::delete_subject,
        rest::subject::list_subject_tasks,
        rest::subject::list_subject_meetings,
        // Meetings
        rest::meeting::list_meetings,
        rest::meeting::create_meeting,
        rest::meeting::get_meeting,
        rest::meeting::update_meeting,
        rest::meeting::delete_meeting,
        rest::meeting::set_participants,
        rest::meeting::record_attendance,
        rest::meeting::update_meeting_status,
        rest::meeting::notify_participants,
        // Tasks
        rest::task::list_tasks,
        rest::task::create_task,
        rest::task::get_task,
        rest::task::update_task,
        rest::task::delete_task,
        rest::task::update_task_status,
        // Communications
        rest::communication::list_communications,
        rest::communication::create_communication,
        rest::communication::get_communication,
        rest::communication::update_communication,
        rest::communication::delete_communication,
        rest::communication::send_communication,
        rest::communication::mark_communication_read,
        rest::communication::create_attachment,
        rest::communication::list_attachments,
        rest::communication::finalize_attachment,
        rest::communication::download_attachment,
        rest::communication::delete_attachment,
        // Notifications
        rest::notification::list_notifications,
        rest::notification::mark_notification_read,
        rest::notification::mark_all_notifications_read,
        // Import
        rest::import::import_entities,
        rest::import::import_users,
        // Hearings
        rest::hearing::list_hearings,
        rest::hearing::create_hearing,
        rest::hearing::get_hearing,
        rest::hearing::update_hearing,
        rest::hearing::delete_hearing,
        rest::hearing::hold_hearing,
        rest::hearing::cancel_hearing,
        // Achievements
        rest::achievement::list_badges,
        rest::achievement::create_badge,
        rest::achievement::update_badge,
        rest::achievement::delete_badge,
        rest::achievement::leaderboard,
        rest::achievement::user_achievements,
        rest::achievement::evaluate_user,
        // Dashboard and platform
        rest::dashboard::stats,
        rest::config::get_features,
        health::health_check,
    ),
    components(schemas(
        AppError, AppErrorKind, MessageResponse, PaginationMeta,
        AuthResponse, LoginRequest, RefreshRequest, ChangePasswordRequest,
        UserResponse, UserRole, CreateUserRequest, UpdateUserRequest, SetRoleRequest,
        SetActiveRequest, CreatedUserResponse, PasswordResetResponse,
        EntityRequest, EntityResponse, EntityStats, EntityType,
        SubjectRequest, SubjectResponse,
        MeetingRequest, MeetingResponse, MeetingParticipant, MeetingStatus,
        SetParticipantsRequest, AttendanceRequest, UpdateMeetingStatusRequest,
        TaskRequest, TaskResponse, TaskStatus, TaskPriority, UpdateTaskStatusRequest,
        CommunicationRequest, CommunicationResponse, CommunicationStatus, Channel,
        DeliveryStatus, Mailbox, RecipientResponse, AttachmentResponse, DispatchSummary,
        CreateAttachmentRequest, CreateAttachmentResponse, DownloadUrlResponse,
        NotificationResponse,
        ImportReport, RowError, GeneratedCredential,
        HearingRequest, HearingResponse, HearingStatus, HoldHearingRequest,
        BadgeRequest, BadgeResponse, Criterion, ActivityCounters, UserBadge,
        UserAchievementsResponse, EvaluateResponse, LeaderboardEntry,
        DashboardStats, FeatureFlags,
        health::HealthResponse,
    )),
    tags(
        (name = "auth", description = "Login, token refresh and password changes"),
        (name = "entities", description = "Public bodies taking part in the platform"),
        (name = "users", description = "User accounts and the role hierarchy"),
        (name = "subjects", description = "Shared subjects grouping tasks and meetings"),
        (name = "meetings", description = "Meeting scheduling, participants and attendance"),
        (name = "tasks", description = "Task tracking"),
        (name = "communications", description = "Multi-channel communications and attachments"),
        (name = "notifications", description = "In-app notifications"),
        (name = "import", description = "CSV bulk import of entities and users"),
        (name = "hearings", description = "Public hearings"),
        (name = "achievements", description = "Badges and leaderboard"),
        (name = "dashboard", description = "Dashboard counters"),
        (name = "config", description = "Feature flags"),
        (name = "health", description = "Health check endpoint")
    ),
    info(
        title = "ComuniGov API",
        description = "Institutional communication platform for public bodies",
        version = "1.0.0"
    )
)]
pub struct ApiDoc;

/// Routes and docs bound to an existing state.
pub fn router_with_state(state: AppState) -> Router {
    Router::new()
        .merge(rest::api_router_with_rate_limit(
            crate::rate_limit::RateLimitState::from_env(),
        ))
        .route("/health", axum::routing::get(health::health_check))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
}

/// Build an Axum router that serves the API docs at `/docs`
/// and the REST API at `/api/*`.
pub fn api_router(pool: Pool<Postgres>) -> Router {
    router_with_state(AppState::new(pool))
}
