use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    normalize_pagination, page_offset, AppError, AttendanceRequest, Channel,
    CommunicationRequest, DispatchSummary, Meeting, MeetingListParams, MeetingRequest,
    MeetingResponse, MeetingStatus, PaginatedResponse, SetParticipantsRequest,
    UpdateMeetingStatusRequest,
};

use crate::access::{self, Action, Actor, ListScope, Resource};
use crate::auth::extractors::AuthRequired;
use crate::error_convert::ValidateRequest;
use crate::messaging::LiveSender;

/// Paginated meetings visible to `actor`.
pub(crate) async fn search_visible(
    pool: &Pool<Postgres>,
    actor: &Actor,
    params: &MeetingListParams,
) -> Result<PaginatedResponse<MeetingResponse>, AppError> {
    let (entity_id, viewer_id) = ListScope::for_actor(actor).with_viewer(actor.user_id);
    let (page, limit) = normalize_pagination(params.page, params.limit);

    let (meetings, total) = crate::repo::meeting::search(
        pool,
        entity_id,
        viewer_id,
        params.from,
        params.to,
        params.status.map(|s| s.as_str()),
        params.subject_id,
        page_offset(page, limit),
        limit,
    )
    .await?;

    Ok(PaginatedResponse::new(meetings, page, limit, total).map(MeetingResponse::from))
}

fn check_request(body: &MeetingRequest) -> Result<(), AppError> {
    body.validate_request()?;
    if !body.has_valid_window() {
        return Err(AppError::bad_request("ends_at must be after starts_at"));
    }
    if !body.has_valid_url() {
        return Err(AppError::invalid_field(
            "meeting_url",
            "Meeting URL must start with http:// or https://",
        ));
    }
    Ok(())
}

async fn check_subject(pool: &Pool<Postgres>, subject_id: Option<i64>) -> Result<(), AppError> {
    match subject_id {
        Some(id) if !crate::repo::subject::exists(pool, id).await? => Err(AppError::invalid_field(
            "subject_id",
            format!("Subject {} does not exist", id),
        )),
        _ => Ok(()),
    }
}

/// Reject participant lists that reference unknown users.
async fn check_users_exist(pool: &Pool<Postgres>, user_ids: &[i64]) -> Result<(), AppError> {
    if user_ids.is_empty() {
        return Ok(());
    }
    let found = crate::repo::user::existing_ids(pool, user_ids).await?;
    let missing: Vec<String> = user_ids
        .iter()
        .filter(|id| !found.contains(id))
        .map(|id| id.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::invalid_field(
            "user_ids",
            format!("Unknown user(s): {}", missing.join(", ")),
        ))
    }
}

async fn load_meeting(pool: &Pool<Postgres>, id: i64) -> Result<Meeting, AppError> {
    crate::repo::meeting::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Meeting {} not found", id)))
}

async fn detailed(pool: &Pool<Postgres>, meeting: Meeting) -> Result<MeetingResponse, AppError> {
    let participants = crate::repo::meeting::list_participants(pool, meeting.id).await?;
    Ok(MeetingResponse::with_participants(meeting, participants))
}

fn meeting_status(meeting: &Meeting) -> MeetingStatus {
    MeetingStatus::parse(&meeting.status).unwrap_or_default()
}

/// Announcement text sent to participants.
fn announcement(meeting: &Meeting) -> (String, String) {
    let title = format!("Meeting: {}", meeting.title);
    let mut body = format!(
        "You are invited to \"{}\" on {}.",
        meeting.title,
        meeting.starts_at.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(location) = meeting.location.as_deref().filter(|l| !l.trim().is_empty()) {
        body.push_str(&format!("\nLocation: {}", location));
    }
    if let Some(url) = meeting.meeting_url.as_deref() {
        body.push_str(&format!("\nJoin online: {}", url));
    }
    if let Some(description) = meeting.description.as_deref().filter(|d| !d.trim().is_empty()) {
        body.push_str(&format!("\n\n{}", description));
    }
    (title, body)
}

// ---------------------------------------------------------------------------
// GET /api/meetings
// ---------------------------------------------------------------------------

/// Meetings the caller organizes, attends, or oversees as entity head.
#[utoipa::path(
    get,
    path = "/api/meetings",
    params(MeetingListParams),
    responses(
        (status = 200, description = "Meetings", body = PaginatedResponse<MeetingResponse>)
    ),
    tag = "meetings"
)]
pub async fn list_meetings(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Query(params): Query<MeetingListParams>,
) -> Result<Json<PaginatedResponse<MeetingResponse>>, AppError> {
    let response = search_visible(&pool, &Actor::from(&claims), &params).await?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/meetings
// ---------------------------------------------------------------------------

/// Schedule a meeting. The caller becomes the organizer.
#[utoipa::path(
    post,
    path = "/api/meetings",
    request_body = MeetingRequest,
    responses(
        (status = 201, description = "Meeting created", body = MeetingResponse),
        (status = 400, description = "Invalid time window", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn create_meeting(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Json(body): Json<MeetingRequest>,
) -> Result<(StatusCode, Json<MeetingResponse>), AppError> {
    check_request(&body)?;
    check_subject(&pool, body.subject_id).await?;
    check_users_exist(&pool, &body.participant_ids).await?;

    let meeting = crate::repo::meeting::create(&pool, claims.sub, &body).await?;
    tracing::info!(
        meeting_id = meeting.id,
        organizer_id = claims.sub,
        participants = body.participant_ids.len(),
        "Meeting scheduled"
    );

    let response = detailed(&pool, meeting).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

// ---------------------------------------------------------------------------
// GET /api/meetings/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/meetings/{id}",
    params(("id" = i64, Path, description = "Meeting ID")),
    responses(
        (status = 200, description = "Meeting with participants", body = MeetingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn get_meeting(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<MeetingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Meeting(id)).await?;
    let meeting = load_meeting(&pool, id).await?;
    Ok(Json(detailed(&pool, meeting).await?))
}

// ---------------------------------------------------------------------------
// PUT /api/meetings/{id}
// ---------------------------------------------------------------------------

/// Edit a meeting that has not finished yet. Participants are left as is.
#[utoipa::path(
    put,
    path = "/api/meetings/{id}",
    params(("id" = i64, Path, description = "Meeting ID")),
    request_body = MeetingRequest,
    responses(
        (status = 200, description = "Meeting updated", body = MeetingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Meeting already finished", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn update_meeting(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<MeetingRequest>,
) -> Result<Json<MeetingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Meeting(id)).await?;
    check_request(&body)?;
    check_subject(&pool, body.subject_id).await?;

    let current = load_meeting(&pool, id).await?;
    if meeting_status(&current).is_terminal() {
        return Err(AppError::conflict(format!(
            "Meeting {} is {} and can no longer be edited",
            id, current.status
        )));
    }

    let meeting = crate::repo::meeting::update(&pool, id, &body)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Meeting {} not found", id)))?;
    Ok(Json(detailed(&pool, meeting).await?))
}

// ---------------------------------------------------------------------------
// DELETE /api/meetings/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/meetings/{id}",
    params(("id" = i64, Path, description = "Meeting ID")),
    responses(
        (status = 204, description = "Meeting deleted"),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn delete_meeting(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Meeting(id)).await?;

    let deleted = crate::repo::meeting::delete(&pool, id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Meeting {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// PUT /api/meetings/{id}/participants
// ---------------------------------------------------------------------------

/// Replace the participant set.
#[utoipa::path(
    put,
    path = "/api/meetings/{id}/participants",
    params(("id" = i64, Path, description = "Meeting ID")),
    request_body = SetParticipantsRequest,
    responses(
        (status = 200, description = "Participants replaced", body = MeetingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 422, description = "Unknown users", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn set_participants(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<SetParticipantsRequest>,
) -> Result<Json<MeetingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Meeting(id)).await?;

    let mut user_ids = body.user_ids;
    user_ids.sort_unstable();
    user_ids.dedup();
    check_users_exist(&pool, &user_ids).await?;

    crate::repo::meeting::set_participants(&pool, id, &user_ids).await?;
    let meeting = load_meeting(&pool, id).await?;
    Ok(Json(detailed(&pool, meeting).await?))
}

// ---------------------------------------------------------------------------
// POST /api/meetings/{id}/attendance
// ---------------------------------------------------------------------------

/// Record whether a participant attended. On a completed meeting the
/// attendee's badges are evaluated right away.
#[utoipa::path(
    post,
    path = "/api/meetings/{id}/attendance",
    params(("id" = i64, Path, description = "Meeting ID")),
    request_body = AttendanceRequest,
    responses(
        (status = 200, description = "Attendance recorded", body = MeetingResponse),
        (status = 400, description = "User is not a participant", body = AppError),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn record_attendance(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<AttendanceRequest>,
) -> Result<Json<MeetingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Meeting(id)).await?;

    let updated =
        crate::repo::meeting::set_attendance(&pool, id, body.user_id, body.attended).await?;
    if !updated {
        return Err(AppError::bad_request(format!(
            "User {} is not a participant of meeting {}",
            body.user_id, id
        )));
    }

    let meeting = load_meeting(&pool, id).await?;
    if body.attended && meeting_status(&meeting) == MeetingStatus::Completed {
        crate::repo::achievement::evaluate(&pool, body.user_id).await?;
    }
    Ok(Json(detailed(&pool, meeting).await?))
}

// ---------------------------------------------------------------------------
// PATCH /api/meetings/{id}/status
// ---------------------------------------------------------------------------

/// Move a meeting through its lifecycle. Completing a meeting evaluates
/// badges for every participant who attended.
#[utoipa::path(
    patch,
    path = "/api/meetings/{id}/status",
    params(("id" = i64, Path, description = "Meeting ID")),
    request_body = UpdateMeetingStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = MeetingResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Transition not allowed", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn update_meeting_status(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<UpdateMeetingStatusRequest>,
) -> Result<Json<MeetingResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::UpdateStatus, Resource::Meeting(id))
        .await?;

    let current = load_meeting(&pool, id).await?;
    let from = meeting_status(&current);
    if !from.can_transition_to(body.status) {
        return Err(AppError::conflict(format!(
            "Cannot move meeting from {} to {}",
            from.as_str(),
            body.status.as_str()
        )));
    }

    let meeting = crate::repo::meeting::transition_status(&pool, id, from, body.status)
        .await?
        .ok_or_else(|| AppError::conflict("Meeting status changed concurrently; reload and retry"))?;

    tracing::info!(meeting_id = id, from = from.as_str(), to = body.status.as_str(), "Meeting status changed");

    if body.status == MeetingStatus::Completed {
        for user_id in crate::repo::meeting::attendee_ids(&pool, id).await? {
            crate::repo::achievement::evaluate(&pool, user_id).await?;
        }
    }

    Ok(Json(detailed(&pool, meeting).await?))
}

// ---------------------------------------------------------------------------
// POST /api/meetings/{id}/notify
// ---------------------------------------------------------------------------

/// Send an in-app announcement of the meeting to all participants.
#[utoipa::path(
    post,
    path = "/api/meetings/{id}/notify",
    params(("id" = i64, Path, description = "Meeting ID")),
    responses(
        (status = 200, description = "Announcement dispatched", body = DispatchSummary),
        (status = 400, description = "Meeting has no participants", body = AppError),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "meetings"
)]
pub async fn notify_participants(
    State(pool): State<Pool<Postgres>>,
    State(sender): State<Arc<LiveSender>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<DispatchSummary>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Meeting(id)).await?;

    let meeting = load_meeting(&pool, id).await?;
    let participants = crate::repo::meeting::list_participants(&pool, id).await?;
    if participants.is_empty() {
        return Err(AppError::bad_request(format!("Meeting {} has no participants", id)));
    }

    let (title, body) = announcement(&meeting);
    let request = CommunicationRequest {
        title,
        body,
        channel: Channel::System,
        recipient_user_ids: participants.iter().map(|p| p.user_id).collect(),
        recipient_entity_ids: Vec::new(),
    };
    let communication = crate::repo::communication::create(&pool, claims.sub, &request).await?;
    let summary = crate::messaging::dispatch(&pool, sender.as_ref(), communication.id).await?;

    tracing::info!(meeting_id = id, communication_id = communication.id, "Meeting participants notified");
    Ok(Json(summary))
}
