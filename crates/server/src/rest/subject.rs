use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    is_valid_color, normalize_pagination, page_offset, AppError, MeetingListParams,
    MeetingResponse, PaginatedResponse, SubjectListParams, SubjectRequest, SubjectResponse,
    TaskListParams, TaskResponse,
};

use crate::access::{self, Action, Actor, Resource};
use crate::auth::extractors::{AuthRequired, RoleRequired, HEAD};
use crate::error_convert::ValidateRequest;

fn check_color(body: &SubjectRequest) -> Result<(), AppError> {
    match body.color.as_deref() {
        Some(color) if !is_valid_color(color) => Err(AppError::invalid_field(
            "color",
            "Color must be a hex value such as #1e88e5",
        )),
        _ => Ok(()),
    }
}

async fn ensure_subject_exists(pool: &Pool<Postgres>, id: i64) -> Result<(), AppError> {
    if crate::repo::subject::exists(pool, id).await? {
        Ok(())
    } else {
        Err(AppError::not_found(format!("Subject {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// GET /api/subjects
// ---------------------------------------------------------------------------

/// Subjects are shared across entities and visible to every user.
#[utoipa::path(
    get,
    path = "/api/subjects",
    params(SubjectListParams),
    responses(
        (status = 200, description = "Subjects", body = PaginatedResponse<SubjectResponse>)
    ),
    tag = "subjects"
)]
pub async fn list_subjects(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(_claims): AuthRequired,
    Query(params): Query<SubjectListParams>,
) -> Result<Json<PaginatedResponse<SubjectResponse>>, AppError> {
    let (page, limit) = normalize_pagination(params.page, params.limit);
    let (subjects, total) = crate::repo::subject::search(
        &pool,
        params.q.as_deref(),
        page_offset(page, limit),
        limit,
    )
    .await?;

    let response = PaginatedResponse::new(subjects, page, limit, total).map(SubjectResponse::from);
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/subjects
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/subjects",
    request_body = SubjectRequest,
    responses(
        (status = 201, description = "Subject created", body = SubjectResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "subjects"
)]
pub async fn create_subject(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(claims): RoleRequired<HEAD>,
    Json(body): Json<SubjectRequest>,
) -> Result<(StatusCode, Json<SubjectResponse>), AppError> {
    body.validate_request()?;
    check_color(&body)?;

    let subject = crate::repo::subject::create(&pool, claims.sub, &body).await?;
    Ok((StatusCode::CREATED, Json(SubjectResponse::from(subject))))
}

// ---------------------------------------------------------------------------
// GET /api/subjects/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/subjects/{id}",
    params(("id" = i64, Path, description = "Subject ID")),
    responses(
        (status = 200, description = "Subject found", body = SubjectResponse),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "subjects"
)]
pub async fn get_subject(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(_claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<SubjectResponse>, AppError> {
    let subject = crate::repo::subject::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Subject {} not found", id)))?;
    Ok(Json(SubjectResponse::from(subject)))
}

// ---------------------------------------------------------------------------
// PUT /api/subjects/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/subjects/{id}",
    params(("id" = i64, Path, description = "Subject ID")),
    request_body = SubjectRequest,
    responses(
        (status = 200, description = "Subject updated", body = SubjectResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "subjects"
)]
pub async fn update_subject(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<SubjectRequest>,
) -> Result<Json<SubjectResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Subject(id)).await?;
    body.validate_request()?;
    check_color(&body)?;

    let subject = crate::repo::subject::update(&pool, id, &body)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Subject {} not found", id)))?;
    Ok(Json(SubjectResponse::from(subject)))
}

// ---------------------------------------------------------------------------
// DELETE /api/subjects/{id}
// ---------------------------------------------------------------------------

/// Delete a subject. Linked tasks and meetings are kept and detached.
#[utoipa::path(
    delete,
    path = "/api/subjects/{id}",
    params(("id" = i64, Path, description = "Subject ID")),
    responses(
        (status = 204, description = "Subject deleted"),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "subjects"
)]
pub async fn delete_subject(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Subject(id)).await?;

    let deleted = crate::repo::subject::delete(&pool, id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Subject {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// GET /api/subjects/{id}/tasks
// ---------------------------------------------------------------------------

/// Tasks of a subject that the caller can see.
#[utoipa::path(
    get,
    path = "/api/subjects/{id}/tasks",
    params(("id" = i64, Path, description = "Subject ID"), TaskListParams),
    responses(
        (status = 200, description = "Tasks", body = PaginatedResponse<TaskResponse>),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "subjects"
)]
pub async fn list_subject_tasks(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Query(mut params): Query<TaskListParams>,
) -> Result<Json<PaginatedResponse<TaskResponse>>, AppError> {
    ensure_subject_exists(&pool, id).await?;
    params.subject_id = Some(id);
    let response = super::task::search_visible(&pool, &Actor::from(&claims), &params).await?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// GET /api/subjects/{id}/meetings
// ---------------------------------------------------------------------------

/// Meetings linked to a subject that the caller can see.
#[utoipa::path(
    get,
    path = "/api/subjects/{id}/meetings",
    params(("id" = i64, Path, description = "Subject ID"), MeetingListParams),
    responses(
        (status = 200, description = "Meetings", body = PaginatedResponse<MeetingResponse>),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "subjects"
)]
pub async fn list_subject_meetings(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Query(mut params): Query<MeetingListParams>,
) -> Result<Json<PaginatedResponse<MeetingResponse>>, AppError> {
    ensure_subject_exists(&pool, id).await?;
    params.subject_id = Some(id);
    let response = super::meeting::search_visible(&pool, &Actor::from(&claims), &params).await?;
    Ok(Json(response))
}
