use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{
    normalize_pagination, page_offset, AppError, PaginatedResponse, TaskListParams, TaskRequest,
    TaskResponse, TaskStatus, UpdateTaskStatusRequest, UserRole,
};

use crate::access::{self, Action, Actor, ListScope, Resource};
use crate::auth::extractors::AuthRequired;
use crate::error_convert::ValidateRequest;

/// Paginated tasks visible to `actor`.
pub(crate) async fn search_visible(
    pool: &Pool<Postgres>,
    actor: &Actor,
    params: &TaskListParams,
) -> Result<PaginatedResponse<TaskResponse>, AppError> {
    let (scope_entity, viewer_id) = ListScope::for_actor(actor).with_viewer(actor.user_id);
    let (page, limit) = normalize_pagination(params.page, params.limit);

    let (tasks, total) = crate::repo::task::search(
        pool,
        scope_entity,
        viewer_id,
        params.status.map(|s| s.as_str()),
        params.priority.map(|p| p.as_str()),
        params.entity_id,
        params.subject_id,
        params.assigned_to,
        params.overdue,
        page_offset(page, limit),
        limit,
    )
    .await?;

    Ok(PaginatedResponse::new(tasks, page, limit, total).map(TaskResponse::from))
}

/// Entity a task is filed under. Masters may pick any entity; everyone else
/// files tasks under their own.
fn resolve_entity(
    actor: &Actor,
    requested: Option<i64>,
    fallback: Option<i64>,
) -> Result<i64, AppError> {
    if actor.is_master() {
        return requested.or(fallback).ok_or_else(|| {
            AppError::invalid_field("entity_id", "entity_id is required")
        });
    }
    let own = actor
        .entity_id
        .ok_or_else(|| AppError::forbidden("Your account is not attached to an entity"))?;
    match requested {
        Some(entity_id) if entity_id != own => Err(AppError::forbidden(
            "Tasks can only be filed under your own entity",
        )),
        _ => Ok(own),
    }
}

/// Check the assignee and subject of a task request.
async fn check_links(
    pool: &Pool<Postgres>,
    actor: &Actor,
    entity_id: i64,
    body: &TaskRequest,
) -> Result<(), AppError> {
    if let Some(assignee) = body.assigned_to {
        if actor.role == UserRole::EntityMember && assignee != actor.user_id {
            return Err(AppError::forbidden("Members can only assign tasks to themselves"));
        }
        let user = crate::repo::user::find_by_id(pool, assignee)
            .await?
            .ok_or_else(|| {
                AppError::invalid_field("assigned_to", format!("User {} does not exist", assignee))
            })?;
        if user.entity_id != Some(entity_id) {
            return Err(AppError::bad_request(format!(
                "User {} does not belong to entity {}",
                assignee, entity_id
            )));
        }
    }
    if let Some(subject_id) = body.subject_id {
        if !crate::repo::subject::exists(pool, subject_id).await? {
            return Err(AppError::invalid_field(
                "subject_id",
                format!("Subject {} does not exist", subject_id),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /api/tasks
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/tasks",
    params(TaskListParams),
    responses(
        (status = 200, description = "Tasks", body = PaginatedResponse<TaskResponse>)
    ),
    tag = "tasks"
)]
pub async fn list_tasks(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Query(params): Query<TaskListParams>,
) -> Result<Json<PaginatedResponse<TaskResponse>>, AppError> {
    let response = search_visible(&pool, &Actor::from(&claims), &params).await?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/tasks
// ---------------------------------------------------------------------------

/// Create a task. The assignee must belong to the task's entity.
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = TaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Assignee outside the entity", body = AppError),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "tasks"
)]
pub async fn create_task(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Json(body): Json<TaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>), AppError> {
    body.validate_request()?;
    let actor = Actor::from(&claims);
    let entity_id = resolve_entity(&actor, body.entity_id, None)?;
    check_links(&pool, &actor, entity_id, &body).await?;

    let task = crate::repo::task::create(&pool, claims.sub, entity_id, &body).await?;
    tracing::info!(task_id = task.id, entity_id, assigned_to = ?task.assigned_to, "Task created");
    Ok((StatusCode::CREATED, Json(TaskResponse::from(task))))
}

// ---------------------------------------------------------------------------
// GET /api/tasks/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task found", body = TaskResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "tasks"
)]
pub async fn get_task(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<TaskResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Task(id)).await?;

    let task = crate::repo::task::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;
    Ok(Json(TaskResponse::from(task)))
}

// ---------------------------------------------------------------------------
// PUT /api/tasks/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = TaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 400, description = "Assignee outside the entity", body = AppError),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "tasks"
)]
pub async fn update_task(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<TaskRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    let actor = Actor::from(&claims);
    access::authorize(&pool, &actor, Action::Manage, Resource::Task(id)).await?;
    body.validate_request()?;

    let current = crate::repo::task::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;
    let entity_id = if body.entity_id.is_none() || body.entity_id == Some(current.entity_id) {
        current.entity_id
    } else {
        resolve_entity(&actor, body.entity_id, Some(current.entity_id))?
    };
    check_links(&pool, &actor, entity_id, &body).await?;

    let task = crate::repo::task::update(&pool, id, entity_id, &body)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;
    Ok(Json(TaskResponse::from(task)))
}

// ---------------------------------------------------------------------------
// DELETE /api/tasks/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "tasks"
)]
pub async fn delete_task(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Task(id)).await?;

    let deleted = crate::repo::task::delete(&pool, id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("Task {} not found", id)))
    }
}

// ---------------------------------------------------------------------------
// PATCH /api/tasks/{id}/status
// ---------------------------------------------------------------------------

/// Change a task's status. The assignee may do this too. Completing a task
/// evaluates badges for the assignee.
#[utoipa::path(
    patch,
    path = "/api/tasks/{id}/status",
    params(("id" = i64, Path, description = "Task ID")),
    request_body = UpdateTaskStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = TaskResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "tasks"
)]
pub async fn update_task_status(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<UpdateTaskStatusRequest>,
) -> Result<Json<TaskResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::UpdateStatus, Resource::Task(id))
        .await?;

    let task = crate::repo::task::set_status(&pool, id, body.status)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Task {} not found", id)))?;

    if body.status == TaskStatus::Completed {
        if let Some(assignee) = task.assigned_to {
            crate::repo::achievement::evaluate(&pool, assignee).await?;
        }
    }

    Ok(Json(TaskResponse::from(task)))
}
