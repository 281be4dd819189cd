use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use shared_types::{
    normalize_pagination, page_offset, AppError, AttachmentResponse, CommunicationListParams,
    CommunicationRequest, CommunicationResponse, CommunicationStatus, CreateAttachmentRequest,
    CreateAttachmentResponse, DispatchSummary, DownloadUrlResponse, MessageResponse,
    PaginatedResponse, UserRole,
};

use crate::access::{self, Action, Actor, ListScope, Resource};
use crate::auth::extractors::AuthRequired;
use crate::error_convert::ValidateRequest;
use crate::messaging::LiveSender;
use crate::storage::{attachment_key, ObjectStore, S3ObjectStore};

/// Largest attachment accepted, `MAX_UPLOAD_BYTES` (25 MiB by default).
fn max_attachment_bytes() -> i64 {
    crate::config::env_parse("MAX_UPLOAD_BYTES", crate::config::DEFAULT_MAX_UPLOAD_BYTES as i64)
}

fn dedup(ids: &mut Vec<i64>) {
    ids.sort_unstable();
    ids.dedup();
}

/// Validate a draft request and its addressees.
///
/// Users and entities must exist. Entity members may only address users of
/// their own entity and cannot address entities other than their own.
async fn check_request(
    pool: &Pool<Postgres>,
    actor: &Actor,
    body: &mut CommunicationRequest,
) -> Result<(), AppError> {
    body.validate_request()?;
    dedup(&mut body.recipient_user_ids);
    dedup(&mut body.recipient_entity_ids);
    if !body.has_recipients() {
        return Err(AppError::bad_request("At least one recipient is required"));
    }

    let found = crate::repo::user::existing_ids(pool, &body.recipient_user_ids).await?;
    if let Some(missing) = body.recipient_user_ids.iter().find(|id| !found.contains(id)) {
        return Err(AppError::invalid_field(
            "recipient_user_ids",
            format!("User {} does not exist", missing),
        ));
    }
    for entity_id in &body.recipient_entity_ids {
        if crate::repo::entity::find_by_id(pool, *entity_id).await?.is_none() {
            return Err(AppError::invalid_field(
                "recipient_entity_ids",
                format!("Entity {} does not exist", entity_id),
            ));
        }
    }

    if actor.role == UserRole::EntityMember {
        let own = actor
            .entity_id
            .ok_or_else(|| AppError::forbidden("Your account is not attached to an entity"))?;
        let outside =
            crate::repo::user::ids_outside_entity(pool, &body.recipient_user_ids, own).await?;
        if !outside.is_empty() || body.recipient_entity_ids.iter().any(|e| *e != own) {
            return Err(AppError::forbidden(
                "Members can only address users of their own entity",
            ));
        }
    }
    Ok(())
}

async fn detailed(pool: &Pool<Postgres>, id: i64) -> Result<CommunicationResponse, AppError> {
    let communication = crate::repo::communication::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Communication {} not found", id)))?;
    let recipients = crate::repo::communication::list_recipients(pool, id).await?;
    let attachments = crate::repo::communication::list_attachments(pool, id).await?;
    Ok(CommunicationResponse::detailed(communication, recipients, attachments))
}

fn attachments_enabled() -> Result<(), AppError> {
    if crate::config::feature_flags().s3 {
        Ok(())
    } else {
        Err(AppError::bad_request("Attachments are disabled"))
    }
}

fn parse_attachment_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::bad_request("Invalid attachment id"))
}

// ---------------------------------------------------------------------------
// GET /api/communications
// ---------------------------------------------------------------------------

/// Communications the caller can see: what they sent, what reached them or
/// their entity, and for heads everything sent from their entity.
#[utoipa::path(
    get,
    path = "/api/communications",
    params(CommunicationListParams),
    responses(
        (status = 200, description = "Communications", body = PaginatedResponse<CommunicationResponse>)
    ),
    tag = "communications"
)]
pub async fn list_communications(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Query(params): Query<CommunicationListParams>,
) -> Result<Json<PaginatedResponse<CommunicationResponse>>, AppError> {
    let actor = Actor::from(&claims);
    let (page, limit) = normalize_pagination(params.page, params.limit);

    let (rows, total) = crate::repo::communication::search(
        &pool,
        actor.is_master(),
        actor.user_id,
        actor.entity_id,
        ListScope::for_actor(&actor).entity_filter(),
        params.mailbox.map(|m| m.as_str()),
        params.status.map(|s| s.as_str()),
        page_offset(page, limit),
        limit,
    )
    .await?;

    let response = PaginatedResponse::new(rows, page, limit, total).map(CommunicationResponse::from);
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// POST /api/communications
// ---------------------------------------------------------------------------

/// Create a draft. Nothing is delivered until it is sent.
#[utoipa::path(
    post,
    path = "/api/communications",
    request_body = CommunicationRequest,
    responses(
        (status = 201, description = "Draft created", body = CommunicationResponse),
        (status = 400, description = "No recipients", body = AppError),
        (status = 403, description = "Recipient outside the caller's entity", body = AppError),
        (status = 422, description = "Validation failed", body = AppError)
    ),
    tag = "communications"
)]
pub async fn create_communication(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Json(mut body): Json<CommunicationRequest>,
) -> Result<(StatusCode, Json<CommunicationResponse>), AppError> {
    check_request(&pool, &Actor::from(&claims), &mut body).await?;

    let communication = crate::repo::communication::create(&pool, claims.sub, &body).await?;
    tracing::info!(
        communication_id = communication.id,
        channel = body.channel.as_str(),
        users = body.recipient_user_ids.len(),
        entities = body.recipient_entity_ids.len(),
        "Communication drafted"
    );
    Ok((StatusCode::CREATED, Json(detailed(&pool, communication.id).await?)))
}

// ---------------------------------------------------------------------------
// GET /api/communications/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/communications/{id}",
    params(("id" = i64, Path, description = "Communication ID")),
    responses(
        (status = 200, description = "Communication with recipients and attachments", body = CommunicationResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "communications"
)]
pub async fn get_communication(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<CommunicationResponse>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Communication(id))
        .await?;
    Ok(Json(detailed(&pool, id).await?))
}

// ---------------------------------------------------------------------------
// PUT /api/communications/{id}
// ---------------------------------------------------------------------------

/// Replace a draft's content and recipients.
#[utoipa::path(
    put,
    path = "/api/communications/{id}",
    params(("id" = i64, Path, description = "Communication ID")),
    request_body = CommunicationRequest,
    responses(
        (status = 200, description = "Draft updated", body = CommunicationResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Already sent", body = AppError)
    ),
    tag = "communications"
)]
pub async fn update_communication(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(mut body): Json<CommunicationRequest>,
) -> Result<Json<CommunicationResponse>, AppError> {
    let actor = Actor::from(&claims);
    access::authorize(&pool, &actor, Action::Manage, Resource::Communication(id)).await?;
    check_request(&pool, &actor, &mut body).await?;

    crate::repo::communication::update_draft(&pool, id, &body)
        .await?
        .ok_or_else(|| AppError::conflict("Only draft communications can be edited"))?;
    Ok(Json(detailed(&pool, id).await?))
}

// ---------------------------------------------------------------------------
// DELETE /api/communications/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/communications/{id}",
    params(("id" = i64, Path, description = "Communication ID")),
    responses(
        (status = 204, description = "Draft deleted"),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Already sent", body = AppError)
    ),
    tag = "communications"
)]
pub async fn delete_communication(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Communication(id))
        .await?;

    let attachments = crate::repo::communication::list_attachments(&pool, id).await?;
    if !crate::repo::communication::delete_draft(&pool, id).await? {
        return Err(AppError::conflict("Only draft communications can be deleted"));
    }

    if !attachments.is_empty() && crate::config::feature_flags().s3 {
        let store = S3ObjectStore::from_env()?;
        for attachment in &attachments {
            if let Err(e) = store.delete(&attachment.storage_key).await {
                tracing::warn!(key = %attachment.storage_key, error = %e, "Orphaned attachment object");
            }
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /api/communications/{id}/send
// ---------------------------------------------------------------------------

/// Deliver a draft to all its recipients over its channel, falling back to
/// the other channels each recipient can be reached on.
#[utoipa::path(
    post,
    path = "/api/communications/{id}/send",
    params(("id" = i64, Path, description = "Communication ID")),
    responses(
        (status = 200, description = "Dispatch result", body = DispatchSummary),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Already sent", body = AppError)
    ),
    tag = "communications"
)]
pub async fn send_communication(
    State(pool): State<Pool<Postgres>>,
    State(sender): State<Arc<LiveSender>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<DispatchSummary>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::UpdateStatus, Resource::Communication(id))
        .await?;

    let summary = crate::messaging::dispatch(&pool, sender.as_ref(), id).await?;
    if summary.status != CommunicationStatus::Failed {
        let communication = crate::repo::communication::find_by_id(&pool, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Communication {} not found", id)))?;
        crate::repo::achievement::evaluate(&pool, communication.sender_id).await?;
    }

    Ok(Json(summary))
}

// ---------------------------------------------------------------------------
// POST /api/communications/{id}/read
// ---------------------------------------------------------------------------

/// Mark a communication as read by the caller.
#[utoipa::path(
    post,
    path = "/api/communications/{id}/read",
    params(("id" = i64, Path, description = "Communication ID")),
    responses(
        (status = 200, description = "Marked as read", body = MessageResponse),
        (status = 400, description = "Caller is not a recipient", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "communications"
)]
pub async fn mark_communication_read(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let actor = Actor::from(&claims);
    access::authorize(&pool, &actor, Action::View, Resource::Communication(id)).await?;

    let matched =
        crate::repo::communication::mark_read(&pool, id, actor.user_id, actor.entity_id).await?;
    if matched == 0 {
        return Err(AppError::bad_request("You are not a recipient of this communication"));
    }
    Ok(Json(MessageResponse::new("Communication marked as read")))
}

// ---------------------------------------------------------------------------
// POST /api/communications/{id}/attachments
// ---------------------------------------------------------------------------

/// Register an attachment on a draft and return a presigned upload URL.
/// The client PUTs the file there, then calls the finalize endpoint.
#[utoipa::path(
    post,
    path = "/api/communications/{id}/attachments",
    params(("id" = i64, Path, description = "Communication ID")),
    request_body = CreateAttachmentRequest,
    responses(
        (status = 201, description = "Upload URL issued", body = CreateAttachmentResponse),
        (status = 400, description = "Attachments disabled or file too large", body = AppError),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 409, description = "Already sent", body = AppError)
    ),
    tag = "communications"
)]
pub async fn create_attachment(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    Json(body): Json<CreateAttachmentRequest>,
) -> Result<(StatusCode, Json<CreateAttachmentResponse>), AppError> {
    attachments_enabled()?;
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Communication(id))
        .await?;
    body.validate_request()?;
    let limit = max_attachment_bytes();
    if body.size_bytes > limit {
        return Err(AppError::bad_request(format!(
            "Attachments are limited to {} MiB",
            limit / (1024 * 1024)
        )));
    }

    let communication = crate::repo::communication::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Communication {} not found", id)))?;
    if communication.communication_status() != CommunicationStatus::Draft {
        return Err(AppError::conflict("Attachments can only be added to drafts"));
    }

    let content_type = if body.content_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        body.content_type.trim()
    };
    let attachment_id = Uuid::new_v4();
    let key = attachment_key(id, attachment_id, &body.file_name);

    let store = S3ObjectStore::from_env()?;
    let (upload_url, required_headers) = store
        .presign_put(&key, content_type)
        .await
        .map_err(|e| AppError::internal(format!("Failed to generate upload URL: {}", e)))?;

    let attachment = crate::repo::communication::create_attachment(
        &pool,
        attachment_id,
        id,
        body.file_name.trim(),
        content_type,
        body.size_bytes,
        &key,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAttachmentResponse {
            attachment: AttachmentResponse::from(attachment),
            upload_url,
            required_headers,
        }),
    ))
}

// ---------------------------------------------------------------------------
// GET /api/communications/{id}/attachments
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/communications/{id}/attachments",
    params(("id" = i64, Path, description = "Communication ID")),
    responses(
        (status = 200, description = "Attachments", body = Vec<AttachmentResponse>),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "communications"
)]
pub async fn list_attachments(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
) -> Result<Json<Vec<AttachmentResponse>>, AppError> {
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Communication(id))
        .await?;
    let rows = crate::repo::communication::list_attachments(&pool, id).await?;
    Ok(Json(rows.into_iter().map(AttachmentResponse::from).collect()))
}

// ---------------------------------------------------------------------------
// POST /api/communications/{id}/attachments/{attachment_id}/finalize
// ---------------------------------------------------------------------------

/// Confirm that the file reached storage.
#[utoipa::path(
    post,
    path = "/api/communications/{id}/attachments/{attachment_id}/finalize",
    params(
        ("id" = i64, Path, description = "Communication ID"),
        ("attachment_id" = String, Path, description = "Attachment UUID")
    ),
    responses(
        (status = 200, description = "Attachment finalized", body = AttachmentResponse),
        (status = 400, description = "Object not uploaded yet", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "communications"
)]
pub async fn finalize_attachment(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path((id, attachment_id)): Path<(i64, String)>,
) -> Result<Json<AttachmentResponse>, AppError> {
    attachments_enabled()?;
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Communication(id))
        .await?;
    let att_uuid = parse_attachment_id(&attachment_id)?;

    let attachment = crate::repo::communication::find_attachment(&pool, id, att_uuid)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Attachment {} not found", attachment_id)))?;

    let store = S3ObjectStore::from_env()?;
    let exists = store
        .head(&attachment.storage_key)
        .await
        .map_err(|e| AppError::internal(format!("HEAD check failed: {}", e)))?;
    if !exists {
        return Err(AppError::bad_request("Object not yet uploaded to storage"));
    }

    let updated =
        crate::repo::communication::mark_attachment_uploaded(&pool, att_uuid, attachment.size_bytes)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Attachment {} not found", attachment_id)))?;
    Ok(Json(AttachmentResponse::from(updated)))
}

// ---------------------------------------------------------------------------
// GET /api/communications/{id}/attachments/{attachment_id}/download
// ---------------------------------------------------------------------------

/// Presigned download URL for an uploaded attachment.
#[utoipa::path(
    get,
    path = "/api/communications/{id}/attachments/{attachment_id}/download",
    params(
        ("id" = i64, Path, description = "Communication ID"),
        ("attachment_id" = String, Path, description = "Attachment UUID")
    ),
    responses(
        (status = 200, description = "Download URL", body = DownloadUrlResponse),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError)
    ),
    tag = "communications"
)]
pub async fn download_attachment(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path((id, attachment_id)): Path<(i64, String)>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    attachments_enabled()?;
    access::authorize(&pool, &Actor::from(&claims), Action::View, Resource::Communication(id))
        .await?;
    let att_uuid = parse_attachment_id(&attachment_id)?;

    let attachment = crate::repo::communication::find_attachment(&pool, id, att_uuid)
        .await?
        .filter(|a| a.uploaded)
        .ok_or_else(|| AppError::not_found(format!("Attachment {} not found", attachment_id)))?;

    let store = S3ObjectStore::from_env()?;
    let url = store
        .presign_get(&attachment.storage_key)
        .await
        .map_err(|e| AppError::internal(format!("Failed to generate download URL: {}", e)))?;
    Ok(Json(DownloadUrlResponse { url }))
}

// ---------------------------------------------------------------------------
// DELETE /api/communications/{id}/attachments/{attachment_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/communications/{id}/attachments/{attachment_id}",
    params(
        ("id" = i64, Path, description = "Communication ID"),
        ("attachment_id" = String, Path, description = "Attachment UUID")
    ),
    responses(
        (status = 204, description = "Attachment removed"),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Not found", body = AppError),
        (status = 409, description = "Already sent", body = AppError)
    ),
    tag = "communications"
)]
pub async fn delete_attachment(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path((id, attachment_id)): Path<(i64, String)>,
) -> Result<StatusCode, AppError> {
    attachments_enabled()?;
    access::authorize(&pool, &Actor::from(&claims), Action::Manage, Resource::Communication(id))
        .await?;
    let att_uuid = parse_attachment_id(&attachment_id)?;

    let communication = crate::repo::communication::find_by_id(&pool, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Communication {} not found", id)))?;
    if communication.communication_status() != CommunicationStatus::Draft {
        return Err(AppError::conflict("Attachments of sent communications are kept"));
    }

    let attachment = crate::repo::communication::find_attachment(&pool, id, att_uuid)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Attachment {} not found", attachment_id)))?;

    let store = S3ObjectStore::from_env()?;
    store
        .delete(&attachment.storage_key)
        .await
        .map_err(|e| AppError::internal(format!("Failed to delete object: {}", e)))?;
    crate::repo::communication::delete_attachment(&pool, att_uuid).await?;
    Ok(StatusCode::NO_CONTENT)
}
