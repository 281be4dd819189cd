use axum::{
    extract::{Path, Query, State},
    Json,
};
use sqlx::{Pool, Postgres};

use shared_types::{AppError, EntityImportParams, ImportReport};

use crate::access::{self, Action, Actor, Resource};
use crate::auth::extractors::{AuthRequired, RoleRequired, MASTER};

fn require_body(csv_text: &str) -> Result<(), AppError> {
    if csv_text.trim().is_empty() {
        Err(AppError::bad_request("CSV body is empty"))
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// POST /api/import/entities
// ---------------------------------------------------------------------------

/// Bulk-create entities from CSV text. With `create_heads=true` each new
/// entity gets an entity head account whose credentials are returned once.
#[utoipa::path(
    post,
    path = "/api/import/entities",
    params(EntityImportParams),
    request_body(content = String, content_type = "text/csv", description = "CSV with a header line"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Unreadable CSV", body = AppError),
        (status = 403, description = "Master only", body = AppError)
    ),
    tag = "import"
)]
pub async fn import_entities(
    State(pool): State<Pool<Postgres>>,
    RoleRequired(_claims): RoleRequired<MASTER>,
    Query(params): Query<EntityImportParams>,
    csv_text: String,
) -> Result<Json<ImportReport>, AppError> {
    require_body(&csv_text)?;
    let report = crate::csv_import::import_entities(&pool, &csv_text, params.create_heads).await?;
    Ok(Json(report))
}

// ---------------------------------------------------------------------------
// POST /api/import/entities/{id}/users
// ---------------------------------------------------------------------------

/// Bulk-create users of an entity from CSV text. Heads may only import
/// members.
#[utoipa::path(
    post,
    path = "/api/import/entities/{id}/users",
    params(("id" = i64, Path, description = "Entity ID")),
    request_body(content = String, content_type = "text/csv", description = "CSV with a header line"),
    responses(
        (status = 200, description = "Import report", body = ImportReport),
        (status = 400, description = "Unreadable CSV", body = AppError),
        (status = 403, description = "Forbidden", body = AppError),
        (status = 404, description = "Entity not found", body = AppError)
    ),
    tag = "import"
)]
pub async fn import_users(
    State(pool): State<Pool<Postgres>>,
    AuthRequired(claims): AuthRequired,
    Path(id): Path<i64>,
    csv_text: String,
) -> Result<Json<ImportReport>, AppError> {
    let actor = Actor::from(&claims);
    access::authorize(&pool, &actor, Action::Manage, Resource::Entity(id)).await?;
    require_body(&csv_text)?;

    let report = crate::csv_import::import_users(&pool, id, &csv_text, actor.is_master()).await?;
    Ok(Json(report))
}
