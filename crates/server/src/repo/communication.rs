use shared_types::{
    AppError, Channel, Communication, CommunicationAttachment, CommunicationRecipient,
    CommunicationRequest, CommunicationStatus, DeliveryStatus,
};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// Insert a draft communication with its recipients in one transaction.
pub async fn create(
    pool: &Pool<Postgres>,
    sender_id: i64,
    req: &CommunicationRequest,
) -> Result<Communication, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let communication = sqlx::query_as::<_, Communication>(
        r#"
        INSERT INTO communications (title, body, channel, sender_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id, title, body, channel, sender_id, status, sent_at, created_at, updated_at
        "#,
    )
    .bind(req.title.trim())
    .bind(&req.body)
    .bind(req.channel.as_str())
    .bind(sender_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    insert_recipients(&mut tx, communication.id, req).await?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(communication)
}

async fn insert_recipients(
    conn: &mut PgConnection,
    communication_id: i64,
    req: &CommunicationRequest,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO communication_recipients (communication_id, recipient_user_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(communication_id)
    .bind(&req.recipient_user_ids)
    .execute(&mut *conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    sqlx::query(
        r#"
        INSERT INTO communication_recipients (communication_id, recipient_entity_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(communication_id)
    .bind(&req.recipient_entity_ids)
    .execute(&mut *conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(())
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: i64) -> Result<Option<Communication>, AppError> {
    let row = sqlx::query_as::<_, Communication>(
        r#"
        SELECT id, title, body, channel, sender_id, status, sent_at, created_at, updated_at
        FROM communications
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn list_recipients(
    pool: &Pool<Postgres>,
    communication_id: i64,
) -> Result<Vec<CommunicationRecipient>, AppError> {
    let rows = sqlx::query_as::<_, CommunicationRecipient>(
        r#"
        SELECT id, communication_id, recipient_user_id, recipient_entity_id,
               delivery_status, delivered_channel, error, read_at
        FROM communication_recipients
        WHERE communication_id = $1
        ORDER BY id
        "#,
    )
    .bind(communication_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}

/// Search communications visible to a viewer.
///
/// - `all` lifts the visibility restriction (master implementers).
/// - Otherwise a communication is visible to its sender, to the heads of the
///   sender's entity (`head_entity`), and, once it left the draft state, to
///   recipient users and users of recipient entities.
/// - `mailbox` narrows to what the viewer sent (`sent`) or received (`inbox`).
pub async fn search(
    pool: &Pool<Postgres>,
    all: bool,
    viewer_id: i64,
    viewer_entity: Option<i64>,
    head_entity: Option<i64>,
    mailbox: Option<&str>,
    status: Option<&str>,
    offset: i64,
    limit: i64,
) -> Result<(Vec<Communication>, i64), AppError> {
    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM communications c
        JOIN users s ON s.id = c.sender_id
        WHERE ($1
               OR c.sender_id = $2
               OR s.entity_id = $4
               OR (c.status <> 'draft' AND EXISTS (
                   SELECT 1 FROM communication_recipients r
                   WHERE r.communication_id = c.id
                     AND (r.recipient_user_id = $2 OR r.recipient_entity_id = $3))))
          AND ($5::TEXT IS NULL
               OR ($5 = 'sent' AND c.sender_id = $2)
               OR ($5 = 'inbox' AND c.status <> 'draft' AND EXISTS (
                   SELECT 1 FROM communication_recipients r
                   WHERE r.communication_id = c.id
                     AND (r.recipient_user_id = $2 OR r.recipient_entity_id = $3))))
          AND ($6::TEXT IS NULL OR c.status = $6)
        "#,
    )
    .bind(all)
    .bind(viewer_id)
    .bind(viewer_entity)
    .bind(head_entity)
    .bind(mailbox)
    .bind(status)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let rows = sqlx::query_as::<_, Communication>(
        r#"
        SELECT c.id, c.title, c.body, c.channel, c.sender_id, c.status, c.sent_at,
               c.created_at, c.updated_at
        FROM communications c
        JOIN users s ON s.id = c.sender_id
        WHERE ($1
               OR c.sender_id = $2
               OR s.entity_id = $4
               OR (c.status <> 'draft' AND EXISTS (
                   SELECT 1 FROM communication_recipients r
                   WHERE r.communication_id = c.id
                     AND (r.recipient_user_id = $2 OR r.recipient_entity_id = $3))))
          AND ($5::TEXT IS NULL
               OR ($5 = 'sent' AND c.sender_id = $2)
               OR ($5 = 'inbox' AND c.status <> 'draft' AND EXISTS (
                   SELECT 1 FROM communication_recipients r
                   WHERE r.communication_id = c.id
                     AND (r.recipient_user_id = $2 OR r.recipient_entity_id = $3))))
          AND ($6::TEXT IS NULL OR c.status = $6)
        ORDER BY COALESCE(c.sent_at, c.created_at) DESC, c.id DESC
        LIMIT $7 OFFSET $8
        "#,
    )
    .bind(all)
    .bind(viewer_id)
    .bind(viewer_entity)
    .bind(head_entity)
    .bind(mailbox)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((rows, total))
}

/// Replace a draft's content and recipients. Returns None when the
/// communication does not exist or is no longer a draft.
pub async fn update_draft(
    pool: &Pool<Postgres>,
    id: i64,
    req: &CommunicationRequest,
) -> Result<Option<Communication>, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let row = sqlx::query_as::<_, Communication>(
        r#"
        UPDATE communications SET
            title = $2,
            body = $3,
            channel = $4,
            updated_at = NOW()
        WHERE id = $1 AND status = 'draft'
        RETURNING id, title, body, channel, sender_id, status, sent_at, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(req.title.trim())
    .bind(&req.body)
    .bind(req.channel.as_str())
    .fetch_optional(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let Some(communication) = row else {
        return Ok(None);
    };

    sqlx::query("DELETE FROM communication_recipients WHERE communication_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    insert_recipients(&mut tx, id, req).await?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(Some(communication))
}

/// Delete a draft. Returns false when it does not exist or was already sent.
pub async fn delete_draft(pool: &Pool<Postgres>, id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM communications WHERE id = $1 AND status = 'draft'")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}

/// Store the outcome of one recipient's delivery.
pub async fn set_recipient_outcome(
    pool: &Pool<Postgres>,
    recipient_id: i64,
    status: DeliveryStatus,
    channel: Option<Channel>,
    error: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE communication_recipients
        SET delivery_status = $2, delivered_channel = $3, error = $4
        WHERE id = $1
        "#,
    )
    .bind(recipient_id)
    .bind(status.as_str())
    .bind(channel.map(|c| c.as_str()))
    .bind(error)
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Move a draft to `sending`. Only one caller can win the claim; `None`
/// means the communication is missing or no longer a draft.
pub async fn claim_for_dispatch(
    pool: &Pool<Postgres>,
    id: i64,
) -> Result<Option<Communication>, AppError> {
    sqlx::query_as::<_, Communication>(
        r#"
        UPDATE communications
        SET status = 'sending', updated_at = NOW()
        WHERE id = $1 AND status = 'draft'
        RETURNING id, title, body, channel, sender_id, status, sent_at, created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Store the final status of a claimed dispatch and stamp `sent_at`.
/// Returns false when the row was not in `sending`.
pub async fn mark_dispatched(
    pool: &Pool<Postgres>,
    id: i64,
    status: CommunicationStatus,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE communications
        SET status = $2, sent_at = NOW(), updated_at = NOW()
        WHERE id = $1 AND status = 'sending'
        "#,
    )
    .bind(id)
    .bind(status.as_str())
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}

/// Mark the recipient rows matching a user (directly or through their
/// entity) as read, along with the user's notifications for it.
/// Returns how many recipient rows matched.
pub async fn mark_read(
    pool: &Pool<Postgres>,
    communication_id: i64,
    user_id: i64,
    entity_id: Option<i64>,
) -> Result<u64, AppError> {
    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let result = sqlx::query(
        r#"
        UPDATE communication_recipients
        SET read_at = COALESCE(read_at, NOW())
        WHERE communication_id = $1
          AND (recipient_user_id = $2 OR recipient_entity_id = $3)
        "#,
    )
    .bind(communication_id)
    .bind(user_id)
    .bind(entity_id)
    .execute(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    sqlx::query(
        r#"
        UPDATE notifications SET read_at = NOW()
        WHERE communication_id = $1 AND user_id = $2 AND read_at IS NULL
        "#,
    )
    .bind(communication_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

pub async fn create_attachment(
    pool: &Pool<Postgres>,
    id: Uuid,
    communication_id: i64,
    file_name: &str,
    content_type: &str,
    size_bytes: i64,
    storage_key: &str,
) -> Result<CommunicationAttachment, AppError> {
    let row = sqlx::query_as::<_, CommunicationAttachment>(
        r#"
        INSERT INTO communication_attachments
            (id, communication_id, file_name, content_type, size_bytes, storage_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, communication_id, file_name, content_type, size_bytes, storage_key,
                  uploaded, created_at
        "#,
    )
    .bind(id)
    .bind(communication_id)
    .bind(file_name)
    .bind(content_type)
    .bind(size_bytes)
    .bind(storage_key)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn list_attachments(
    pool: &Pool<Postgres>,
    communication_id: i64,
) -> Result<Vec<CommunicationAttachment>, AppError> {
    let rows = sqlx::query_as::<_, CommunicationAttachment>(
        r#"
        SELECT id, communication_id, file_name, content_type, size_bytes, storage_key,
               uploaded, created_at
        FROM communication_attachments
        WHERE communication_id = $1
        ORDER BY created_at, file_name
        "#,
    )
    .bind(communication_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(rows)
}

pub async fn find_attachment(
    pool: &Pool<Postgres>,
    communication_id: i64,
    attachment_id: Uuid,
) -> Result<Option<CommunicationAttachment>, AppError> {
    let row = sqlx::query_as::<_, CommunicationAttachment>(
        r#"
        SELECT id, communication_id, file_name, content_type, size_bytes, storage_key,
               uploaded, created_at
        FROM communication_attachments
        WHERE communication_id = $1 AND id = $2
        "#,
    )
    .bind(communication_id)
    .bind(attachment_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn mark_attachment_uploaded(
    pool: &Pool<Postgres>,
    attachment_id: Uuid,
    size_bytes: i64,
) -> Result<Option<CommunicationAttachment>, AppError> {
    let row = sqlx::query_as::<_, CommunicationAttachment>(
        r#"
        UPDATE communication_attachments SET uploaded = TRUE, size_bytes = $2
        WHERE id = $1
        RETURNING id, communication_id, file_name, content_type, size_bytes, storage_key,
                  uploaded, created_at
        "#,
    )
    .bind(attachment_id)
    .bind(size_bytes)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row)
}

pub async fn delete_attachment(pool: &Pool<Postgres>, attachment_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM communication_attachments WHERE id = $1")
        .bind(attachment_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    Ok(result.rows_affected() > 0)
}
