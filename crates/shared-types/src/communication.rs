use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "validation")]
use validator::Validate;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Delivery channel of a communication.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Whatsapp,
    Telegram,
    /// In-app notification only.
    #[default]
    System,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Whatsapp => "whatsapp",
            Channel::Telegram => "telegram",
            Channel::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email" => Some(Channel::Email),
            "whatsapp" => Some(Channel::Whatsapp),
            "telegram" => Some(Channel::Telegram),
            "system" => Some(Channel::System),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum CommunicationStatus {
    #[default]
    Draft,
    /// Claimed by a dispatch that has not finished yet.
    Sending,
    Sent,
    PartiallySent,
    Failed,
}

impl CommunicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommunicationStatus::Draft => "draft",
            CommunicationStatus::Sending => "sending",
            CommunicationStatus::Sent => "sent",
            CommunicationStatus::PartiallySent => "partially_sent",
            CommunicationStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(CommunicationStatus::Draft),
            "sending" => Some(CommunicationStatus::Sending),
            "sent" => Some(CommunicationStatus::Sent),
            "partially_sent" => Some(CommunicationStatus::PartiallySent),
            "failed" => Some(CommunicationStatus::Failed),
            _ => None,
        }
    }

    /// Final status after dispatching to `total` recipients of which
    /// `delivered` succeeded.
    pub fn from_delivery_counts(delivered: usize, total: usize) -> Self {
        if total > 0 && delivered == total {
            CommunicationStatus::Sent
        } else if delivered > 0 {
            CommunicationStatus::PartiallySent
        } else {
            CommunicationStatus::Failed
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivered => "delivered",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(DeliveryStatus::Pending),
            "delivered" => Some(DeliveryStatus::Delivered),
            "failed" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain Structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Communication {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub channel: String,
    pub sender_id: i64,
    pub status: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Communication {
    pub fn communication_status(&self) -> CommunicationStatus {
        CommunicationStatus::parse(&self.status).unwrap_or_default()
    }

    pub fn channel_kind(&self) -> Channel {
        Channel::parse(&self.channel).unwrap_or_default()
    }
}

/// One addressee of a communication: either a user or an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct CommunicationRecipient {
    pub id: i64,
    pub communication_id: i64,
    pub recipient_user_id: Option<i64>,
    pub recipient_entity_id: Option<i64>,
    pub delivery_status: String,
    pub delivered_channel: Option<String>,
    pub error: Option<String>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct CommunicationAttachment {
    pub id: Uuid,
    pub communication_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub uploaded: bool,
    pub created_at: DateTime<Utc>,
}

/// In-app notification generated for every communication recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub communication_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request/Response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RecipientResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    pub delivery_status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivered_channel: Option<Channel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<String>,
}

impl From<CommunicationRecipient> for RecipientResponse {
    fn from(r: CommunicationRecipient) -> Self {
        Self {
            user_id: r.recipient_user_id,
            entity_id: r.recipient_entity_id,
            delivery_status: DeliveryStatus::parse(&r.delivery_status).unwrap_or_default(),
            delivered_channel: r.delivered_channel.as_deref().and_then(Channel::parse),
            error: r.error,
            read_at: r.read_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct AttachmentResponse {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded: bool,
    pub created_at: String,
}

impl From<CommunicationAttachment> for AttachmentResponse {
    fn from(a: CommunicationAttachment) -> Self {
        Self {
            id: a.id.to_string(),
            file_name: a.file_name,
            content_type: a.content_type,
            size_bytes: a.size_bytes,
            uploaded: a.uploaded,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CommunicationResponse {
    pub id: i64,
    pub title: String,
    pub body: String,
    pub channel: Channel,
    pub sender_id: i64,
    pub status: CommunicationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
    #[serde(default)]
    pub recipients: Vec<RecipientResponse>,
    #[serde(default)]
    pub attachments: Vec<AttachmentResponse>,
    pub created_at: String,
}

impl CommunicationResponse {
    pub fn detailed(
        c: Communication,
        recipients: Vec<CommunicationRecipient>,
        attachments: Vec<CommunicationAttachment>,
    ) -> Self {
        let mut resp = Self::from(c);
        resp.recipients = recipients.into_iter().map(RecipientResponse::from).collect();
        resp.attachments = attachments.into_iter().map(AttachmentResponse::from).collect();
        resp
    }
}

impl From<Communication> for CommunicationResponse {
    fn from(c: Communication) -> Self {
        Self {
            channel: c.channel_kind(),
            status: c.communication_status(),
            id: c.id,
            title: c.title,
            body: c.body,
            sender_id: c.sender_id,
            sent_at: c.sent_at.map(|t| t.to_rfc3339()),
            recipients: Vec::new(),
            attachments: Vec::new(),
            created_at: c.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CommunicationRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))
    )]
    pub title: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, message = "Message body is required"))
    )]
    pub body: String,
    #[serde(default)]
    pub channel: Channel,
    #[serde(default)]
    pub recipient_user_ids: Vec<i64>,
    #[serde(default)]
    pub recipient_entity_ids: Vec<i64>,
}

impl CommunicationRequest {
    pub fn has_recipients(&self) -> bool {
        !self.recipient_user_ids.is_empty() || !self.recipient_entity_ids.is_empty()
    }
}

/// Result of dispatching a communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DispatchSummary {
    pub communication_id: i64,
    pub status: CommunicationStatus,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct CreateAttachmentRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 255, message = "File name is required"))
    )]
    pub file_name: String,
    pub content_type: String,
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1, message = "File size must be positive"))
    )]
    pub size_bytes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateAttachmentResponse {
    pub attachment: AttachmentResponse,
    pub upload_url: String,
    pub required_headers: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DownloadUrlResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct NotificationResponse {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub communication_id: Option<i64>,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: String,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            communication_id: n.communication_id,
            title: n.title,
            body: n.body,
            read: n.read_at.is_some(),
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Which side of a communication the caller is on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Mailbox {
    Sent,
    Inbox,
}

impl Mailbox {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mailbox::Sent => "sent",
            Mailbox::Inbox => "inbox",
        }
    }
}

/// Query parameters for communication listing. Without `box` the caller's
/// full scope is listed.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct CommunicationListParams {
    #[serde(rename = "box")]
    pub mailbox: Option<Mailbox>,
    pub status: Option<CommunicationStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct NotificationListParams {
    #[serde(default)]
    pub unread: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
