use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "validation")]
use validator::Validate;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum HearingStatus {
    #[default]
    Scheduled,
    Held,
    Cancelled,
}

impl HearingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HearingStatus::Scheduled => "scheduled",
            HearingStatus::Held => "held",
            HearingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(HearingStatus::Scheduled),
            "held" => Some(HearingStatus::Held),
            "cancelled" => Some(HearingStatus::Cancelled),
            _ => None,
        }
    }
}

/// A public hearing organized by an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct PublicHearing {
    pub id: i64,
    pub entity_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub status: String,
    pub attendance_count: Option<i32>,
    pub summary: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct HearingResponse {
    pub id: i64,
    pub entity_id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub scheduled_at: String,
    pub status: HearingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendance_count: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_by: i64,
    pub created_at: String,
}

impl From<PublicHearing> for HearingResponse {
    fn from(h: PublicHearing) -> Self {
        Self {
            id: h.id,
            entity_id: h.entity_id,
            title: h.title,
            description: h.description,
            location: h.location,
            scheduled_at: h.scheduled_at.to_rfc3339(),
            status: HearingStatus::parse(&h.status).unwrap_or_default(),
            attendance_count: h.attendance_count,
            summary: h.summary,
            created_by: h.created_by,
            created_at: h.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct HearingRequest {
    /// Defaults to the caller's entity when omitted.
    #[serde(default)]
    pub entity_id: Option<i64>,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 200, message = "Title is required (max 200 characters)"))
    )]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct HoldHearingRequest {
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 0, message = "Attendance cannot be negative"))
    )]
    pub attendance_count: i32,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Query parameters for hearing search. `upcoming=true` keeps scheduled
/// hearings from now on.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct HearingListParams {
    pub entity_id: Option<i64>,
    pub status: Option<HearingStatus>,
    #[serde(default)]
    pub upcoming: bool,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
