use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "validation")]
use validator::Validate;

/// Activity counter a badge is measured against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    TasksCompleted,
    MeetingsAttended,
    CommunicationsSent,
    HearingsHeld,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::TasksCompleted => "tasks_completed",
            Criterion::MeetingsAttended => "meetings_attended",
            Criterion::CommunicationsSent => "communications_sent",
            Criterion::HearingsHeld => "hearings_held",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tasks_completed" => Some(Criterion::TasksCompleted),
            "meetings_attended" => Some(Criterion::MeetingsAttended),
            "communications_sent" => Some(Criterion::CommunicationsSent),
            "hearings_held" => Some(Criterion::HearingsHeld),
            _ => None,
        }
    }
}

/// Per-user activity counters used for badge evaluation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ActivityCounters {
    pub tasks_completed: i64,
    pub meetings_attended: i64,
    pub communications_sent: i64,
    pub hearings_held: i64,
}

impl ActivityCounters {
    pub fn value(&self, criterion: Criterion) -> i64 {
        match criterion {
            Criterion::TasksCompleted => self.tasks_completed,
            Criterion::MeetingsAttended => self.meetings_attended,
            Criterion::CommunicationsSent => self.communications_sent,
            Criterion::HearingsHeld => self.hearings_held,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Badge {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub criterion: String,
    pub threshold: i32,
    pub created_at: DateTime<Utc>,
}

impl Badge {
    /// Whether `counters` reach this badge's threshold. Badges with an
    /// unknown criterion are never earned.
    pub fn is_earned_by(&self, counters: &ActivityCounters) -> bool {
        Criterion::parse(&self.criterion)
            .map(|c| counters.value(c) >= i64::from(self.threshold))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BadgeResponse {
    pub id: i64,
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub criterion: Option<Criterion>,
    pub threshold: i32,
}

impl From<Badge> for BadgeResponse {
    fn from(b: Badge) -> Self {
        Self {
            criterion: Criterion::parse(&b.criterion),
            id: b.id,
            code: b.code,
            name: b.name,
            description: b.description,
            icon: b.icon,
            threshold: b.threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct BadgeRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 2, max = 60, message = "Code must be between 2 and 60 characters"))
    )]
    pub code: String,
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 1, max = 120, message = "Name is required"))
    )]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    pub criterion: Criterion,
    #[cfg_attr(
        feature = "validation",
        validate(range(min = 1, message = "Threshold must be positive"))
    )]
    pub threshold: i32,
}

/// A badge held by a user, joined with the badge definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct UserBadge {
    pub badge_id: i64,
    pub code: String,
    pub name: String,
    pub icon: Option<String>,
    pub awarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserAchievementsResponse {
    pub user_id: i64,
    pub counters: ActivityCounters,
    pub badges: Vec<UserBadge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EvaluateResponse {
    pub user_id: i64,
    pub awarded: Vec<BadgeResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub display_name: String,
    pub entity_id: Option<i64>,
    pub badge_count: i64,
}
