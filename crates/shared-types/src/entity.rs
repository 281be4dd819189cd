use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "validation")]
use validator::Validate;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Kind of government unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Secretariat,
    Council,
    Association,
    Department,
    Agency,
    #[default]
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Secretariat => "secretariat",
            EntityType::Council => "council",
            EntityType::Association => "association",
            EntityType::Department => "department",
            EntityType::Agency => "agency",
            EntityType::Other => "other",
        }
    }

    /// Strict parse used for request validation and CSV import. Accepts the
    /// Portuguese labels used in municipal spreadsheets as aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "secretariat" | "secretaria" => Some(EntityType::Secretariat),
            "council" | "conselho" => Some(EntityType::Council),
            "association" | "associacao" | "associação" => Some(EntityType::Association),
            "department" | "departamento" => Some(EntityType::Department),
            "agency" | "autarquia" | "orgao" | "órgão" => Some(EntityType::Agency),
            "other" | "outro" | "outra" => Some(EntityType::Other),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Domain Struct
// ---------------------------------------------------------------------------

/// A government unit that owns users, tasks and public hearings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "server", derive(sqlx::FromRow))]
pub struct Entity {
    pub id: i64,
    pub name: String,
    pub acronym: Option<String>,
    pub entity_type: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub address: Option<String>,
    pub responsible_name: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Request/Response DTOs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityResponse {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acronym: Option<String>,
    pub entity_type: EntityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responsible_name: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Entity> for EntityResponse {
    fn from(e: Entity) -> Self {
        Self {
            id: e.id,
            name: e.name,
            acronym: e.acronym,
            entity_type: EntityType::parse(&e.entity_type).unwrap_or_default(),
            email: e.email,
            phone: e.phone,
            whatsapp: e.whatsapp,
            telegram_chat_id: e.telegram_chat_id,
            address: e.address,
            responsible_name: e.responsible_name,
            active: e.active,
            created_at: e.created_at.to_rfc3339(),
            updated_at: e.updated_at.to_rfc3339(),
        }
    }
}

/// Request body for creating or replacing an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[cfg_attr(feature = "validation", derive(Validate))]
pub struct EntityRequest {
    #[cfg_attr(
        feature = "validation",
        validate(length(min = 2, max = 200, message = "Name must be between 2 and 200 characters"))
    )]
    pub name: String,
    #[serde(default)]
    pub acronym: Option<String>,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default)]
    #[cfg_attr(feature = "validation", validate(email(message = "Valid email is required")))]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub responsible_name: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Per-entity counters shown on the entity detail screen.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityStats {
    pub entity_id: i64,
    pub user_count: i64,
    pub open_tasks: i64,
    pub completed_tasks: i64,
    pub scheduled_hearings: i64,
    pub held_hearings: i64,
}

/// Query parameters for entity search.
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::IntoParams))]
#[cfg_attr(feature = "openapi", into_params(parameter_in = Query))]
pub struct EntityListParams {
    pub q: Option<String>,
    pub entity_type: Option<EntityType>,
    pub active: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
