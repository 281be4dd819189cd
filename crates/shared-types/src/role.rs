use serde::{Deserialize, Serialize};

/// Three-tier role hierarchy controlling access scope.
///
/// - `EntityMember`: sees only themselves and the items assigned to or created by them.
/// - `EntityHead`: sees everything belonging to their entity.
/// - `MasterImplementer`: global access (superset of all roles).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    EntityMember,
    EntityHead,
    MasterImplementer,
}

impl UserRole {
    /// Parse from the JWT `role` claim or a database column. Unknown values
    /// default to the least privileged role.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    /// Strict parse. Accepts the canonical names plus the short CSV aliases
    /// `member`, `head` and `master`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "entity_member" | "member" => Some(UserRole::EntityMember),
            "entity_head" | "head" => Some(UserRole::EntityHead),
            "master_implementer" | "master" => Some(UserRole::MasterImplementer),
            _ => None,
        }
    }

    /// Lowercase string for database / JWT storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::EntityMember => "entity_member",
            UserRole::EntityHead => "entity_head",
            UserRole::MasterImplementer => "master_implementer",
        }
    }

    /// Numeric rank for role comparison.
    pub fn rank(&self) -> u8 {
        match self {
            UserRole::EntityMember => 1,
            UserRole::EntityHead => 2,
            UserRole::MasterImplementer => 3,
        }
    }

    /// Returns true if this role satisfies the `required` role.
    pub fn satisfies(&self, required: &UserRole) -> bool {
        self.rank() >= required.rank()
    }

    /// Heads and members are always attached to an entity.
    pub fn requires_entity(&self) -> bool {
        !matches!(self, UserRole::MasterImplementer)
    }

    pub fn label(&self) -> &'static str {
        match self {
            UserRole::EntityMember => "Entity member",
            UserRole::EntityHead => "Entity head",
            UserRole::MasterImplementer => "Master implementer",
        }
    }
}
