//! Pure authorization rules. No I/O: callers load the ownership [`Facts`]
//! of the target first and ask [`permits`] for a verdict.

use shared_types::UserRole;

use crate::auth::jwt::Claims;

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: i64,
    pub role: UserRole,
    pub entity_id: Option<i64>,
}

impl From<&Claims> for Actor {
    fn from(c: &Claims) -> Self {
        Self {
            user_id: c.sub,
            role: c.user_role(),
            entity_id: c.entity_id,
        }
    }
}

impl Actor {
    pub fn is_master(&self) -> bool {
        self.role == UserRole::MasterImplementer
    }

    /// Member (any role) of the given entity.
    pub fn belongs_to(&self, entity_id: i64) -> bool {
        self.entity_id == Some(entity_id)
    }

    /// Entity head of the given entity. `None` never matches.
    pub fn is_head_of(&self, entity_id: Option<i64>) -> bool {
        self.role == UserRole::EntityHead
            && entity_id.is_some()
            && self.entity_id == entity_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    /// Update or delete.
    Manage,
    /// Create something inside the target (only meaningful for entities).
    Create,
    /// Status transitions and administrative toggles.
    UpdateStatus,
}

/// Ownership facts of a resource, as loaded from the database.
#[derive(Debug, Clone, PartialEq)]
pub enum Facts {
    Entity {
        entity_id: i64,
    },
    User {
        user_id: i64,
        entity_id: Option<i64>,
        role: UserRole,
    },
    Subject {
        created_by: i64,
        creator_entity_id: Option<i64>,
    },
    Meeting {
        organizer_id: i64,
        organizer_entity_id: Option<i64>,
        participant_ids: Vec<i64>,
    },
    Task {
        entity_id: i64,
        assigned_to: Option<i64>,
        created_by: i64,
    },
    Communication {
        sender_id: i64,
        sender_entity_id: Option<i64>,
        draft: bool,
        recipient_user_ids: Vec<i64>,
        recipient_entity_ids: Vec<i64>,
    },
    Hearing {
        entity_id: i64,
    },
}

/// Decide whether `actor` may perform `action` on a resource with `facts`.
pub fn permits(actor: &Actor, action: Action, facts: &Facts) -> bool {
    if actor.is_master() {
        return true;
    }

    match facts {
        Facts::Entity { entity_id } => match action {
            Action::View | Action::Create => actor.belongs_to(*entity_id),
            Action::Manage | Action::UpdateStatus => actor.is_head_of(Some(*entity_id)),
        },

        Facts::User {
            user_id,
            entity_id,
            role,
        } => {
            let is_self = actor.user_id == *user_id;
            let heads_member = actor.is_head_of(*entity_id) && *role == UserRole::EntityMember;
            match action {
                Action::View => is_self || actor.is_head_of(*entity_id),
                Action::Manage => is_self || heads_member,
                Action::UpdateStatus => !is_self && heads_member,
                Action::Create => false,
            }
        }

        Facts::Subject {
            created_by,
            creator_entity_id,
        } => match action {
            Action::View => true,
            Action::Manage | Action::UpdateStatus => {
                actor.user_id == *created_by || actor.is_head_of(*creator_entity_id)
            }
            Action::Create => false,
        },

        Facts::Meeting {
            organizer_id,
            organizer_entity_id,
            participant_ids,
        } => {
            let manages = actor.user_id == *organizer_id || actor.is_head_of(*organizer_entity_id);
            match action {
                Action::View => manages || participant_ids.contains(&actor.user_id),
                Action::Manage | Action::UpdateStatus => manages,
                Action::Create => false,
            }
        }

        Facts::Task {
            entity_id,
            assigned_to,
            created_by,
        } => {
            let manages = actor.user_id == *created_by || actor.is_head_of(Some(*entity_id));
            let assignee = *assigned_to == Some(actor.user_id);
            match action {
                Action::View | Action::UpdateStatus => manages || assignee,
                Action::Manage => manages,
                Action::Create => false,
            }
        }

        Facts::Communication {
            sender_id,
            sender_entity_id,
            draft,
            recipient_user_ids,
            recipient_entity_ids,
        } => {
            let is_sender = actor.user_id == *sender_id;
            let heads_sender = actor.is_head_of(*sender_entity_id);
            match action {
                Action::View => {
                    let recipient = recipient_user_ids.contains(&actor.user_id)
                        || actor
                            .entity_id
                            .map(|e| recipient_entity_ids.contains(&e))
                            .unwrap_or(false);
                    // Recipients only see a communication once it is sent.
                    is_sender || heads_sender || (recipient && !*draft)
                }
                Action::Manage => (is_sender && *draft) || heads_sender,
                Action::UpdateStatus => is_sender || heads_sender,
                Action::Create => false,
            }
        }

        Facts::Hearing { entity_id } => match action {
            Action::View => true,
            Action::Manage | Action::UpdateStatus => actor.is_head_of(Some(*entity_id)),
            Action::Create => false,
        },
    }
}

/// Row filter applied to list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    All,
    Entity(i64),
    User(i64),
}

impl ListScope {
    pub fn for_actor(actor: &Actor) -> Self {
        match (actor.role, actor.entity_id) {
            (UserRole::MasterImplementer, _) => ListScope::All,
            (UserRole::EntityHead, Some(entity_id)) => ListScope::Entity(entity_id),
            _ => ListScope::User(actor.user_id),
        }
    }

    /// Value for a nullable `$n::BIGINT` entity filter parameter.
    pub fn entity_filter(&self) -> Option<i64> {
        match self {
            ListScope::Entity(id) => Some(*id),
            _ => None,
        }
    }

    /// Value for a nullable `$n::BIGINT` user filter parameter.
    pub fn user_filter(&self) -> Option<i64> {
        match self {
            ListScope::User(id) => Some(*id),
            _ => None,
        }
    }

    /// `(entity, viewer)` filter pair for meetings and tasks. Heads also see
    /// rows they organize, create or are assigned to outside their entity.
    pub fn with_viewer(&self, viewer_id: i64) -> (Option<i64>, Option<i64>) {
        match self {
            ListScope::All => (None, None),
            ListScope::Entity(id) => (Some(*id), Some(viewer_id)),
            ListScope::User(id) => (None, Some(*id)),
        }
    }
}
