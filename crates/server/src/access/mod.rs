//! Per-resource access control.
//!
//! Every check runs in two steps: [`load_facts`] looks up who owns the
//! target, then [`policy::permits`] decides. Handlers call [`authorize`].

pub mod policy;

pub use policy::{permits, Action, Actor, Facts, ListScope};

use shared_types::{AppError, UserRole};
use sqlx::{Pool, Postgres};

use crate::error_convert::SqlxErrorExt;

/// A reference to a protected resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Entity(i64),
    User(i64),
    Subject(i64),
    Meeting(i64),
    Task(i64),
    Communication(i64),
    Hearing(i64),
}

impl Resource {
    /// Lowercase resource name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Entity(_) => "entity",
            Resource::User(_) => "user",
            Resource::Subject(_) => "subject",
            Resource::Meeting(_) => "meeting",
            Resource::Task(_) => "task",
            Resource::Communication(_) => "communication",
            Resource::Hearing(_) => "hearing",
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Resource::Entity(id)
            | Resource::User(id)
            | Resource::Subject(id)
            | Resource::Meeting(id)
            | Resource::Task(id)
            | Resource::Communication(id)
            | Resource::Hearing(id) => *id,
        }
    }

    fn not_found(&self) -> AppError {
        let name = self.name();
        let mut title = name.to_string();
        if let Some(first) = title.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        AppError::not_found(format!("{} {} not found", title, self.id()))
    }
}

/// Load the ownership facts of `resource`. `Ok(None)` when it does not exist.
pub async fn load_facts(
    pool: &Pool<Postgres>,
    resource: Resource,
) -> Result<Option<Facts>, AppError> {
    let facts = match resource {
        Resource::Entity(id) => sqlx::query_scalar::<_, i64>("SELECT id FROM entities WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?
            .map(|entity_id| Facts::Entity { entity_id }),

        Resource::User(id) => {
            sqlx::query_as::<_, (i64, Option<i64>, String)>(
                "SELECT id, entity_id, role FROM users WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?
            .map(|(user_id, entity_id, role)| Facts::User {
                user_id,
                entity_id,
                role: UserRole::from_str_or_default(&role),
            })
        }

        Resource::Subject(id) => {
            sqlx::query_as::<_, (i64, Option<i64>)>(
                r#"
                SELECT s.created_by, u.entity_id
                FROM subjects s
                JOIN users u ON u.id = s.created_by
                WHERE s.id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?
            .map(|(created_by, creator_entity_id)| Facts::Subject {
                created_by,
                creator_entity_id,
            })
        }

        Resource::Meeting(id) => {
            let row = sqlx::query_as::<_, (i64, Option<i64>)>(
                r#"
                SELECT m.organizer_id, u.entity_id
                FROM meetings m
                JOIN users u ON u.id = m.organizer_id
                WHERE m.id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;

            match row {
                Some((organizer_id, organizer_entity_id)) => {
                    let participant_ids = sqlx::query_scalar::<_, i64>(
                        "SELECT user_id FROM meeting_participants WHERE meeting_id = $1",
                    )
                    .bind(id)
                    .fetch_all(pool)
                    .await
                    .map_err(SqlxErrorExt::into_app_error)?;
                    Some(Facts::Meeting {
                        organizer_id,
                        organizer_entity_id,
                        participant_ids,
                    })
                }
                None => None,
            }
        }

        Resource::Task(id) => {
            sqlx::query_as::<_, (i64, Option<i64>, i64)>(
                "SELECT entity_id, assigned_to, created_by FROM tasks WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?
            .map(|(entity_id, assigned_to, created_by)| Facts::Task {
                entity_id,
                assigned_to,
                created_by,
            })
        }

        Resource::Communication(id) => {
            let row = sqlx::query_as::<_, (i64, Option<i64>, String)>(
                r#"
                SELECT c.sender_id, u.entity_id, c.status
                FROM communications c
                JOIN users u ON u.id = c.sender_id
                WHERE c.id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;

            match row {
                Some((sender_id, sender_entity_id, status)) => {
                    let recipients = sqlx::query_as::<_, (Option<i64>, Option<i64>)>(
                        r#"
                        SELECT recipient_user_id, recipient_entity_id
                        FROM communication_recipients
                        WHERE communication_id = $1
                        "#,
                    )
                    .bind(id)
                    .fetch_all(pool)
                    .await
                    .map_err(SqlxErrorExt::into_app_error)?;

                    Some(Facts::Communication {
                        sender_id,
                        sender_entity_id,
                        draft: status == "draft",
                        recipient_user_ids: recipients.iter().filter_map(|r| r.0).collect(),
                        recipient_entity_ids: recipients.iter().filter_map(|r| r.1).collect(),
                    })
                }
                None => None,
            }
        }

        Resource::Hearing(id) => {
            sqlx::query_scalar::<_, i64>("SELECT entity_id FROM public_hearings WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(SqlxErrorExt::into_app_error)?
                .map(|entity_id| Facts::Hearing { entity_id })
        }
    };

    Ok(facts)
}

/// Load the facts of `resource` and check `action` against them.
///
/// Missing target → 404; denied → 403 naming the resource kind.
pub async fn authorize(
    pool: &Pool<Postgres>,
    actor: &Actor,
    action: Action,
    resource: Resource,
) -> Result<(), AppError> {
    let facts = load_facts(pool, resource)
        .await?
        .ok_or_else(|| resource.not_found())?;

    if permits(actor, action, &facts) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = actor.user_id,
            role = actor.role.as_str(),
            ?action,
            resource = resource.name(),
            id = resource.id(),
            "Access denied"
        );
        Err(AppError::access_denied(resource.name()))
    }
}
