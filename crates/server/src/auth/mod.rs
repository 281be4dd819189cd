pub mod extractors;
pub mod jwt;
pub mod middleware;
pub mod password;

use shared_types::{User, UserRole};

/// Check if the given email matches the `MASTER_EMAIL` env var (case-insensitive).
/// Returns `false` if the env var is empty or unset.
pub fn is_master_email(email: &str) -> bool {
    match std::env::var("MASTER_EMAIL") {
        Ok(master) if !master.is_empty() => master.eq_ignore_ascii_case(email),
        _ => false,
    }
}

/// If the user's email matches `MASTER_EMAIL`, promote them to master
/// implementer. DB errors are non-fatal: the user is returned unchanged.
pub async fn maybe_promote_master(db: &sqlx::PgPool, user: User) -> User {
    let Some(email) = user.email.as_deref() else {
        return user;
    };
    if !is_master_email(email) || user.user_role() == UserRole::MasterImplementer {
        return user;
    }

    match crate::repo::user::set_role(db, user.id, UserRole::MasterImplementer, user.entity_id).await {
        Ok(Some(promoted)) => {
            tracing::info!(user_id = user.id, "Auto-promoted user to master implementer via MASTER_EMAIL");
            promoted
        }
        Ok(None) => user,
        Err(e) => {
            tracing::error!(user_id = user.id, error = %e, "Failed to auto-promote master implementer");
            user
        }
    }
}
