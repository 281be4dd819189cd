//! Bulk import of entities and users from spreadsheet exports.
//!
//! Rows are validated up front; invalid rows end up in the report while the
//! valid ones are inserted in a single transaction. Generated passwords are
//! returned once in the report and never stored in clear.

pub mod parse;
pub mod username;

use std::collections::HashSet;

use shared_types::{AppError, GeneratedCredential, ImportReport, UserRole};
use sqlx::{Pool, Postgres};

use crate::auth::password::{generate_password, hash_password};
use crate::error_convert::SqlxErrorExt;
use crate::repo::user::NewUser;
use username::UsernamePool;

fn hash_generated(password: &str) -> Result<String, AppError> {
    hash_password(password).map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))
}

/// Import entities. Names already present (case-insensitive), in the
/// database or earlier in the file, are skipped. With `create_heads` every
/// new entity also gets an `entity_head` account.
#[tracing::instrument(skip(pool, csv_text), fields(bytes = csv_text.len()))]
pub async fn import_entities(
    pool: &Pool<Postgres>,
    csv_text: &str,
    create_heads: bool,
) -> Result<ImportReport, AppError> {
    let table = parse::read_table(csv_text)?;
    let (rows, errors) = parse::entity_rows(&table)?;
    let mut report = ImportReport {
        errors,
        ..Default::default()
    };

    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let mut names: HashSet<String> = crate::repo::entity::existing_names(&mut tx)
        .await?
        .into_iter()
        .collect();
    let mut usernames = UsernamePool::default();
    let mut emails: HashSet<String> = HashSet::new();
    if create_heads {
        usernames = UsernamePool::new(crate::repo::user::all_usernames(&mut tx).await?);
        emails = crate::repo::user::all_emails(&mut tx).await?.into_iter().collect();
    }

    for row in rows {
        if !names.insert(row.name.to_lowercase()) {
            report.skipped += 1;
            continue;
        }

        let entity = crate::repo::entity::insert(&mut tx, &row.to_request()).await?;
        report.created += 1;

        if create_heads {
            let display_name = row.responsible.clone().unwrap_or_else(|| entity.name.clone());
            let username = usernames.allocate(&display_name);
            let password = generate_password();
            let password_hash = hash_generated(&password)?;
            // The entity mailbox only becomes the head's login when no one uses it yet.
            let email = row.email.as_deref().filter(|e| emails.insert(e.to_string()));

            crate::repo::user::insert(
                &mut tx,
                &NewUser {
                    username: &username,
                    email,
                    password_hash: &password_hash,
                    display_name: &display_name,
                    role: UserRole::EntityHead,
                    entity_id: Some(entity.id),
                    phone: row.phone.as_deref(),
                    whatsapp: row.whatsapp.as_deref(),
                    telegram_chat_id: None,
                },
            )
            .await?;

            report.credentials.push(GeneratedCredential {
                username,
                password,
                display_name,
                entity_id: entity.id,
            });
        }
    }

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;

    tracing::info!(
        created = report.created,
        skipped = report.skipped,
        errors = report.errors.len(),
        heads = report.credentials.len(),
        "Entity import finished"
    );
    Ok(report)
}

/// Import users into one entity. Rows whose email already exists are
/// skipped. Head rows are rejected unless `allow_heads` is set.
#[tracing::instrument(skip(pool, csv_text), fields(bytes = csv_text.len()))]
pub async fn import_users(
    pool: &Pool<Postgres>,
    entity_id: i64,
    csv_text: &str,
    allow_heads: bool,
) -> Result<ImportReport, AppError> {
    let table = parse::read_table(csv_text)?;
    let (rows, errors) = parse::user_rows(&table)?;
    let mut report = ImportReport {
        errors,
        ..Default::default()
    };

    let mut tx = pool.begin().await.map_err(SqlxErrorExt::into_app_error)?;

    let mut usernames = UsernamePool::new(crate::repo::user::all_usernames(&mut tx).await?);
    let mut emails: HashSet<String> = crate::repo::user::all_emails(&mut tx)
        .await?
        .into_iter()
        .collect();

    for row in rows {
        if row.role == UserRole::EntityHead && !allow_heads {
            report.push_error(row.line, "Entity heads can only import members");
            continue;
        }
        if let Some(email) = &row.email {
            if !emails.insert(email.clone()) {
                report.skipped += 1;
                continue;
            }
        }

        let username = usernames.allocate(&row.name);
        let password = generate_password();
        let password_hash = hash_generated(&password)?;

        crate::repo::user::insert(
            &mut tx,
            &NewUser {
                username: &username,
                email: row.email.as_deref(),
                password_hash: &password_hash,
                display_name: &row.name,
                role: row.role,
                entity_id: Some(entity_id),
                phone: row.phone.as_deref(),
                whatsapp: row.whatsapp.as_deref(),
                telegram_chat_id: None,
            },
        )
        .await?;

        report.created += 1;
        report.credentials.push(GeneratedCredential {
            username,
            password,
            display_name: row.name,
            entity_id,
        });
    }

    tx.commit().await.map_err(SqlxErrorExt::into_app_error)?;

    report.errors.sort_by_key(|e| e.line);
    tracing::info!(
        entity_id,
        created = report.created,
        skipped = report.skipped,
        errors = report.errors.len(),
        "User import finished"
    );
    Ok(report)
}
