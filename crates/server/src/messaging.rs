//! Multi-channel fan-out for communications.
//!
//! Each recipient is tried on the communication's channel first, then on the
//! remaining external channels in the fixed order email → WhatsApp →
//! Telegram. Every channel is attempted at most once and the first success
//! wins. There are no retries.

use std::collections::HashSet;

use shared_types::{
    AppError, Channel, CommunicationAttachment, CommunicationStatus, DeliveryStatus,
    DispatchSummary, Entity, FeatureFlags, User,
};
use sqlx::{Pool, Postgres};

/// External channels in fallback order.
pub const FALLBACK_ORDER: [Channel; 3] = [Channel::Email, Channel::Whatsapp, Channel::Telegram];

/// Outbound transport for a single channel message.
#[allow(async_fn_in_trait)]
pub trait MessageSender: Send + Sync {
    /// Whether the channel is switched on.
    fn enabled(&self, channel: Channel) -> bool;

    /// Deliver one message. `address` is the channel-specific address.
    async fn send(
        &self,
        channel: Channel,
        address: &str,
        title: &str,
        body: &str,
    ) -> Result<(), String>;
}

/// Production transports, gated by the feature flags read at startup.
#[derive(Debug, Clone, Default)]
pub struct LiveSender {
    flags: FeatureFlags,
}

impl LiveSender {
    pub fn from_flags(flags: &FeatureFlags) -> Self {
        Self {
            flags: flags.clone(),
        }
    }
}

impl MessageSender for LiveSender {
    fn enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.flags.mailgun,
            Channel::Whatsapp => self.flags.whatsapp,
            Channel::Telegram => self.flags.telegram,
            Channel::System => true,
        }
    }

    async fn send(
        &self,
        channel: Channel,
        address: &str,
        title: &str,
        body: &str,
    ) -> Result<(), String> {
        match channel {
            Channel::Email => {
                let html = crate::mailgun::communication_html(title, body);
                crate::mailgun::send_email(address, title, &html).await
            }
            Channel::Whatsapp => {
                crate::twilio::send_whatsapp(address, &format!("*{}*\n\n{}", title, body)).await
            }
            Channel::Telegram => {
                crate::telegram::send_message(address, &format!("{}\n\n{}", title, body)).await
            }
            Channel::System => Ok(()),
        }
    }
}

/// Channel-specific addresses of one recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contact {
    pub email: Option<String>,
    pub whatsapp: Option<String>,
    pub telegram_chat_id: Option<String>,
}

impl Contact {
    /// Address for `channel`, ignoring blank values.
    pub fn address(&self, channel: Channel) -> Option<&str> {
        let value = match channel {
            Channel::Email => self.email.as_deref(),
            Channel::Whatsapp => self.whatsapp.as_deref(),
            Channel::Telegram => self.telegram_chat_id.as_deref(),
            Channel::System => None,
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

impl From<&User> for Contact {
    fn from(u: &User) -> Self {
        Self {
            email: u.email.clone(),
            whatsapp: u.whatsapp.clone(),
            telegram_chat_id: u.telegram_chat_id.clone(),
        }
    }
}

impl From<&Entity> for Contact {
    fn from(e: &Entity) -> Self {
        Self {
            email: e.email.clone(),
            whatsapp: e.whatsapp.clone(),
            telegram_chat_id: e.telegram_chat_id.clone(),
        }
    }
}

/// Attempt order for a communication sent on `preferred`: the preferred
/// channel first, then the rest of [`FALLBACK_ORDER`]. System messages are
/// never sent externally.
pub fn channel_order(preferred: Channel) -> Vec<Channel> {
    if preferred == Channel::System {
        return Vec::new();
    }
    std::iter::once(preferred)
        .chain(FALLBACK_ORDER.into_iter().filter(|c| *c != preferred))
        .collect()
}

/// Addresses already reached during one dispatch, keyed by channel and
/// normalized address.
pub type DeliveredSet = HashSet<(Channel, String)>;

fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Deliver one message to `contact`, walking [`channel_order`].
///
/// Disabled channels and channels the contact has no address for are
/// skipped. A contact whose address was already reached in this dispatch is
/// reported as delivered without sending again. Returns the channel that
/// succeeded, or the last error ("no reachable channel" when nothing was
/// attempted).
pub async fn deliver_to_contact<S: MessageSender>(
    sender: &S,
    contact: &Contact,
    preferred: Channel,
    title: &str,
    body: &str,
    delivered: &mut DeliveredSet,
) -> Result<Channel, String> {
    let mut last_error: Option<String> = None;

    for channel in channel_order(preferred) {
        if !sender.enabled(channel) {
            continue;
        }
        let Some(address) = contact.address(channel) else {
            continue;
        };

        let key = (channel, normalize_address(address));
        if delivered.contains(&key) {
            tracing::debug!(channel = channel.as_str(), "Contact already reached in this dispatch");
            return Ok(channel);
        }

        match sender.send(channel, address, title, body).await {
            Ok(()) => {
                delivered.insert(key);
                return Ok(channel);
            }
            Err(e) => {
                tracing::warn!(channel = channel.as_str(), error = %e, "Channel delivery failed, falling back");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| "no reachable channel".to_string()))
}

/// Message text with download links for uploaded attachments appended.
pub fn compose_body(body: &str, communication_id: i64, attachments: &[CommunicationAttachment]) -> String {
    let uploaded: Vec<&CommunicationAttachment> = attachments.iter().filter(|a| a.uploaded).collect();
    if uploaded.is_empty() {
        return body.to_string();
    }

    let base = crate::config::app_base_url();
    let mut text = format!("{}\n\nAnexos:", body);
    for a in uploaded {
        text.push_str(&format!(
            "\n- {}: {}/api/communications/{}/attachments/{}/download",
            a.file_name, base, communication_id, a.id
        ));
    }
    text
}

/// Dispatch a draft communication to all its recipients.
///
/// The draft is claimed (`draft` to `sending`) before anything is delivered,
/// so concurrent calls get a conflict instead of a second delivery. An error
/// mid-dispatch leaves it in `sending`.
///
/// Updates every recipient row, creates in-app notifications (entity
/// recipients notify every active user of the entity, each user at most
/// once), and stores the final status with `sent_at`.
#[tracing::instrument(skip(pool, sender))]
pub async fn dispatch<S: MessageSender>(
    pool: &Pool<Postgres>,
    sender: &S,
    communication_id: i64,
) -> Result<DispatchSummary, AppError> {
    let Some(communication) =
        crate::repo::communication::claim_for_dispatch(pool, communication_id).await?
    else {
        return match crate::repo::communication::find_by_id(pool, communication_id).await? {
            Some(_) => Err(AppError::conflict("Only draft communications can be sent")),
            None => Err(AppError::not_found(format!(
                "Communication {} not found",
                communication_id
            ))),
        };
    };

    let preferred = communication.channel_kind();
    let recipients = crate::repo::communication::list_recipients(pool, communication_id).await?;
    let attachments = crate::repo::communication::list_attachments(pool, communication_id).await?;
    let body = compose_body(&communication.body, communication_id, &attachments);

    let mut reached = DeliveredSet::new();
    let mut notify: Vec<i64> = Vec::new();
    let mut seen_users: HashSet<i64> = HashSet::new();
    let mut delivered = 0usize;

    for recipient in &recipients {
        let (contact, user_ids) = match (recipient.recipient_user_id, recipient.recipient_entity_id) {
            (Some(user_id), _) => match crate::repo::user::find_by_id(pool, user_id).await? {
                Some(user) if user.active => (Some(Contact::from(&user)), vec![user.id]),
                _ => (None, Vec::new()),
            },
            (None, Some(entity_id)) => match crate::repo::entity::find_by_id(pool, entity_id).await? {
                Some(entity) => (
                    Some(Contact::from(&entity)),
                    crate::repo::user::active_ids_in_entity(pool, entity_id).await?,
                ),
                None => (None, Vec::new()),
            },
            (None, None) => (None, Vec::new()),
        };

        let outcome = match contact {
            None => Err("recipient is inactive or no longer exists".to_string()),
            Some(_) if preferred == Channel::System => {
                if user_ids.is_empty() {
                    Err("no active users to notify".to_string())
                } else {
                    Ok(Channel::System)
                }
            }
            Some(contact) => {
                deliver_to_contact(sender, &contact, preferred, &communication.title, &body, &mut reached)
                    .await
            }
        };

        match &outcome {
            Ok(channel) => {
                delivered += 1;
                crate::repo::communication::set_recipient_outcome(
                    pool,
                    recipient.id,
                    DeliveryStatus::Delivered,
                    Some(*channel),
                    None,
                )
                .await?;
            }
            Err(e) => {
                crate::repo::communication::set_recipient_outcome(
                    pool,
                    recipient.id,
                    DeliveryStatus::Failed,
                    None,
                    Some(e.as_str()),
                )
                .await?;
            }
        }

        for id in user_ids {
            if seen_users.insert(id) {
                notify.push(id);
            }
        }
    }

    crate::repo::notification::create_many(
        pool,
        &notify,
        Some(communication_id),
        &communication.title,
        &communication.body,
    )
    .await?;

    let status = CommunicationStatus::from_delivery_counts(delivered, recipients.len());
    if !crate::repo::communication::mark_dispatched(pool, communication_id, status).await? {
        tracing::warn!(communication_id, "Dispatch finished but the communication left `sending`");
    }

    let failed = recipients.len() - delivered;
    tracing::info!(
        communication_id,
        channel = preferred.as_str(),
        delivered,
        failed,
        notified = notify.len(),
        status = status.as_str(),
        "Communication dispatched"
    );

    Ok(DispatchSummary {
        communication_id,
        status,
        delivered,
        failed,
    })
}
