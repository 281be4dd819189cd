use serde::{Deserialize, Serialize};

/// Optional integrations of a ComuniGov instance, read from the
/// `[features]` table of `config.toml`.
///
/// Anything not listed is off, so a fresh checkout only delivers in-app
/// notifications and keeps attachments disabled.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct FeatureFlags {
    /// Email through the Mailgun HTTP API.
    pub mailgun: bool,
    /// WhatsApp through Twilio.
    pub whatsapp: bool,
    /// Telegram Bot API.
    pub telegram: bool,
    /// Attachments on S3-compatible storage.
    pub s3: bool,
    /// OTLP export of traces and logs.
    pub telemetry: bool,
}

/// Shape of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub features: FeatureFlags,
}
