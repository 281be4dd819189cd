//! WhatsApp channel over the Twilio Messages API.

#[derive(Debug, Clone, PartialEq)]
pub struct TwilioSettings {
    pub account_sid: String,
    pub auth_token: String,
    /// Sender number, already in `whatsapp:` form.
    pub from: String,
}

impl TwilioSettings {
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let required =
            |name: &str| lookup(name).ok_or_else(|| format!("{} is not configured", name));
        Ok(Self {
            account_sid: required("TWILIO_ACCOUNT_SID")?,
            auth_token: required("TWILIO_AUTH_TOKEN")?,
            from: whatsapp_address(&required("TWILIO_WHATSAPP_FROM")?),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        )
    }
}

/// Twilio addresses WhatsApp numbers as `whatsapp:+5511...`.
pub fn whatsapp_address(number: &str) -> String {
    let number = number.trim();
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

#[tracing::instrument(skip(message))]
pub async fn send_whatsapp(to: &str, message: &str) -> Result<(), String> {
    let settings = TwilioSettings::resolve(|name| std::env::var(name).ok())?;
    let to = whatsapp_address(to);

    let response = reqwest::Client::new()
        .post(settings.messages_url())
        .basic_auth(&settings.account_sid, Some(&settings.auth_token))
        .form(&[("From", settings.from.as_str()), ("To", to.as_str()), ("Body", message)])
        .send()
        .await
        .map_err(|e| format!("Twilio request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(format!("Twilio API error ({}): {}", status, detail));
    }
    tracing::debug!(%to, "WhatsApp message accepted by Twilio");
    Ok(())
}
