//! Email channel over the Mailgun HTTP API.

use crate::config::app_name;

/// Credentials for one Mailgun sending domain.
#[derive(Debug, Clone, PartialEq)]
pub struct MailgunSettings {
    pub api_key: String,
    pub domain: String,
    /// `MAILGUN_FROM`, or `"<app name> <noreply@domain>"`.
    pub from: String,
}

impl MailgunSettings {
    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let required =
            |name: &str| lookup(name).ok_or_else(|| format!("{} is not configured", name));
        let domain = required("MAILGUN_DOMAIN")?;
        Ok(Self {
            api_key: required("MAILGUN_API_KEY")?,
            from: lookup("MAILGUN_FROM")
                .unwrap_or_else(|| format!("{} <noreply@{}>", app_name(), domain)),
            domain,
        })
    }

    fn messages_url(&self) -> String {
        format!("https://api.mailgun.net/v3/{}/messages", self.domain)
    }
}

#[tracing::instrument(skip(html_body))]
pub async fn send_email(to: &str, subject: &str, html_body: &str) -> Result<(), String> {
    let settings = MailgunSettings::resolve(|name| std::env::var(name).ok())?;

    let response = reqwest::Client::new()
        .post(settings.messages_url())
        .basic_auth("api", Some(&settings.api_key))
        .form(&[
            ("from", settings.from.as_str()),
            ("to", to),
            ("subject", subject),
            ("html", html_body),
        ])
        .send()
        .await
        .map_err(|e| format!("Mailgun request failed: {}", e))?;

    let status = response.status();
    if !status.is_success() {
        let detail = response.text().await.unwrap_or_default();
        return Err(format!("Mailgun API error ({}): {}", status, detail));
    }
    tracing::debug!(to, "Email accepted by Mailgun");
    Ok(())
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// HTML body of a communication email. Line breaks in `body` are kept.
pub fn communication_html(title: &str, body: &str) -> String {
    render_communication(title, body, &app_name())
}

fn render_communication(title: &str, body: &str, sender: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: Arial, sans-serif; background: #f4f6f8; color: #1f2933; padding: 20px;">
  <div style="max-width: 600px; margin: 0 auto; background: #ffffff; border-top: 4px solid #1e88e5; padding: 30px;">
    <h1 style="color: #1e88e5; font-size: 20px;">{title}</h1>
    <p>{body}</p>
    <p style="color: #7b8794; font-size: 12px;">Enviado por {sender}</p>
  </div>
</body>
</html>"#,
        title = escape_html(title),
        body = escape_html(body).replace('\n', "<br>"),
        sender = escape_html(sender),
    )
}
