use serde::Deserialize;

fn telegram_bot_token() -> Result<String, String> {
    std::env::var("TELEGRAM_BOT_TOKEN")
        .map_err(|_| "TELEGRAM_BOT_TOKEN is not configured".to_string())
}

fn telegram_api_base() -> String {
    std::env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| "https://api.telegram.org".to_string())
}

/// Envelope returned by every Bot API method.
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Send a plain-text message to a chat via the Telegram Bot API `sendMessage`.
#[tracing::instrument(skip(text))]
pub async fn send_message(chat_id: &str, text: &str) -> Result<(), String> {
    let url = format!("{}/bot{}/sendMessage", telegram_api_base(), telegram_bot_token()?);

    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .json(&serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        }))
        .send()
        .await
        .map_err(|e| format!("Telegram request failed: {}", e))?;

    let status = response.status();
    let body: BotApiResponse = response
        .json()
        .await
        .map_err(|e| format!("Telegram API returned an unreadable response ({}): {}", status, e))?;

    if !status.is_success() || !body.ok {
        return Err(format!(
            "Telegram API error ({}): {}",
            status,
            body.description.unwrap_or_default()
        ));
    }

    tracing::info!(chat_id = chat_id, "Telegram message sent successfully");
    Ok(())
}
