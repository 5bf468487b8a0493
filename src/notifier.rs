//! Message delivery to a chat channel.
//!
//! [`Notifier`] is the seam between the dispatcher and the outside world: it
//! accepts one formatted [`Message`] and reports success or failure. It never
//! retries; an undelivered article stays out of the sent-links record and is
//! offered again on the next cycle.

use crate::models::Message;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request to Telegram failed: {0}")]
    Http(#[source] reqwest::Error),
    #[error("Telegram rejected the message (HTTP {status}): {description}")]
    Api {
        status: StatusCode,
        description: String,
    },
}

/// Destination for formatted messages.
pub trait Notifier {
    /// Deliver one message.
    async fn notify(&self, message: &Message) -> Result<(), NotifyError>;
}

/// Subset of the Bot API response envelope we care about.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends messages through the Telegram Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    channel_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The endpoint embeds the bot token.
        f.debug_struct("TelegramNotifier")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(client: Client, api_base: &Url, token: &str, channel_id: impl Into<String>) -> Self {
        let endpoint = format!(
            "{}/bot{}/sendMessage",
            api_base.as_str().trim_end_matches('/'),
            token
        );
        Self {
            client,
            endpoint,
            channel_id: channel_id.into(),
        }
    }
}

impl Notifier for TelegramNotifier {
    #[instrument(level = "info", skip_all, fields(channel = %self.channel_id))]
    async fn notify(&self, message: &Message) -> Result<(), NotifyError> {
        let payload = json!({
            "chat_id": self.channel_id,
            "text": message.text,
            "parse_mode": "HTML",
        });
        debug!(target: "web_request", %payload, "Sending Telegram message");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(NotifyError::Http)?;

        let status = response.status();
        let body = response.text().await.map_err(NotifyError::Http)?;
        let parsed = serde_json::from_str::<ApiResponse>(&body);

        match parsed {
            Ok(ApiResponse { ok: true, .. }) if status.is_success() => {
                info!("Telegram message sent");
                Ok(())
            }
            Ok(ApiResponse { description, .. }) => {
                let description = description.unwrap_or_else(|| "no description".to_string());
                error!(%status, %description, "Telegram rejected message");
                Err(NotifyError::Api {
                    status,
                    description,
                })
            }
            Err(e) => {
                error!(%status, error = %e, "Unreadable Telegram response");
                Err(NotifyError::Api {
                    status,
                    description: format!("unreadable response: {e}"),
                })
            }
        }
    }
}
