use crate::config::AppSettings;
use crate::models::WebhookMessage;
use reqwest::{Client, StatusCode};
use std::borrow::Cow;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

/// Discord rejects message content longer than this many characters.
pub const DISCORD_MAX_CONTENT_CHARS: usize = 2000;

const TRUNCATION_MARKER: char = '…';

#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Discord webhook failed: {status} - {body}")]
    Api { status: StatusCode, body: String },
    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),
}

#[derive(Debug)]
pub struct DiscordWebhookClient {
    client: Client,
    webhook_url: Url,
}

impl DiscordWebhookClient {
    pub fn new(settings: &AppSettings) -> Result<Self, WebhookError> {
        let webhook_url = Url::parse(&settings.discord_webhook_url)?;
        Ok(Self {
            client: Client::new(),
            webhook_url,
        })
    }

    #[instrument(skip(self, content), fields(len = content.len()))]
    pub async fn send(&self, content: &str) -> Result<(), WebhookError> {
        let content = truncate_content(content, DISCORD_MAX_CONTENT_CHARS);
        if let Cow::Owned(_) = content {
            warn!(
                "Message exceeds {} characters, truncating",
                DISCORD_MAX_CONTENT_CHARS
            );
        }

        let payload = WebhookMessage {
            content: content.into_owned(),
        };
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error body: {}", e));
            return Err(WebhookError::Api { status, body });
        }

        debug!("Message sent to Discord");
        Ok(())
    }
}

/// Cut `content` to at most `max_chars` characters, ending with an ellipsis when cut.
pub fn truncate_content(content: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Owned(String::new());
    }
    match content.char_indices().nth(max_chars) {
        None => Cow::Borrowed(content),
        Some(_) => {
            let keep = content
                .char_indices()
                .nth(max_chars - 1)
                .map(|(idx, _)| idx)
                .unwrap_or(content.len());
            let mut truncated = content[..keep].to_string();
            truncated.push(TRUNCATION_MARKER);
            Cow::Owned(truncated)
        }
    }
}
