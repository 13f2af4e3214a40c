//! Report delivery
//!
//! Telegram caps a message at 4096 characters, so long reports are split on
//! line boundaries and sent as consecutive messages.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Telegram's per-message character limit
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Trait for report destinations
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;

    /// Destination name for display/logging
    fn destination(&self) -> String;
}

/// Sends reports through the Telegram Bot API
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn send_one(&self, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await
            // The URL embeds the bot token, keep it out of the error chain
            .map_err(|e| anyhow!("Failed to reach Telegram: {}", e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read Telegram response")?;

        let parsed: Option<ApiResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(ApiResponse { ok: true, .. }) if status.is_success() => Ok(()),
            Some(ApiResponse {
                description: Some(description),
                ..
            }) => Err(anyhow!("Telegram rejected message ({}): {}", status, description)),
            _ => Err(anyhow!("Telegram rejected message ({}): {}", status, body)),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let chunks = split_message(text, TELEGRAM_MESSAGE_LIMIT);
        debug!("Sending report to Telegram in {} message(s)", chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            self.send_one(chunk)
                .await
                .with_context(|| format!("Failed to send message {} of {}", i + 1, chunks.len()))?;
        }

        info!("Report sent to Telegram chat {}", self.chat_id);
        Ok(())
    }

    fn destination(&self) -> String {
        format!("Telegram chat {}", self.chat_id)
    }
}

/// Split `text` into pieces of at most `limit` characters, preferring line
/// breaks. A single line longer than `limit` is cut at character boundaries.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };

        if current_len + needed <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }

        if !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
        } else {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
