// Operator alerts. Fire-and-forget: a failed send is logged, never returned.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::warn;

use cinesorte_common::Config;

const TELEGRAM_API: &str = "https://api.telegram.org";
const HEADER: &str = "🚨 *SISTEMA CINESORTE* 🚨\n\n";

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, message: &str);
}

/// Used when no bot is configured.
pub struct NoopAlerts;

#[async_trait]
impl AlertSink for NoopAlerts {
    async fn send(&self, message: &str) {
        tracing::debug!(message, "Alert dropped, no sink configured");
    }
}

pub struct TelegramAlerts {
    client: reqwest::Client,
    token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'a str,
}

impl TelegramAlerts {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            chat_id,
        }
    }
}

#[async_trait]
impl AlertSink for TelegramAlerts {
    async fn send(&self, message: &str) {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.token);
        let body = SendMessage {
            chat_id: &self.chat_id,
            text: format!("{HEADER}{message}"),
            parse_mode: "Markdown",
        };
        match self.client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = resp.status().as_u16(), "Telegram rejected alert"),
            Err(e) => warn!(error = %e, "Failed to send Telegram alert"),
        }
    }
}

/// Telegram when both the token and chat id are configured, otherwise a no-op.
pub fn alerts_from_config(config: &Config) -> Arc<dyn AlertSink> {
    match (&config.telegram_bot_token, &config.telegram_chat_id) {
        (Some(token), Some(chat)) => Arc::new(TelegramAlerts::new(token.clone(), chat.clone())),
        _ => {
            tracing::info!("Telegram alerts disabled");
            Arc::new(NoopAlerts)
        }
    }
}
