//! Operational alerting.
//!
//! The engine reports noteworthy events (orders placed, missing sell
//! target, rejections) through the `Notifier` trait. Delivery is best
//! effort: a failed notification is logged and never fails a cycle.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::config::AlertsConfig;
use crate::types::SidewaysError;

/// Outbound alert channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Telegram
// ---------------------------------------------------------------------------

/// Telegram bot alert channel.
#[derive(Debug)]
pub struct TelegramNotifier {
    http: Client,
    bot_token: SecretString,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: SecretString, chat_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client for Telegram")?;
        Ok(Self {
            http,
            bot_token,
            chat_id,
        })
    }

    /// Build a notifier from the `[alerts]` config section, resolving the
    /// referenced env vars. Returns `None` when alerting isn't configured.
    pub fn from_config(alerts: &AlertsConfig) -> Result<Option<Self>, SidewaysError> {
        let (Some(token_env), Some(chat_env)) = (
            alerts.telegram_bot_token_env.as_deref(),
            alerts.telegram_chat_id_env.as_deref(),
        ) else {
            return Ok(None);
        };

        let resolve = |env: &str| {
            std::env::var(env).map_err(|_| {
                SidewaysError::InvalidConfig(format!("environment variable not set: {env}"))
            })
        };

        let notifier = Self::new(SecretString::new(resolve(token_env)?), resolve(chat_env)?)
            .map_err(|e| SidewaysError::InvalidConfig(e.to_string()))?;
        Ok(Some(notifier))
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.bot_token.expose_secret(),
        );
        let params = [("chat_id", self.chat_id.as_str()), ("text", message)];

        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .context("Telegram request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Telegram send failed: {}", resp.status());
        }

        debug!(chat_id = %self.chat_id, "Alert delivered");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
