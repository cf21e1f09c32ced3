//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads the config file given on the command line and deserializes into
//! strongly-typed structs. Secrets (API keys) are referenced by env-var
//! name in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::types::SidewaysError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Cryptocurrency symbol paired against USD, e.g. "ETH".
    pub currency: String,
    /// Percentage offset applied above and below the reference price.
    pub movement_percentage: Decimal,
    #[serde(default = "default_cycle_time")]
    pub cycle_time_minutes: u64,
    /// Bot display name; defaults to `Gemini-<CUR>-sideways-bot`.
    #[serde(default)]
    pub name: Option<String>,
    /// Fee headroom subtracted from the USD balance when sizing a buy.
    #[serde(default)]
    pub fee_margin_percentage: Decimal,
    /// Override for the sell-target state file location.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key_env: String,
    pub api_secret_env: String,
    /// Use the sandbox API instead of production.
    #[serde(default)]
    pub sandbox: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertsConfig {
    pub telegram_bot_token_env: Option<String>,
    pub telegram_chat_id_env: Option<String>,
}

fn default_cycle_time() -> u64 {
    15
}

impl BotConfig {
    /// Bot display name, derived from the currency when not configured.
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Gemini-{}-sideways-bot", self.currency))
    }

    /// Gemini symbol for the trading pair, e.g. "ethusd".
    pub fn symbol(&self) -> String {
        format!("{}usd", self.currency.to_lowercase())
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Startup validation. Everything caught here is fatal; per-cycle code
    /// can assume a well-formed config.
    pub fn validate(&self) -> Result<(), SidewaysError> {
        let currency = &self.bot.currency;
        if currency.is_empty() || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SidewaysError::InvalidConfig(format!(
                "unsupported currency symbol: {currency:?}"
            )));
        }
        if self.bot.movement_percentage <= Decimal::ZERO
            || self.bot.movement_percentage >= Decimal::ONE_HUNDRED
        {
            // At 100% the buy price collapses to zero.
            return Err(SidewaysError::InvalidConfig(format!(
                "movement_percentage must be in (0, 100), got {}",
                self.bot.movement_percentage
            )));
        }
        if self.bot.cycle_time_minutes == 0 {
            return Err(SidewaysError::InvalidConfig(
                "cycle_time_minutes must be at least 1".to_string(),
            ));
        }
        if self.bot.fee_margin_percentage < Decimal::ZERO
            || self.bot.fee_margin_percentage >= Decimal::ONE_HUNDRED
        {
            return Err(SidewaysError::InvalidConfig(format!(
                "fee_margin_percentage must be in [0, 100), got {}",
                self.bot.fee_margin_percentage
            )));
        }
        if self.alerts.telegram_bot_token_env.is_some()
            != self.alerts.telegram_chat_id_env.is_some()
        {
            return Err(SidewaysError::InvalidConfig(
                "alerts require both telegram_bot_token_env and telegram_chat_id_env".to_string(),
            ));
        }
        // Credentials must exist before the first cycle, not fail mid-loop.
        self.gemini_credentials()?;
        Ok(())
    }

    /// Resolve the Gemini API credentials from the environment.
    pub fn gemini_credentials(&self) -> Result<(String, SecretString), SidewaysError> {
        let key = Self::resolve_env(&self.gemini.api_key_env)?;
        let secret = Self::resolve_env(&self.gemini.api_secret_env)?;
        Ok((key, SecretString::new(secret)))
    }

    /// Resolve an environment variable name to its value.
    fn resolve_env(env_name: &str) -> Result<String, SidewaysError> {
        std::env::var(env_name).map_err(|_| {
            SidewaysError::InvalidConfig(format!("environment variable not set: {env_name}"))
        })
    }
}
