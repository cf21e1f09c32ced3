//! Sideways — a bot that trades cryptocurrency sideways using a
//! percentage difference from the current price.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the Gemini gateway, price store and notifier together, and runs
//! the cycle loop with graceful shutdown.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use sideways::config::AppConfig;
use sideways::engine::SidewaysEngine;
use sideways::exchange::gemini::GeminiClient;
use sideways::notify::{Notifier, TelegramNotifier};
use sideways::storage::PriceStore;

const BANNER: &str = r#"
   _____ _     _
  / ____(_)   | |
 | (___  _  __| | _____      ____ _ _   _ ___
  \___ \| |/ _` |/ _ \ \ /\ / / _` | | | / __|
  ____) | | (_| |  __/\ V  V / (_| | |_| \__ \
 |_____/|_|\__,_|\___| \_/\_/ \__,_|\__, |___/
                                     __/ |
  buy below, sell above, repeat     |___/
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Config path is the first CLI argument
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    // InvalidConfig is the only error allowed to abort the process.
    cfg.validate()
        .with_context(|| format!("configuration rejected: {}", config_path.display()))?;

    println!("{BANNER}");
    info!(
        bot_name = %cfg.bot.name(),
        currency = %cfg.bot.currency,
        movement_pct = %cfg.bot.movement_percentage,
        cycle_minutes = cfg.bot.cycle_time_minutes,
        sandbox = cfg.gemini.sandbox,
        "Sideways bot starting up"
    );

    // -- Wire components -------------------------------------------------

    let (api_key, api_secret) = cfg.gemini_credentials()?;
    let gateway = GeminiClient::new(&cfg.bot.currency, api_key, api_secret, cfg.gemini.sandbox)?;
    let store = PriceStore::new(cfg.bot.state_file.clone());
    let notifier: Option<Box<dyn Notifier>> = TelegramNotifier::from_config(&cfg.alerts)?
        .map(|n| Box::new(n) as Box<dyn Notifier>);

    if let Some(n) = &notifier {
        let message = format!("{} has been started", cfg.bot.name());
        if let Err(e) = n.send(&message).await {
            warn!(error = %e, "Startup notification failed");
        }
    }

    let mut engine = SidewaysEngine::new(Box::new(gateway), store, notifier, cfg.bot.clone());

    // -- Main loop -------------------------------------------------------

    let mut interval =
        tokio::time::interval(Duration::from_secs(cfg.bot.cycle_time_minutes * 60));
    // A slow cycle delays the next tick rather than overlapping it.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        interval_minutes = cfg.bot.cycle_time_minutes,
        "Entering main loop. Press Ctrl+C to stop."
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match engine.run_cycle().await {
                    Ok(report) => info!(%report, "Cycle complete"),
                    Err(e) => {
                        // Per-cycle errors are logged and the loop continues;
                        // the next tick re-evaluates from exchange truth.
                        error!(error = %e, "Cycle failed — continuing to next");
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("Sideways bot shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sideways=info"));

    let json_logging = std::env::var("SIDEWAYS_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
