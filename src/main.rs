//! # Habr Relay
//!
//! Polls the Habr news feed and forwards every article it has not seen before
//! to a Telegram channel, remembering delivered links in a plain text file so
//! restarts never repeat a successful delivery.
//!
//! ## Usage
//!
//! ```sh
//! TELEGRAM_BOT_TOKEN=123:abc TELEGRAM_CHANNEL_ID=@my_channel habr_relay
//! ```
//!
//! ## Architecture
//!
//! Each cycle follows a short pipeline:
//! 1. **Scraping**: download the feed page and extract article cards
//! 2. **Filtering**: drop malformed cards and links already in `sent_links.txt`
//! 3. **Delivery**: send each new article to Telegram, pausing between sends
//! 4. **Persistence**: append the links that were delivered and rewrite the record
//!
//! The scheduler repeats the cycle with a fixed pause until ctrl-c.

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use tokio::signal;
use tokio::sync::watch;
use tracing::{debug, error, info};

mod cli;
mod config;
mod dispatch;
mod logging;
mod models;
mod notifier;
mod scheduler;
mod scrapers;
mod store;
mod utils;

use cli::Cli;
use dispatch::Dispatcher;
use notifier::TelegramNotifier;
use scheduler::{Scheduler, run_cycle_guarded};
use scrapers::HabrScraper;
use store::SentStore;
use utils::ensure_writable_dir;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Cli::parse().into_config()?;

    ensure_writable_dir(&config.log_dir).await?;
    let _log_guard = logging::configure_logging(&config.log_dir);

    info!(version = env!("CARGO_PKG_VERSION"), "habr_relay starting up");
    debug!(?config, "Loaded configuration");

    let client = Client::builder()
        .timeout(config.request_timeout)
        .user_agent(USER_AGENT)
        .build()?;

    let dispatcher = Dispatcher::new(
        HabrScraper::new(client.clone(), config.feed_url.clone()),
        TelegramNotifier::new(
            client,
            &config.telegram_api_base,
            &config.credential,
            config.channel_id.clone(),
        ),
        SentStore::new(config.record_path.clone()),
        config.inter_item_delay,
        config.read_failure_policy,
    );

    if config.once {
        match run_cycle_guarded(&dispatcher).await {
            Some(report) => info!(outcome = ?report.outcome, delivered = report.delivered, "Single cycle finished"),
            None => error!("Single cycle aborted"),
        }
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            return;
        }
        info!("Ctrl-C received, shutting down");
        let _ = shutdown_tx.send(true);
    });

    let cycles = Scheduler::new(config.inter_cycle_delay, shutdown_rx)
        .run(&dispatcher)
        .await;

    info!(cycles, "habr_relay stopped");
    Ok(())
}
