//! Command-line interface definitions for Habr Relay.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables,
//! and everything except the Telegram credentials has a default, so a bare
//! `habr_relay` with the two Telegram variables exported is a working setup.

use crate::config::{
    ConfigError, DEFAULT_FEED_URL, DEFAULT_TELEGRAM_API_BASE, ReadFailurePolicy, RelayConfig,
};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the Habr Relay application.
///
/// # Examples
///
/// ```sh
/// # Credentials from the environment, everything else default
/// TELEGRAM_BOT_TOKEN=123:abc TELEGRAM_CHANNEL_ID=@my_channel habr_relay
///
/// # One cycle against a different feed, then exit
/// habr_relay --channel-id @my_channel --bot-token 123:abc \
///     --feed-url https://habr.com/ru/flows/develop/ --once
/// ```
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Feed page to scrape
    #[arg(long, env = "FEED_URL", default_value = DEFAULT_FEED_URL)]
    pub feed_url: String,

    /// Telegram channel receiving the articles (`@name` or numeric chat id)
    #[arg(long, env = "TELEGRAM_CHANNEL_ID")]
    pub channel_id: String,

    /// Telegram bot token
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// Seconds to wait after each delivery attempt
    #[arg(long, env = "ITEM_DELAY_SECS", default_value_t = 2)]
    pub item_delay_secs: u64,

    /// Seconds to wait between poll cycles
    #[arg(long, env = "CYCLE_DELAY_SECS", default_value_t = 5)]
    pub cycle_delay_secs: u64,

    /// File recording links that were already delivered
    #[arg(long, env = "SENT_LINKS_FILE", default_value = "sent_links.txt")]
    pub record_path: PathBuf,

    /// Directory for `habr_relay.log`
    #[arg(long, env = "LOG_DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Telegram Bot API base URL
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = DEFAULT_TELEGRAM_API_BASE)]
    pub telegram_api_base: String,

    /// Timeout in seconds for every HTTP request
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Treat an unreadable sent-links file as empty instead of skipping the cycle
    #[arg(long, env = "FAIL_OPEN_ON_READ_ERROR")]
    pub fail_open_on_read_error: bool,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

impl Cli {
    /// Validate the raw arguments into a [`RelayConfig`].
    pub fn into_config(self) -> Result<RelayConfig, ConfigError> {
        Ok(RelayConfig {
            feed_url: RelayConfig::parse_url("feed", &self.feed_url)?,
            channel_id: RelayConfig::require("channel id", self.channel_id)?,
            credential: RelayConfig::require("bot token", self.bot_token)?,
            inter_item_delay: Duration::from_secs(self.item_delay_secs),
            inter_cycle_delay: Duration::from_secs(self.cycle_delay_secs),
            record_path: self.record_path,
            log_dir: self.log_dir,
            telegram_api_base: RelayConfig::parse_url("Telegram API", &self.telegram_api_base)?,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            read_failure_policy: if self.fail_open_on_read_error {
                ReadFailurePolicy::FailOpen
            } else {
                ReadFailurePolicy::SkipCycle
            },
            once: self.once,
        })
    }
}

impl fmt::Debug for Cli {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cli")
            .field("feed_url", &self.feed_url)
            .field("channel_id", &self.channel_id)
            .field("bot_token", &"<redacted>")
            .field("item_delay_secs", &self.item_delay_secs)
            .field("cycle_delay_secs", &self.cycle_delay_secs)
            .field("record_path", &self.record_path)
            .field("log_dir", &self.log_dir)
            .field("telegram_api_base", &self.telegram_api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("fail_open_on_read_error", &self.fail_open_on_read_error)
            .field("once", &self.once)
            .finish()
    }
}
