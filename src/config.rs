//! Runtime configuration shared by the store, the dispatcher, and the scheduler.
//!
//! A [`RelayConfig`] is built once at startup from the command line (see
//! [`crate::cli::Cli::into_config`]) and then passed down by reference.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Feed polled when no `--feed-url` is given.
pub const DEFAULT_FEED_URL: &str = "https://habr.com/ru/feed/";

/// Base URL of the Telegram Bot API.
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// What a cycle does when the sent-links record exists but cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadFailurePolicy {
    /// End the cycle without delivering anything.
    #[default]
    SkipCycle,
    /// Carry on with an empty set; every entry on the page is re-sent.
    FailOpen,
}

/// Validated configuration for one relay process.
#[derive(Clone)]
pub struct RelayConfig {
    /// Page scraped every cycle.
    pub feed_url: Url,
    /// Telegram chat or channel receiving the messages (`@name` or numeric id).
    pub channel_id: String,
    /// Bot token. Never printed.
    pub credential: String,
    /// Pause after every delivery attempt.
    pub inter_item_delay: Duration,
    /// Pause between the end of one cycle and the start of the next.
    pub inter_cycle_delay: Duration,
    /// Sent-links record, one URL per line.
    pub record_path: PathBuf,
    pub log_dir: PathBuf,
    pub telegram_api_base: Url,
    pub request_timeout: Duration,
    pub read_failure_policy: ReadFailurePolicy,
    /// Run a single cycle and exit.
    pub once: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field} URL '{value}': {source}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

impl RelayConfig {
    /// Parse a URL option, naming the offending field on failure.
    pub fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
        Url::parse(value.trim()).map_err(|source| ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            source,
        })
    }

    /// Reject blank required values.
    pub fn require(field: &'static str, value: String) -> Result<String, ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Err(ConfigError::Empty(field))
        } else {
            Ok(trimmed.to_string())
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("feed_url", &self.feed_url.as_str())
            .field("channel_id", &self.channel_id)
            .field("credential", &"<redacted>")
            .field("inter_item_delay", &self.inter_item_delay)
            .field("inter_cycle_delay", &self.inter_cycle_delay)
            .field("record_path", &self.record_path)
            .field("log_dir", &self.log_dir)
            .field("telegram_api_base", &self.telegram_api_base.as_str())
            .field("request_timeout", &self.request_timeout)
            .field("read_failure_policy", &self.read_failure_policy)
            .field("once", &self.once)
            .finish()
    }
}

#[cfg(test)]
pub(crate) fn test_config(record_path: PathBuf) -> RelayConfig {
    RelayConfig {
        feed_url: Url::parse(DEFAULT_FEED_URL).unwrap(),
        channel_id: "@test_channel".into(),
        credential: "123:secret".into(),
        inter_item_delay: Duration::from_secs(2),
        inter_cycle_delay: Duration::from_secs(5),
        record_path,
        log_dir: PathBuf::from("."),
        telegram_api_base: Url::parse(DEFAULT_TELEGRAM_API_BASE).unwrap(),
        request_timeout: Duration::from_secs(30),
        read_failure_policy: ReadFailurePolicy::default(),
        once: false,
    }
}
