//! Feed page scrapers.
//!
//! A scraper turns one feed page into an ordered list of [`FeedEntry`] values.
//! It does not judge whether an entry is complete; entries with a missing title
//! or link are passed through so the dispatcher can log and skip them.
//!
//! # Supported Sources
//!
//! | Source | Module | Method | Notes |
//! |--------|--------|--------|-------|
//! | Habr | [`habr`] | HTML scraping | Any Habr listing page (`/ru/feed/`, flows, hubs) |
//!
//! # Adding a source
//!
//! Implement [`FeedFetcher`] for a new struct in its own submodule and hand it
//! to [`crate::dispatch::Dispatcher::new`].

pub mod habr;

use crate::models::FeedEntry;
use thiserror::Error;

pub use habr::HabrScraper;

/// Failure to obtain the feed page at all.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Source of candidate entries for one poll cycle.
pub trait FeedFetcher {
    /// Fetch and parse the feed, preserving page order.
    async fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError>;
}
