//! Habr feed scraper.
//!
//! This module scrapes article cards from a [Habr](https://habr.com) listing
//! page such as `https://habr.com/ru/feed/`. Both the legacy `posts-list`
//! markup and the current `tm-` markup are recognised.
//!
//! # URL Pattern
//!
//! Cards link to their article with relative URLs that are resolved against the
//! feed URL, e.g. `/ru/articles/812345/` becomes
//! `https://habr.com/ru/articles/812345/`.

use super::{FeedFetcher, FetchError};
use crate::models::FeedEntry;
use crate::utils::collapse_whitespace;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

static CARD_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("li.posts-list__item_article, article.tm-articles-list__item")
        .expect("valid card selector")
});

static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.post__title_link, a.tm-title__link").expect("valid title selector")
});

static TEASER_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("div.post__body.post__body_crop p, div.article-formatted-body p")
        .expect("valid teaser selector")
});

/// Scraper for one Habr listing page.
#[derive(Debug, Clone)]
pub struct HabrScraper {
    client: Client,
    url: Url,
}

impl HabrScraper {
    pub fn new(client: Client, url: Url) -> Self {
        Self { client, url }
    }
}

impl FeedFetcher for HabrScraper {
    #[instrument(level = "info", skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<Vec<FeedEntry>, FetchError> {
        let http_err = |source| FetchError::Http {
            url: self.url.to_string(),
            source,
        };

        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: self.url.to_string(),
                status,
            });
        }

        let html = response.text().await.map_err(http_err)?;
        debug!(bytes = html.len(), "Downloaded feed page");

        let entries = parse_page(&html, &self.url);
        info!(count = entries.len(), "Scraped feed entries");
        Ok(entries)
    }
}

/// Extract every article card from a feed page, in document order.
///
/// This is a pure function so the markup handling can be tested without the
/// network.
pub fn parse_page(html: &str, base: &Url) -> Vec<FeedEntry> {
    let document = Html::parse_document(html);
    document
        .select(&CARD_SELECTOR)
        .map(|card| parse_card(card, base))
        .collect()
}

fn parse_card(card: ElementRef<'_>, base: &Url) -> FeedEntry {
    let title_link = card.select(&TITLE_SELECTOR).next();

    let title = title_link
        .map(|a| collapse_whitespace(&a.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let link = title_link
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && !href.starts_with('#'))
        .map(|href| resolve_link(base, href));

    let description = card
        .select(&TEASER_SELECTOR)
        .next()
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|d| !d.is_empty());

    FeedEntry {
        title,
        link,
        description,
    }
}

/// Resolve `href` against the feed URL; hrefs that cannot be joined are kept verbatim.
fn resolve_link(base: &Url, href: &str) -> String {
    let href = href.trim();
    match base.join(href) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => href.to_string(),
    }
}
