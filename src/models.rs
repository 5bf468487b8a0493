//! Data models for feed entries and the messages built from them.
//!
//! This module defines the core data structures used throughout the application:
//! - [`FeedEntry`]: Raw fields scraped from one node of the feed page
//! - [`Article`]: A well-formed entry with a title and a link
//! - [`Message`]: The Telegram-HTML text delivered for an [`Article`]
//!
//! Only the `link` of an article ever leaves the process; it is the identifier
//! recorded in the sent-links file once delivery succeeds.

use crate::utils::escape_html;
use thiserror::Error;

/// Description used when a feed entry carries no teaser paragraph.
pub const DESCRIPTION_PLACEHOLDER: &str = "Описание не найдено";

/// Label of the hyperlink appended to every message.
pub const READ_MORE_LABEL: &str = "Читать полностью";

/// A raw entry as scraped from the feed page.
///
/// Every field is optional because the markup of an individual node may be
/// incomplete; [`FeedEntry::into_article`] decides whether the entry is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    /// Headline text of the entry.
    pub title: Option<String>,
    /// Absolute URL of the full article.
    pub link: Option<String>,
    /// First paragraph of the teaser, if any.
    pub description: Option<String>,
}

/// Why a [`FeedEntry`] could not become an [`Article`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("entry has no title")]
    MissingTitle,
    #[error("entry has no link")]
    MissingLink,
}

/// A feed entry that has both a title and a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    /// Unique identifier of the article, compared by exact string equality.
    pub link: String,
    pub description: String,
}

/// Formatted text handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Telegram-HTML body: bold title, teaser, and a "read more" link.
    pub text: String,
}

impl FeedEntry {
    /// Validate the entry, filling in the placeholder description.
    ///
    /// Blank strings count as missing.
    pub fn into_article(self) -> Result<Article, ParseError> {
        let title = non_blank(self.title).ok_or(ParseError::MissingTitle)?;
        let link = non_blank(self.link).ok_or(ParseError::MissingLink)?;
        let description =
            non_blank(self.description).unwrap_or_else(|| DESCRIPTION_PLACEHOLDER.to_string());

        Ok(Article {
            title,
            link,
            description,
        })
    }
}

impl Article {
    /// Render the article as a Telegram-HTML message.
    ///
    /// ```text
    /// <b>{title}</b>
    ///
    /// {description}
    ///
    /// <a href='{link}'>Читать полностью</a>
    /// ```
    pub fn to_message(&self) -> Message {
        Message {
            text: format!(
                "<b>{}</b>\n\n{}\n\n<a href='{}'>{}</a>",
                escape_html(&self.title),
                escape_html(&self.description),
                escape_html(&self.link),
                READ_MORE_LABEL
            ),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
