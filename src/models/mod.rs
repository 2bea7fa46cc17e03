//! Core data types crossing the pipeline/presentation boundary

use thiserror::Error;

/// A resolved scrape target, created once per matched message.
#[derive(Debug, Clone)]
pub struct ListingQuery {
    /// The Facebook URL extracted from the message text.
    pub url: String,
    /// Whether the URL denotes a marketplace listing rather than a generic post.
    pub is_marketplace: bool,
}

impl ListingQuery {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let is_marketplace = url.contains("marketplace");
        Self {
            url,
            is_marketplace,
        }
    }
}

/// Structured output of the extraction pipeline.
///
/// A missing field is `None`; human-readable fallback text is only
/// substituted at the presentation boundary. A failed scrape never produces
/// a record at all (it produces a [`ScrapeError`]), so a record's fields are
/// always safe to inspect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRecord {
    pub title: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    /// At most one image URL; the pipeline collapses candidates to one.
    pub image_url: Option<String>,
}

/// Faults that abort a scrape. Converted to an error embed at the Discord
/// boundary; never propagated further.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("could not start the browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("page script failed: {0}")]
    Script(String),
}
