//! Maps extraction output to channel-ready embed content.
//!
//! All "not found" fallback text, residual-label cleanup and data-quality
//! guards live here, at the presentation boundary; the pipeline itself only
//! ever deals in `Option` fields.

use crate::models::{ListingQuery, ListingRecord};

pub const FACEBOOK_BLUE: u32 = 0x1877F2;
pub const ERROR_RED: u32 = 0xFF0000;

const FALLBACK_PRICE: &str = "Not listed";
const FALLBACK_LOCATION: &str = "Not specified";
const FALLBACK_DESCRIPTION: &str = "No description available";
const UNUSABLE_DESCRIPTION: &str = "Description not available";
const MARKETPLACE_FALLBACK_TITLE: &str = "Facebook Marketplace Listing";
const POST_FALLBACK_TITLE: &str = "Facebook Post";

const DESCRIPTION_LIMIT: usize = 1024;

/// Interface text that survives extraction often enough to need a second
/// cleanup pass here.
const BOILERPLATE_PHRASES: &[&str] = &[
    "Browse all",
    "Categories",
    "Nearby Cities",
    "Create new listing",
    "Your account",
];
const BOILERPLATE_MARKERS: &[&str] = &["browse all", "create new", "categories"];

/// Channel-agnostic embed content; the Discord layer turns this into an
/// actual embed builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEmbed {
    pub title: String,
    pub url: Option<String>,
    pub color: u32,
    pub body: Option<String>,
    pub image_url: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline,
        }
    }
}

/// Build the success embed for an extracted record.
pub fn present(query: &ListingQuery, record: &ListingRecord, requester: &str) -> ListingEmbed {
    let fallback_title = if query.is_marketplace {
        MARKETPLACE_FALLBACK_TITLE
    } else {
        POST_FALLBACK_TITLE
    };
    let title = match &record.title {
        Some(t) if !t.contains("Browse all") && t.matches('$').count() <= 1 => t.clone(),
        _ => fallback_title.to_string(),
    };

    let price = clean_price(record.price.as_deref());
    let location = clean_location(record.location.as_deref());
    let description = clean_description(record.description.as_deref());

    // Marketplace framing when the URL says so, or when a usable price
    // turned up on a link that didn't.
    let marketplace = query.is_marketplace || price != FALLBACK_PRICE;

    let mut fields = Vec::new();
    let mut body = None;
    if marketplace {
        fields.push(EmbedField::new("💰 Price", price, true));
        fields.push(EmbedField::new("📍 Location", location, true));
        if description != FALLBACK_DESCRIPTION && description != UNUSABLE_DESCRIPTION {
            fields.push(EmbedField::new("📝 Description", description, false));
        }
    } else if description.chars().count() > 50 && !contains_boilerplate(&description) {
        body = Some(description);
    }

    let framing = if marketplace {
        "Marketplace Listing"
    } else {
        "Facebook Post"
    };

    ListingEmbed {
        title,
        url: Some(query.url.clone()),
        color: FACEBOOK_BLUE,
        body,
        image_url: record.image_url.clone(),
        fields,
        footer: Some(format!("Requested by {requester} | {framing}")),
    }
}

/// Build the error embed for a failed scrape.
pub fn present_error(url: &str) -> ListingEmbed {
    ListingEmbed {
        title: "Error Fetching Details".to_string(),
        url: None,
        color: ERROR_RED,
        body: Some("I couldn't retrieve the details from this Facebook link.".to_string()),
        image_url: None,
        fields: vec![EmbedField::new("Link", url, false)],
        footer: None,
    }
}

fn clean_price(raw: Option<&str>) -> String {
    match raw {
        // More than one price marker means a similar-items block slipped
        // through; treat it as no price at all.
        Some(price) if price.matches('$').count() <= 1 => price.to_string(),
        _ => FALLBACK_PRICE.to_string(),
    }
}

fn clean_location(raw: Option<&str>) -> String {
    match raw {
        Some(location) if location.contains("Location") => location
            .replace("Location", "")
            .replace(':', "")
            .trim()
            .to_string(),
        Some(location) => location.to_string(),
        None => FALLBACK_LOCATION.to_string(),
    }
}

fn clean_description(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return FALLBACK_DESCRIPTION.to_string();
    };

    let mut text = raw.to_string();
    for phrase in BOILERPLATE_PHRASES {
        if let Some(idx) = text.find(phrase) {
            let before = text[..idx].trim();
            let after = text[idx + phrase.len()..].trim();
            text = if before.len() > after.len() {
                before.to_string()
            } else {
                after.to_string()
            };
        }
    }

    if text.matches('$').count() > 2 {
        return UNUSABLE_DESCRIPTION.to_string();
    }

    truncate_description(text)
}

/// Cap at [`DESCRIPTION_LIMIT`] characters, ellipsis included.
fn truncate_description(text: String) -> String {
    if text.chars().count() <= DESCRIPTION_LIMIT {
        return text;
    }
    let head: String = text.chars().take(DESCRIPTION_LIMIT - 3).collect();
    format!("{head}...")
}

fn contains_boilerplate(text: &str) -> bool {
    let lower = text.to_lowercase();
    BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
}
