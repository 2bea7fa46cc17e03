//! Listing extraction heuristics over a rendered-page snapshot.
//!
//! Facebook serves human-facing markup with obfuscated class names and no
//! stable semantic structure, so every field is resolved through an ordered
//! candidate chain: a selector list walked most-specific-first, each matched
//! element passed through a field-specific acceptance filter, first
//! acceptance wins. The filters exist mostly to reject "similar items"
//! noise, which shows up as text carrying more than one price marker.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// A parsed capture of the rendered page. The located container and all
/// extraction borrow from it, so nothing extracted can outlive the snapshot
/// it came from.
pub struct PageSnapshot {
    document: Html,
}

/// Known "main listing" container shapes, desktop first, mobile variants
/// last. The class fingerprints track Facebook's generated class names for
/// the marketplace detail view and go stale when Facebook reshuffles them.
const CONTAINER_SELECTORS: &[&str] = &[
    "[data-testid='marketplace_pdp_container']",
    "[data-pagelet='MarketplacePermalinkRoot']",
    "div[role='main']",
    "div.x1qjc9v5.x78zum5.x1q0g3np",
    ".xrvj5dj.x1gslohp",
    ".x78zum5.xdt5ytf",
];

const HEADING_SELECTOR: &str = "h1, [role='heading'], span.x193iq5w";

impl PageSnapshot {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Find the DOM subtree most likely to be the primary listing.
    ///
    /// A candidate qualifies only if it contains both a heading-like element
    /// and a currency-marked element; "similar items" tiles typically lack a
    /// heading in the same subtree. Falls back to the whole body when no
    /// selector yields a qualifying container.
    pub fn locate_container(&self) -> ElementRef<'_> {
        for raw in CONTAINER_SELECTORS {
            let selector = Selector::parse(raw).unwrap();
            for candidate in self.document.select(&selector) {
                if has_heading(candidate) && element_text(candidate).contains('$') {
                    debug!(selector = %raw, "located main listing container");
                    return candidate;
                }
            }
        }

        let body = Selector::parse("body").unwrap();
        self.document
            .select(&body)
            .next()
            .unwrap_or_else(|| self.document.root_element())
    }
}

fn has_heading(container: ElementRef<'_>) -> bool {
    let selector = Selector::parse(HEADING_SELECTOR).unwrap();
    container.select(&selector).next().is_some()
}

/// Full subtree text, trimmed.
fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Whether one of the element's own text nodes (not a descendant's)
/// contains the character.
fn direct_text_contains(el: ElementRef<'_>, needle: char) -> bool {
    el.children()
        .any(|child| child.value().as_text().is_some_and(|t| t.text.contains(needle)))
}

fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

fn dollar_count(text: &str) -> usize {
    text.matches('$').count()
}

/// Walk a selector chain in order and return the first accepted value.
fn resolve_first<F>(scope: ElementRef<'_>, selectors: &[&str], accept: F) -> Option<String>
where
    F: Fn(ElementRef<'_>) -> Option<String>,
{
    selectors.iter().find_map(|raw| {
        let selector = Selector::parse(raw).unwrap();
        scope.select(&selector).find_map(&accept)
    })
}

/// Walk a selector chain in order and collect every accepted value.
fn collect_accepted<F>(scope: ElementRef<'_>, selectors: &[&str], accept: F) -> Vec<String>
where
    F: Fn(ElementRef<'_>) -> Option<String>,
{
    let mut accepted = Vec::new();
    for raw in selectors {
        let selector = Selector::parse(raw).unwrap();
        accepted.extend(scope.select(&selector).filter_map(&accept));
    }
    accepted
}

pub fn extract_title(container: ElementRef<'_>) -> Option<String> {
    const SELECTORS: &[&str] = &[
        "h1",
        "[role='heading']",
        "[data-testid='marketplace-listing-item-title']",
        "[data-testid='marketplace_pdp_title']",
        ".x1heor9g",
        "span.x193iq5w",
        ".xt0psk2",
    ];

    resolve_first(container, SELECTORS, |el| {
        let text = element_text(el);
        let len = text.chars().count();
        (len > 5
            && len < 100
            && !text.starts_with("Browse")
            && !text.contains("Create new listing")
            && dollar_count(&text) <= 1
            && !text.to_lowercase().contains("similar"))
        .then_some(text)
    })
    .or_else(|| {
        // Generic text blocks; all-caps ones are navigation chrome.
        resolve_first(container, &["div[dir='auto']"], |el| {
            let text = element_text(el);
            let len = text.chars().count();
            (len > 10 && len < 100 && text.to_uppercase() != text && dollar_count(&text) <= 1)
                .then_some(text)
        })
    })
}

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*[\d,]+(?:\.\d{2})?").expect("price pattern must compile"));

pub fn extract_price(container: ElementRef<'_>) -> Option<String> {
    const SELECTORS: &[&str] = &[
        "[data-testid='marketplace_pdp_price']",
        "span.x193iq5w",
        ".x1j85h84",
        // The price often sits in the span right after the title.
        "h1 + span",
        ".x1fcty0u span",
    ];

    let primary = resolve_first(container, SELECTORS, |el| {
        let text = element_text(el);
        if !text.contains('$') || !text.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }
        // A parent with several price markers means this is a tile in a
        // list of items, not the listing's own price.
        let parent_dollars = parent_element(el)
            .map(|p| dollar_count(&element_text(p)))
            .unwrap_or(0);
        if parent_dollars > 1 {
            return None;
        }
        if text.chars().count() > 15
            && let Some(m) = PRICE_RE.find(&text)
        {
            return Some(m.as_str().trim().to_string());
        }
        Some(text)
    });
    if primary.is_some() {
        return primary;
    }

    // Last resort: any element whose own text carries a single dollar amount.
    container
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| direct_text_contains(*el, '$'))
        .find_map(|el| {
            let text = element_text(el);
            let len = text.chars().count();
            if text.chars().any(|c| c.is_ascii_digit()) && len < 30 && dollar_count(&text) == 1 {
                match PRICE_RE.find(&text) {
                    Some(m) => Some(m.as_str().trim().to_string()),
                    None => Some(text),
                }
            } else {
                None
            }
        })
}

static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Location[\s:]+([\w\s,]+)",
        r"in ([\w\s]+, [A-Z]{2})",
        // Bare "City, ST"
        r"([\w\s]+, [A-Z]{2})",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("location pattern must compile"))
    .collect()
});

pub fn extract_location(container: ElementRef<'_>) -> Option<String> {
    const SELECTORS: &[&str] = &[
        "[data-testid='marketplace_pdp_location']",
        "div.x1xmf6yo",
        ".x1e56ztr",
        ".x1lliihq",
    ];
    const NAV_PHRASES: &[&str] = &["Browse all", "Categories", "Nearby", "Within"];

    let primary = resolve_first(container, SELECTORS, |el| {
        let text = element_text(el);
        let len = text.chars().count();
        if text.is_empty() || len >= 100 || text.contains('$') {
            return None;
        }
        if !text.contains("Location") && !text.contains(',') {
            return None;
        }

        let mut text = if text.contains("Location") && text.contains(':') {
            text.split_once(':').map(|(_, rest)| rest.trim().to_string())?
        } else {
            text
        };
        // Location text frequently runs into navigation chrome; cut there.
        for phrase in NAV_PHRASES {
            if let Some(idx) = text.find(phrase) {
                text = text[..idx].trim_end().to_string();
            }
        }
        (!text.is_empty()).then_some(text)
    });
    if primary.is_some() {
        return primary;
    }

    resolve_first(container, &["span, div"], |el| {
        let text = element_text(el);
        let len = text.chars().count();
        if text.is_empty() || len >= 100 || text.contains('$') {
            return None;
        }
        for pattern in LOCATION_PATTERNS.iter() {
            if let Some(captures) = pattern.captures(&text) {
                return Some(captures[1].trim().to_string());
            }
        }
        if text.contains(',') && len < 50 {
            let parts: Vec<&str> = text.split(',').collect();
            if parts.len() == 2 && parts.iter().all(|p| !p.trim().is_empty()) {
                return Some(text);
            }
        }
        None
    })
}

pub fn extract_description(container: ElementRef<'_>) -> Option<String> {
    const SELECTORS: &[&str] = &[
        "[data-testid='marketplace_listing_item_description']",
        "[data-testid='marketplace_pdp_description']",
        ".xz9dl7a",
        "[aria-label*='description']",
        ".x1gslohp",
        ".xw7yly9",
    ];
    const UI_MARKERS: &[&str] = &["browse all", "create new", "categories", "miles", "nearby"];

    let candidates = collect_accepted(container, SELECTORS, |el| {
        let text = element_text(el);
        (text.chars().count() > 20
            && !text.contains("Browse all")
            && !text.contains("Categories")
            && !text.contains("Nearby Cities")
            && dollar_count(&text) <= 1)
            .then_some(text)
    });

    if !candidates.is_empty() {
        let surviving: Vec<&String> = candidates
            .iter()
            .filter(|text| {
                let lower = text.to_lowercase();
                !UI_MARKERS.iter().any(|marker| lower.contains(marker))
            })
            .collect();
        let pool = if surviving.is_empty() {
            candidates.iter().collect()
        } else {
            surviving
        };
        return pool
            .into_iter()
            .max_by_key(|text| text.chars().count())
            .cloned();
    }

    // Widen to any substantial text block under the same price-count rule.
    collect_accepted(container, &["div[dir='auto']"], |el| {
        let text = element_text(el);
        (text.chars().count() > 40
            && !text.contains("Browse all")
            && !text.contains("Categories")
            && dollar_count(&text) <= 1)
            .then_some(text)
    })
    .into_iter()
    .max_by_key(|text| text.chars().count())
}

pub fn extract_image(container: ElementRef<'_>) -> Option<String> {
    const SELECTORS: &[&str] = &[
        "[data-testid='marketplace_pdp_images'] img",
        "[data-testid='marketplace_pdp_carousel'] img",
        "[data-testid='marketplace-pdp-image'] img",
        ".x5yr21d img",
        ".x1rg5ohu img",
        ".x6ikm8r img",
        "img[src*='scontent']",
        "img[alt*='product']",
        "img[data-visualcompletion='media-vc-image']",
    ];

    let mut collected: Vec<String> = Vec::new();
    for raw in SELECTORS {
        let selector = Selector::parse(raw).unwrap();
        for img in container.select(&selector) {
            let Some(src) = img.value().attr("src") else {
                continue;
            };
            // Real listing photos come off the scontent CDN; anything else
            // is UI chrome or a tracking pixel.
            if !src.contains("scontent") || src.chars().count() <= 20 {
                continue;
            }
            if collected.iter().any(|seen| seen == src) {
                continue;
            }
            // A width attribute that is small or unparseable marks a
            // thumbnail or decorative element.
            if let Some(width) = img.value().attr("width")
                && width.parse::<u32>().ok().is_none_or(|w| w < 50)
            {
                continue;
            }
            if has_carousel_ancestor(img) {
                debug!("image found inside the primary carousel");
                return Some(src.to_string());
            }
            collected.push(src.to_string());
        }
    }
    collected.into_iter().next()
}

/// The carousel is the strongest positive signal for the primary image; an
/// image nested under it ends the search immediately.
fn has_carousel_ancestor(el: ElementRef<'_>) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(|ancestor| {
        ancestor
            .value()
            .attr("data-testid")
            .is_some_and(|t| t.contains("carousel") || t.contains("pdp_images"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(body: &str) -> PageSnapshot {
        PageSnapshot::parse(&format!("<html><body>{body}</body></html>"))
    }

    #[test]
    fn locator_prefers_qualifying_container_over_similar_items() {
        let snap = snapshot(
            "<div class=\"xrvj5dj x1gslohp\"><span>$100</span><span>$200</span></div>\
             <div role=\"main\"><h1>Road bike</h1><span>$600</span></div>",
        );
        let container = snap.locate_container();
        assert_eq!(container.value().attr("role"), Some("main"));
    }

    #[test]
    fn locator_falls_back_to_body() {
        // Currency but no heading anywhere: every selector fails the
        // discriminator.
        let snap = snapshot("<div class=\"x78zum5 xdt5ytf\"><span>$100</span></div>");
        let container = snap.locate_container();
        assert_eq!(container.value().name(), "body");
    }

    #[test]
    fn locator_rejects_container_without_currency() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Just a headline, no price</h1></div>\
             <div class=\"x78zum5 xdt5ytf\"><h1>Sofa</h1><span>$50</span></div>",
        );
        let container = snap.locate_container();
        assert!(container.value().attr("class").unwrap_or("").contains("x78zum5"));
    }

    #[test]
    fn title_comes_from_heading() {
        let snap = snapshot("<div role=\"main\"><h1>iPhone 13 Pro</h1><span>$600</span></div>");
        let container = snap.locate_container();
        assert_eq!(extract_title(container).as_deref(), Some("iPhone 13 Pro"));
    }

    #[test]
    fn title_rejects_browse_labels_and_similar_sections() {
        let snap = snapshot(
            "<div role=\"main\">\
             <h1>Browse all listings near you</h1>\
             <h1>More similar items nearby today</h1>\
             <h1>Vintage armchair</h1>\
             <span>$45</span></div>",
        );
        let container = snap.locate_container();
        assert_eq!(extract_title(container).as_deref(), Some("Vintage armchair"));
    }

    #[test]
    fn title_falls_back_to_generic_text_block() {
        let snap = snapshot(
            "<div role=\"main\"><span role=\"heading\">abc</span><span>$20</span>\
             <div dir=\"auto\">Solid oak dining table</div></div>",
        );
        let container = snap.locate_container();
        // The heading is too short; the dir=auto block qualifies.
        assert_eq!(
            extract_title(container).as_deref(),
            Some("Solid oak dining table")
        );
    }

    #[test]
    fn extractors_are_idempotent_on_a_fixed_snapshot() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Mountain bike for sale</h1>\
             <h1 class=\"t\">x</h1><span>$250</span></div>",
        );
        let container = snap.locate_container();
        let first = extract_title(container);
        let second = extract_title(container);
        assert_eq!(first, second);
        assert_eq!(extract_price(container), extract_price(container));
    }

    #[test]
    fn price_prefers_sibling_span_after_title() {
        let snap = snapshot("<div role=\"main\"><h1>Kayak</h1><span>$350</span></div>");
        let container = snap.locate_container();
        assert_eq!(extract_price(container).as_deref(), Some("$350"));
    }

    #[test]
    fn price_rejects_candidates_in_multi_price_lists() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Dresser</h1>\
             <div><span class=\"x193iq5w\">$100</span><span class=\"x193iq5w\">$150</span></div>\
             <div><span class=\"x1j85h84\">$80</span></div></div>",
        );
        let container = snap.locate_container();
        // The first two share a parent with two price markers.
        assert_eq!(extract_price(container).as_deref(), Some("$80"));
    }

    #[test]
    fn price_trims_long_text_to_the_amount() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Record player</h1>\
             <span class=\"x1j85h84\">$1,250.00 listed a few weeks ago in town</span></div>",
        );
        let container = snap.locate_container();
        assert_eq!(extract_price(container).as_deref(), Some("$1,250.00"));
    }

    #[test]
    fn price_last_resort_scans_dollar_text() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Lamp stand thing</h1><p>asking $25 obo</p></div>",
        );
        let container = snap.locate_container();
        assert_eq!(extract_price(container).as_deref(), Some("$25"));
    }

    #[test]
    fn location_strips_label_and_navigation_tail() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Bookshelf</h1><span>$30</span>\
             <div class=\"x1xmf6yo\">Location: Austin, TX Browse all furniture</div></div>",
        );
        let container = snap.locate_container();
        assert_eq!(extract_location(container).as_deref(), Some("Austin, TX"));
    }

    #[test]
    fn location_rejects_currency_bearing_text() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Bookshelf</h1><span>$30</span>\
             <div class=\"x1xmf6yo\">$30 in Austin, TX</div>\
             <div class=\"x1e56ztr\">Dallas, TX</div></div>",
        );
        let container = snap.locate_container();
        assert_eq!(extract_location(container).as_deref(), Some("Dallas, TX"));
    }

    #[test]
    fn location_fallback_finds_city_state_pattern() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Bookshelf</h1><strong>$30</strong>\
             <span>Portland, OR</span></div>",
        );
        let container = snap.locate_container();
        assert_eq!(extract_location(container).as_deref(), Some("Portland, OR"));
    }

    #[test]
    fn description_prefers_longest_surviving_candidate() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Espresso machine</h1><span>$120</span>\
             <div class=\"x1gslohp\">Gently used, comes with the portafilter.</div>\
             <div class=\"xz9dl7a\">Gently used espresso machine, comes with the original \
             portafilter and a bag of beans. Pickup only.</div></div>",
        );
        let container = snap.locate_container();
        let description = extract_description(container).unwrap();
        assert!(description.starts_with("Gently used espresso machine"));
    }

    #[test]
    fn description_filters_interface_boilerplate() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Espresso machine</h1><span>$120</span>\
             <div class=\"x1gslohp\">See results within 40 miles of your area and create new alerts for this search today</div>\
             <div class=\"xz9dl7a\">Works great, descaled last month.</div></div>",
        );
        let container = snap.locate_container();
        assert_eq!(
            extract_description(container).as_deref(),
            Some("Works great, descaled last month.")
        );
    }

    #[test]
    fn description_fallback_widens_to_text_blocks() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Espresso machine</h1><span>$120</span>\
             <div dir=\"auto\">Heavily loved machine, a few scratches but pulls a great shot.</div></div>",
        );
        let container = snap.locate_container();
        assert_eq!(
            extract_description(container).as_deref(),
            Some("Heavily loved machine, a few scratches but pulls a great shot.")
        );
    }

    #[test]
    fn description_rejects_multi_price_lists() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Espresso machine</h1><span>$120</span>\
             <div class=\"x1gslohp\">Other machines: one for $90 and another for $110 around</div></div>",
        );
        let container = snap.locate_container();
        assert!(extract_description(container).is_none());
    }

    #[test]
    fn image_in_carousel_short_circuits() {
        // The gallery image is collected first through the class selector;
        // the carousel image is only reachable through the late generic
        // src selector. Without the early carousel return, the gallery
        // image would win as first collected.
        let snap = snapshot(
            "<div role=\"main\"><h1>Telescope</h1><span>$90</span>\
             <div class=\"x5yr21d\">\
             <img src=\"https://scontent.fxx1-1.fna.fbcdn.net/gallery-shot.jpg\"></div>\
             <div data-testid=\"media_carousel\">\
             <img src=\"https://scontent.fxx1-1.fna.fbcdn.net/carousel-shot.jpg\"></div></div>",
        );
        let container = snap.locate_container();
        assert_eq!(
            extract_image(container).as_deref(),
            Some("https://scontent.fxx1-1.fna.fbcdn.net/carousel-shot.jpg")
        );
    }

    #[test]
    fn image_returns_first_collected_without_carousel() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Telescope</h1><span>$90</span>\
             <div class=\"x5yr21d\">\
             <img src=\"https://scontent.fxx1-1.fna.fbcdn.net/first.jpg\"></div>\
             <img src=\"https://scontent.fxx1-1.fna.fbcdn.net/second.jpg\"></div>",
        );
        let container = snap.locate_container();
        assert_eq!(
            extract_image(container).as_deref(),
            Some("https://scontent.fxx1-1.fna.fbcdn.net/first.jpg")
        );
    }

    #[test]
    fn image_skips_thumbnails_and_foreign_hosts() {
        let snap = snapshot(
            "<div role=\"main\"><h1>Telescope</h1><span>$90</span>\
             <img src=\"https://scontent.fxx1-1.fna.fbcdn.net/icon.jpg\" width=\"32\">\
             <img src=\"https://scontent.fxx1-1.fna.fbcdn.net/decor.jpg\" width=\"auto\">\
             <img src=\"https://example.com/not-facebook-hosted-image.jpg\">\
             <img src=\"https://scontent.fxx1-1.fna.fbcdn.net/real.jpg\" width=\"720\"></div>",
        );
        let container = snap.locate_container();
        assert_eq!(
            extract_image(container).as_deref(),
            Some("https://scontent.fxx1-1.fna.fbcdn.net/real.jpg")
        );
    }

    #[test]
    fn image_none_when_nothing_qualifies() {
        let snap = snapshot("<div role=\"main\"><h1>Telescope</h1><span>$90</span></div>");
        let container = snap.locate_container();
        assert!(extract_image(container).is_none());
    }
}
