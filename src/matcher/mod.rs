//! Recognizes Facebook listing and post URLs inside arbitrary message text.

use std::sync::LazyLock;

use regex::Regex;

/// Recognized Facebook URL shapes: item-detail permalinks, the legacy
/// query-string item link, short-link/share variants, post permalinks and
/// mobile-domain links.
static FB_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"https?://(?:www\.)?facebook\.com/marketplace/item/\d+",
        r"https?://(?:www\.)?facebook\.com/marketplace/item\.php\?id=\d+",
        r"https?://(?:www\.)?fb\.com/marketplace/item/\d+",
        r"https?://(?:www\.)?facebook\.com/share/[a-zA-Z0-9]+/?(?:\?\S*)?",
        r"https?://(?:www\.)?facebook\.com/[^/\s]+/posts/[a-zA-Z0-9]+",
        r"https?://(?:www\.)?fb\.watch/[a-zA-Z0-9_-]+/?",
        r"https?://(?:www\.)?fb\.me/[a-zA-Z0-9_-]+",
        r"https?://m\.facebook\.com/\S+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("URL pattern must compile"))
    .collect()
});

/// Scans message text for a Facebook link.
///
/// Every pattern is tried and the longest match wins (ties go to the earlier
/// table entry), so an overlapping less-specific shape cannot shadow a more
/// specific one.
pub fn find_facebook_url(text: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    for pattern in FB_URL_PATTERNS.iter() {
        if let Some(m) = pattern.find(text)
            && best.is_none_or(|b| m.as_str().len() > b.len())
        {
            best = Some(m.as_str());
        }
    }
    best.map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_marketplace_item_in_surrounding_text() {
        let text = "check this out https://www.facebook.com/marketplace/item/123456789 thanks";
        assert_eq!(
            find_facebook_url(text).as_deref(),
            Some("https://www.facebook.com/marketplace/item/123456789")
        );
    }

    #[test]
    fn matches_legacy_item_php_link() {
        let text = "https://facebook.com/marketplace/item.php?id=42";
        assert_eq!(find_facebook_url(text).as_deref(), Some(text));
    }

    #[test]
    fn matches_share_link_with_query_string() {
        let text = "see https://www.facebook.com/share/aB3xY9/?mibextid=abc here";
        assert_eq!(
            find_facebook_url(text).as_deref(),
            Some("https://www.facebook.com/share/aB3xY9/?mibextid=abc")
        );
    }

    #[test]
    fn matches_post_permalink() {
        let text = "https://www.facebook.com/somepage/posts/9a8b7c";
        assert_eq!(find_facebook_url(text).as_deref(), Some(text));
    }

    #[test]
    fn matches_short_links() {
        assert!(find_facebook_url("https://fb.watch/abc-123/").is_some());
        assert!(find_facebook_url("https://fb.me/xyz_9").is_some());
        assert!(find_facebook_url("https://fb.com/marketplace/item/77").is_some());
    }

    #[test]
    fn mobile_link_keeps_full_path() {
        let text = "https://m.facebook.com/marketplace/item/123456789?ref=share and more";
        assert_eq!(
            find_facebook_url(text).as_deref(),
            Some("https://m.facebook.com/marketplace/item/123456789?ref=share")
        );
    }

    #[test]
    fn ignores_text_without_facebook_links() {
        assert!(find_facebook_url("nothing to see here").is_none());
        assert!(find_facebook_url("other urls https://example.com/marketplace/item/1 too").is_none());
        assert!(find_facebook_url("https://www.facebook.com/").is_none());
    }

    #[test]
    fn longest_match_wins_when_patterns_overlap() {
        // The earlier-listed share shape stops at the path segment
        // ("…/share/posts/"); the post-permalink shape covers the whole
        // link and must win despite coming later in the table.
        let text = "https://www.facebook.com/share/posts/9a8b7c";
        assert_eq!(find_facebook_url(text).as_deref(), Some(text));
    }
}
