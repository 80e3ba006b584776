//! URL helpers for discovered items and API endpoints.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Path shapes that carry a note id, most specific first.
static NOTE_PATH_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/explore/([0-9a-zA-Z]+)",
        r"/discovery/item/([0-9a-zA-Z]+)",
        r"/note/([0-9a-zA-Z]+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Bare 24-hex object id anywhere in the url.
static HEX_ID: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"[0-9a-f]{24}").ok());

/// Check if a URL is an absolute http(s) URL
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Absolutise an item href against the site base.
///
/// Returns `None` for empty hrefs, script pseudo-links and anything that
/// cannot be joined into an http(s) url.
#[must_use]
pub fn resolve_href(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    if is_valid_url(href) {
        return Some(href.to_string());
    }
    let base = Url::parse(base).ok()?;
    let joined = base.join(href).ok()?;
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

/// Pull the note id out of a detail url.
///
/// ```
/// # use notescout::utils::url_utils::extract_note_id;
/// assert_eq!(
///     extract_note_id("https://www.xiaohongshu.com/explore/64a1b2c3d4e5f60718293a4b?xsec=1"),
///     Some("64a1b2c3d4e5f60718293a4b".to_string())
/// );
/// ```
#[must_use]
pub fn extract_note_id(url: &str) -> Option<String> {
    for pattern in NOTE_PATH_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(url)
            && let Some(id) = caps.get(1)
        {
            return Some(id.as_str().to_string());
        }
    }
    HEX_ID
        .as_ref()
        .and_then(|re| re.find(url))
        .map(|m| m.as_str().to_string())
}

/// Join an API base and a path without doubling or dropping the slash.
#[must_use]
pub fn join_endpoint(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
