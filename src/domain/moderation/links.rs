//! Link detection and whitelist matching.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::policy::{MatchMode, WhitelistEntry};

/// Scheme-prefixed, `www.`-prefixed or bare-domain tokens.
static LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(https?://[^\s]+|www\.[^\s]+|\b[a-z0-9.-]+\.[a-z]{2,})")
        .expect("Invalid link pattern regex")
});

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '"', '\''];

/// All URL-like tokens in `body`, in order of appearance.
pub fn find_links(body: &str) -> Vec<&str> {
    LINK_PATTERN
        .find_iter(body)
        .map(|m| m.as_str().trim_end_matches(TRAILING_PUNCTUATION))
        .filter(|link| !link.is_empty())
        .collect()
}

/// Lower-cased host of a link or pattern: scheme, `www.`, path, query and
/// port removed.
pub fn host_of(link: &str) -> String {
    let lower = link.trim().to_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(lower.as_str());
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www
        .split(|c| matches!(c, '/' | '?' | '#' | ':'))
        .next()
        .unwrap_or_default()
        .trim_end_matches('.')
        .to_string()
}

/// Link or pattern with scheme and leading `www.` removed and the host
/// lower-cased. Path, query and fragment are kept as written, minus one
/// trailing `/`.
pub fn normalize_link(link: &str) -> String {
    let trimmed = link.trim();
    let without_scheme = ["https://", "http://"]
        .iter()
        .find_map(|scheme| strip_prefix_ignore_case(trimmed, scheme))
        .unwrap_or(trimmed);
    let without_www = strip_prefix_ignore_case(without_scheme, "www.").unwrap_or(without_scheme);
    let split = without_www
        .find(|c| matches!(c, '/' | '?' | '#'))
        .unwrap_or(without_www.len());
    let (host, rest) = without_www.split_at(split);
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    format!("{}{rest}", host.trim_end_matches('.').to_lowercase())
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

fn leading_label(pattern: &str) -> String {
    host_of(pattern)
        .split('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

impl WhitelistEntry {
    /// Whether this entry allows `link`.
    pub fn allows(&self, link: &str) -> bool {
        let pattern = self.pattern.trim();
        if pattern.is_empty() {
            return false;
        }
        match self.match_mode {
            MatchMode::Exact => normalize_link(link) == normalize_link(pattern),
            MatchMode::Substring => link.to_lowercase().contains(&pattern.to_lowercase()),
            MatchMode::Token => {
                let label = leading_label(pattern);
                !label.is_empty() && link.to_lowercase().contains(&label)
            }
        }
    }
}

/// First link in `body` that no whitelist entry allows.
pub fn first_unwhitelisted<'a>(body: &'a str, whitelist: &[WhitelistEntry]) -> Option<&'a str> {
    find_links(body)
        .into_iter()
        .find(|link| !whitelist.iter().any(|entry| entry.allows(link)))
}
