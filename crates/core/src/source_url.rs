//! URL repair and normalization for indexed sources

use twox_hash::XxHash3_128;
use url::Url;

/// Query parameters that only track the click and never change the document
const TRACKING_PARAMS: &[&str] = &["gclid", "fbclid", "mc_cid", "mc_eid", "ref", "ref_src"];

/// A source location after normalization
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceUrl {
    /// An absolute http(s) URL
    Web(String),
    /// Internal anchor for sources whose URL is missing or unusable
    Anchor(String),
}

impl SourceUrl {
    /// Internal anchor derived deterministically from `seed`
    pub fn anchor(seed: &str) -> Self {
        Self::Anchor(format!(
            "#source-{:032x}",
            XxHash3_128::oneshot(seed.trim().as_bytes())
        ))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Web(url) | Self::Anchor(url) => url,
        }
    }

    pub fn is_web(&self) -> bool {
        matches!(self, Self::Web(_))
    }

    /// Identity used for duplicate detection; casing differences collide
    pub fn dedup_key(&self) -> String {
        match self {
            Self::Web(url) => url.to_lowercase(),
            Self::Anchor(anchor) => anchor.clone(),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Web(url) | Self::Anchor(url) => url,
        }
    }
}

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Heuristic for `example.com/path` style input with no scheme
fn looks_like_bare_domain(candidate: &str) -> bool {
    let host = candidate.split(['/', '?', '#']).next().unwrap_or_default();
    !candidate.starts_with('/')
        && !candidate.starts_with('.')
        && !candidate.contains(char::is_whitespace)
        && host.contains('.')
        && !host.ends_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'))
}

/// Repair and normalize a raw URL.
///
/// Angle brackets and whitespace are stripped, a missing scheme is repaired to
/// `https://`, and the fragment, tracking parameters and trailing slash are
/// removed. Anything that still is not an absolute http(s) URL becomes an
/// internal anchor.
pub fn normalize_url(raw: &str) -> SourceUrl {
    let cleaned = raw
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim();

    if cleaned.is_empty() {
        return SourceUrl::anchor(raw);
    }

    let repaired = if let Some(rest) = cleaned.strip_prefix("//") {
        format!("https://{rest}")
    } else if !cleaned.contains("://") && looks_like_bare_domain(cleaned) {
        format!("https://{cleaned}")
    } else {
        cleaned.to_string()
    };

    let mut url = match Url::parse(&repaired) {
        Ok(url) if matches!(url.scheme(), "http" | "https") && url.host_str().is_some() => url,
        _ => return SourceUrl::anchor(cleaned),
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(name, _)| !is_tracking_param(name))
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut normalized = url.to_string();
    if url.query().is_none() {
        while normalized.ends_with('/') {
            normalized.pop();
        }
    }
    SourceUrl::Web(normalized)
}

/// Registrable host of a URL without a leading `www.`
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
