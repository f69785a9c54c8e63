//! Domain based credibility scoring for sources
//!
//! Scores run from 1 (unverifiable) to 5 (academic, government, peer reviewed).

use crate::models::SourceType;
use crate::source_url::extract_domain;

pub const MIN_CREDIBILITY: u8 = 1;
pub const MAX_CREDIBILITY: u8 = 5;

const ACADEMIC_SUFFIXES: &[&str] = &[
    ".edu", ".gov", ".ac.uk", ".ac.za", ".ac.jp", ".ac.cn", ".ac.in", ".ac.au", ".ac.nz",
    ".ac.il", ".ac.ae",
];

const ACADEMIC_DOMAINS: &[&str] = &[
    "arxiv.org",
    "ncbi.nlm.nih.gov",
    "pubmed.gov",
    "scholar.google.com",
    "researchgate.net",
    "ieee.org",
    "acm.org",
    "springer.com",
    "nature.com",
    "science.org",
    "cell.com",
    "thelancet.com",
    "nejm.org",
    "bmj.com",
    "jstor.org",
    "plos.org",
    "biorxiv.org",
    "medrxiv.org",
    "ssrn.com",
    "nber.org",
    "cambridge.org",
    "who.int",
    "un.org",
    "europa.eu",
];

const NEWS_DOMAINS: &[&str] = &[
    "reuters.com",
    "ap.org",
    "apnews.com",
    "bbc.com",
    "bbc.co.uk",
    "nytimes.com",
    "washingtonpost.com",
    "theguardian.com",
    "wsj.com",
    "ft.com",
    "economist.com",
    "bloomberg.com",
    "cnn.com",
    "npr.org",
    "pbs.org",
    "propublica.org",
    "theatlantic.com",
    "newyorker.com",
    "time.com",
    "newsweek.com",
    "usatoday.com",
    "latimes.com",
    "politico.com",
    "axios.com",
    "aljazeera.com",
    "dw.com",
    "france24.com",
    "lemonde.fr",
    "spiegel.de",
    "scmp.com",
    "straitstimes.com",
];

const ORG_DOMAINS: &[&str] = &[
    "cato.org",
    "heritage.org",
    "cfr.org",
    "rand.org",
    "pewresearch.org",
    "gallup.com",
    "worldbank.org",
    "imf.org",
    "oecd.org",
    "wto.org",
    "ilo.org",
    "unicef.org",
    "amnesty.org",
    "hrw.org",
    "transparency.org",
    "wikipedia.org",
];

const SHORTENERS: &[&str] = &["bit.ly", "tinyurl.com", "goo.gl", "t.co", "ow.ly"];

const BLOG_AND_SOCIAL: &[&str] = &[
    "blogspot.com",
    "wordpress.com",
    "tumblr.com",
    "livejournal.com",
    "substack.com",
    "ghost.io",
    "wixsite.com",
    "squarespace.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
];

/// `domain` equals `known` or is one of its subdomains
fn matches_domain(domain: &str, known: &str) -> bool {
    domain == known
        || domain
            .strip_suffix(known)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn in_list(domain: &str, list: &[&str]) -> bool {
    list.iter().any(|known| matches_domain(domain, known))
}

/// Score a source's credibility from its URL and type.
pub fn score_credibility(url: &str, source_type: SourceType) -> u8 {
    if source_type == SourceType::File {
        return 3;
    }

    let Some(domain) = extract_domain(url) else {
        return 2;
    };

    if in_list(&domain, SHORTENERS) {
        return 1;
    }
    if ACADEMIC_SUFFIXES.iter().any(|s| domain.ends_with(s)) || in_list(&domain, ACADEMIC_DOMAINS)
    {
        return 5;
    }
    if in_list(&domain, NEWS_DOMAINS) || in_list(&domain, ORG_DOMAINS) {
        return 4;
    }
    if in_list(&domain, BLOG_AND_SOCIAL) {
        return 2;
    }
    if domain.ends_with(".com") || domain.ends_with(".org") {
        return 3;
    }
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_academic_and_government() {
        assert_eq!(score_credibility("https://cs.stanford.edu/x", SourceType::Web), 5);
        assert_eq!(score_credibility("https://www.epa.gov/climate", SourceType::Web), 5);
        assert_eq!(score_credibility("https://arxiv.org/abs/1", SourceType::Web), 5);
        assert_eq!(score_credibility("https://www.ox.ac.uk/news", SourceType::Web), 5);
    }

    #[test]
    fn test_news_and_orgs() {
        assert_eq!(score_credibility("https://www.reuters.com/a", SourceType::Web), 4);
        assert_eq!(score_credibility("https://en.wikipedia.org/wiki/X", SourceType::Web), 4);
    }

    #[test]
    fn test_generic_commercial() {
        assert_eq!(score_credibility("https://www.microsoft.com/ai", SourceType::Web), 3);
        assert_eq!(score_credibility("https://some-company.com", SourceType::Web), 3);
    }

    #[test]
    fn test_blogs_social_and_unknown() {
        assert_eq!(score_credibility("https://me.substack.com/p/1", SourceType::Web), 2);
        assert_eq!(score_credibility("https://x.com/user", SourceType::Web), 2);
        assert_eq!(score_credibility("https://example.io", SourceType::Web), 2);
        assert_eq!(score_credibility("#source-abc", SourceType::Web), 2);
    }

    #[test]
    fn test_shorteners_score_lowest() {
        assert_eq!(score_credibility("https://bit.ly/3xyz", SourceType::Web), 1);
        assert_eq!(score_credibility("https://t.co/abc", SourceType::Web), 1);
    }

    #[test]
    fn test_uploaded_files_are_medium() {
        assert_eq!(score_credibility("#source-abc", SourceType::File), 3);
    }

    #[test]
    fn test_suffix_match_requires_label_boundary() {
        assert!(matches_domain("news.bbc.com", "bbc.com"));
        assert!(!matches_domain("notbbc.com", "bbc.com"));
    }
}
