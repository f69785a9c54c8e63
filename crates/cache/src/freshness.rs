//! Classifies queries whose answers go stale too quickly to cache

use crate::error::Result;
use regex::Regex;

/// Detects time-sensitive queries.
///
/// A query is time-sensitive when it contains one of the configured keywords
/// or phrases as whole words, or names the current calendar year.
#[derive(Debug, Clone)]
pub struct TimeSensitivity {
    keywords: Option<Regex>,
}

impl TimeSensitivity {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .map(|k| {
                // "this  week" in config still matches "this week" in a query
                k.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect();

        let keywords = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&format!(
                r"(?i)\b(?:{})\b",
                alternatives.join("|")
            ))?)
        };

        Ok(Self { keywords })
    }

    pub fn is_time_sensitive(&self, query: &str, current_year: i32) -> bool {
        if self.keywords.as_ref().is_some_and(|re| re.is_match(query)) {
            return true;
        }
        let year = current_year.to_string();
        query
            .split(|c: char| !c.is_ascii_digit())
            .any(|token| token == year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> TimeSensitivity {
        TimeSensitivity::new(&["latest", "today", "this week", "breaking"]).expect("valid")
    }

    #[test]
    fn test_keyword_matches() {
        let c = classifier();
        assert!(c.is_time_sensitive("latest AI news", 2026));
        assert!(c.is_time_sensitive("What happened TODAY in markets", 2026));
        assert!(c.is_time_sensitive("funding rounds this   week", 2026));
    }

    #[test]
    fn test_keywords_need_word_boundaries() {
        let c = classifier();
        assert!(!c.is_time_sensitive("the todays-ville history", 2026));
        assert!(!c.is_time_sensitive("icebreaking ships", 2026));
        assert!(!c.is_time_sensitive("climate change solutions", 2026));
    }

    #[test]
    fn test_current_year_is_time_sensitive() {
        let c = classifier();
        assert!(c.is_time_sensitive("EV sales 2026 forecast", 2026));
        assert!(!c.is_time_sensitive("EV sales 2019 forecast", 2026));
        assert!(!c.is_time_sensitive("part number 120261", 2026));
    }

    #[test]
    fn test_empty_keyword_list_only_checks_year() {
        let c = TimeSensitivity::new::<&str>(&[]).expect("valid");
        assert!(!c.is_time_sensitive("latest news", 2026));
        assert!(c.is_time_sensitive("news 2026", 2026));
    }

    #[test]
    fn test_regex_metacharacters_are_escaped() {
        let c = TimeSensitivity::new(&["c++ news"]).expect("valid");
        assert!(c.is_time_sensitive("c++ news roundup", 2026));
    }
}
