//! Boundary data model shared by the cache, the search pipeline and collaborators
//!
//! Everything a collaborator hands back is decoded into one of these structs.
//! Optional fields are enumerated explicitly and malformed payloads are either
//! defaulted or rejected here, so nothing dynamically shaped reaches the core.

use serde::{Deserialize, Serialize};

/// Title used when a search result arrives without one
pub const UNTITLED_SOURCE: &str = "Untitled Source";

/// Normalize query text so near-identical queries compare equal.
///
/// Lower-cases, trims and collapses internal whitespace runs to one space.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where a source came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Web,
    News,
    Academic,
    /// User-provided document
    File,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Web => "web",
            Self::News => "news",
            Self::Academic => "academic",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single raw hit from the search capability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSearchResult {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
}

impl RawSearchResult {
    pub fn new(url: impl Into<String>, title: impl Into<String>, snippet: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            snippet: snippet.into(),
            ..Default::default()
        }
    }

    pub fn with_published(mut self, published: impl Into<String>) -> Self {
        self.published = Some(published.into());
        self
    }

    pub fn with_source_type(mut self, source_type: SourceType) -> Self {
        self.source_type = source_type;
        self
    }

    /// Drop results with neither a URL nor a title and fill in defaults.
    pub fn sanitize(mut self) -> Option<Self> {
        self.url = self.url.trim().to_string();
        self.title = self.title.trim().to_string();
        self.snippet = self.snippet.trim().to_string();
        if self.url.is_empty() && self.title.is_empty() {
            return None;
        }
        if self.title.is_empty() {
            self.title = UNTITLED_SOURCE.to_string();
        }
        self.published = self
            .published
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Some(self)
    }
}

/// Everything one search call returned
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Query-level synthesis some providers return alongside raw hits
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub results: Vec<RawSearchResult>,
}

/// A summarized search result waiting to be merged into the source index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCandidate {
    pub url: String,
    pub title: String,
    /// Detailed summary, or the raw snippet when summarization failed
    pub summary: String,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub source_type: SourceType,
    /// Query that surfaced this result
    #[serde(default)]
    pub found_by: String,
}

impl SourceCandidate {
    pub fn from_raw(raw: &RawSearchResult, summary: impl Into<String>, found_by: &str) -> Self {
        Self {
            url: raw.url.clone(),
            title: raw.title.clone(),
            summary: summary.into(),
            published: raw.published.clone(),
            source_type: raw.source_type,
            found_by: found_by.to_string(),
        }
    }
}

/// The memoized outcome of resolving one query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceBundle {
    #[serde(default)]
    pub query_summary: Option<String>,
    #[serde(default)]
    pub sources: Vec<SourceCandidate>,
}

/// An indexed, citation-bearing source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDoc {
    pub citation_id: u32,
    /// Normalized URL, or an internal `#source-...` anchor when unusable
    pub url: String,
    pub title: String,
    pub summary: String,
    pub content_hash: String,
    /// 1 (unverifiable) to 5 (academic/government)
    pub credibility: u8,
    pub published: Option<String>,
    pub source_type: SourceType,
    pub found_by: String,
}

/// A query issued in a particular wave
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub wave: usize,
}

impl Query {
    pub fn new(text: impl Into<String>, wave: usize) -> Self {
        Self {
            text: text.into(),
            wave,
        }
    }
}

impl std::fmt::Display for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Trim, drop blanks and de-duplicate (by normalized form) a list of queries.
pub fn clean_queries(queries: &[String], limit: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    queries
        .iter()
        .map(|q| q.trim())
        .filter(|q| !q.is_empty())
        .filter(|q| seen.insert(normalize_query(q)))
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// Output of the query planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchPlan {
    #[serde(default)]
    pub thoughts: String,
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub recommended_source_count: usize,
}

/// Output of the follow-up decision collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FollowUpDecision {
    #[serde(default, alias = "should_follow_up", alias = "continue")]
    pub should_continue: bool,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub queries: Vec<String>,
}

impl FollowUpDecision {
    pub fn stop(reasoning: impl Into<String>) -> Self {
        Self {
            should_continue: false,
            reasoning: reasoning.into(),
            queries: Vec::new(),
        }
    }
}

/// A short excerpt of one indexed source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingHighlight {
    pub citation_id: u32,
    pub title: String,
    pub excerpt: String,
}

/// Accumulated findings handed to the follow-up decision collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    pub topic: String,
    pub waves_completed: usize,
    pub total_sources: usize,
    pub queries_issued: Vec<String>,
    pub highlights: Vec<FindingHighlight>,
    pub query_summaries: Vec<String>,
}

/// Everything the report writer receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    pub topic: String,
    pub subtopics: Vec<String>,
    pub query_summaries: Vec<String>,
    pub sources: Vec<SourceDoc>,
    /// Set on the single retry after a report failed validation
    pub simplified: bool,
}

/// One section of a synthesized report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "citations")]
    pub citation_ids: Vec<u32>,
}

/// Structured report returned by the report writer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResearchReport {
    #[serde(default)]
    pub outline: Vec<String>,
    #[serde(default)]
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ResearchReport {
    /// Every citation id referenced by any section, in order of appearance
    pub fn cited_ids(&self) -> Vec<u32> {
        self.sections
            .iter()
            .flat_map(|s| s.citation_ids.iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_normalize_query_collapses_whitespace() {
        assert_eq!(
            normalize_query("  Solar   PANELS\tcost \n"),
            "solar panels cost"
        );
        assert_eq!(normalize_query("   "), "");
    }

    #[test]
    fn test_sanitize_drops_empty_results() {
        assert!(RawSearchResult::new(" ", "", "snippet").sanitize().is_none());
    }

    #[test]
    fn test_sanitize_defaults_title() {
        let raw = RawSearchResult::new("https://example.com", "  ", " text ")
            .with_published("  ")
            .sanitize()
            .expect("usable");
        assert_eq!(raw.title, UNTITLED_SOURCE);
        assert_eq!(raw.snippet, "text");
        assert_eq!(raw.published, None);
    }

    #[test]
    fn test_clean_queries_dedups_and_limits() {
        let queries = vec![
            "carbon capture".to_string(),
            "  Carbon   Capture ".to_string(),
            "".to_string(),
            "solar storage".to_string(),
            "grid batteries".to_string(),
        ];
        assert_eq!(
            clean_queries(&queries, 2),
            vec!["carbon capture".to_string(), "solar storage".to_string()]
        );
    }

    #[test]
    fn test_follow_up_decision_accepts_aliases() {
        let decision: FollowUpDecision =
            serde_json::from_str(r#"{"should_follow_up": true, "queries": ["a", "b"]}"#)
                .expect("decode");
        assert!(decision.should_continue);
        assert_eq!(decision.queries.len(), 2);
        assert_eq!(decision.reasoning, "");
    }

    #[test]
    fn test_report_section_accepts_citations_alias() {
        let report: ResearchReport = serde_json::from_str(
            r#"{"sections": [{"title": "Overview", "summary": "s", "citations": [2, 1]}]}"#,
        )
        .expect("decode");
        assert_eq!(report.cited_ids(), vec![2, 1]);
        assert!(report.outline.is_empty());
    }

    #[test]
    fn test_raw_result_defaults_missing_fields() {
        let raw: RawSearchResult =
            serde_json::from_str(r#"{"url": "https://a.org"}"#).expect("decode");
        assert_eq!(raw.source_type, SourceType::Web);
        assert_eq!(raw.snippet, "");
    }
}
