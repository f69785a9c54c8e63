//! Report hand-off: request shaping, validation and the simplified retry

use crate::error::{ResearchError, Result};
use crate::session::ResearchSession;
use deepwave_core::{ReportConfig, ReportRequest, ReportWriter, ResearchReport, SourceDoc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const MIN_SECTION_CHARS: usize = 50;
const MIN_TITLE_CHARS: usize = 10;
const MIN_REPORT_CHARS: usize = 500;

const RETRY_MAX_SUBTOPICS: usize = 5;
const RETRY_QUERY_SUMMARY_CHARS: usize = 1_000;

/// Tail kept when a long source summary is clipped
const SUMMARY_TAIL_CHARS: usize = 200;
const SUMMARY_TRUNCATION_MARKER: &str = "... [truncated] ...";
const TRUNCATION_MARKER: &str = "... [truncated]";

/// Query prefixes used as subtopics are clipped to this length
const SUBTOPIC_CHARS: usize = 60;

const THEMES: &[(&str, &[&str])] = &[
    (
        "Background & Fundamentals",
        &["background", "definition", "what is", "overview", "introduction", "basics", "fundamentals"],
    ),
    (
        "Statistics & Data",
        &["statistics", "data", "numbers", "percentage", "rate", "survey", "study", "research"],
    ),
    (
        "Future Trends & Outlook",
        &["trend", "future", "forecast", "prediction", "outlook", "emerging", "upcoming"],
    ),
    (
        "Case Studies & Examples",
        &["case study", "example", "instance", "use case", "real-world", "implementation"],
    ),
    (
        "Risks & Challenges",
        &["risk", "danger", "threat", "challenge", "problem", "issue", "concern"],
    ),
    (
        "Limitations & Constraints",
        &["limitation", "drawback", "disadvantage", "weakness", "constraint"],
    ),
    (
        "Comparisons & Alternatives",
        &["compare", "comparison", "versus", " vs ", "difference", "alternative"],
    ),
    (
        "Adoption & Implementation",
        &["adoption", "implementation", "deployment", "usage"],
    ),
    (
        "Benefits & Advantages",
        &["benefit", "advantage", "pros", "strength", "positive"],
    ),
];

static ENUMERATION_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:focus on|topics? like|including|such as|e\.g\.|for example)[:\s]+(.+)").ok()
});
static LEADING_ARTICLE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:the|a|an)\s+").ok());

/// A reason a synthesized report is not acceptable as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationIssue {
    MissingSections,
    /// Indices of sections whose summary is empty or too short
    ShortSections(Vec<usize>),
    /// Indices of sections with placeholder-length titles
    GenericTitles(Vec<usize>),
    /// Total summary characters across all sections
    InsufficientContent(usize),
    /// Citation ids that are not among the curated sources
    UnknownCitations(Vec<u32>),
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingSections => write!(f, "missing sections"),
            Self::ShortSections(indices) => write!(f, "empty/too-short sections: {indices:?}"),
            Self::GenericTitles(indices) => write!(f, "generic section titles: {indices:?}"),
            Self::InsufficientContent(total) => {
                write!(f, "insufficient content (total: {total} chars)")
            }
            Self::UnknownCitations(ids) => write!(f, "unknown citations: {ids:?}"),
        }
    }
}

fn describe(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check a report's structure against the sources it was written from.
///
/// An empty result means the report is acceptable.
pub fn validate_report(report: &ResearchReport, known_citations: &[u32]) -> Vec<ValidationIssue> {
    if report.sections.is_empty() {
        return vec![ValidationIssue::MissingSections];
    }

    let mut issues = Vec::new();

    let short: Vec<usize> = report
        .sections
        .iter()
        .enumerate()
        .filter(|(_, s)| s.summary.trim().chars().count() < MIN_SECTION_CHARS)
        .map(|(i, _)| i)
        .collect();
    if !short.is_empty() {
        issues.push(ValidationIssue::ShortSections(short));
    }

    let generic: Vec<usize> = report
        .sections
        .iter()
        .enumerate()
        .filter(|(_, s)| {
            let title = s.title.trim();
            !title.is_empty() && title.chars().count() < MIN_TITLE_CHARS
        })
        .map(|(i, _)| i)
        .collect();
    if !generic.is_empty() {
        issues.push(ValidationIssue::GenericTitles(generic));
    }

    let total: usize = report.sections.iter().map(|s| s.summary.chars().count()).sum();
    if total < MIN_REPORT_CHARS {
        issues.push(ValidationIssue::InsufficientContent(total));
    }

    let unknown: BTreeSet<u32> = report
        .cited_ids()
        .into_iter()
        .filter(|id| !known_citations.contains(id))
        .collect();
    if !unknown.is_empty() {
        issues.push(ValidationIssue::UnknownCitations(unknown.into_iter().collect()));
    }

    issues
}

fn clip_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Clip a long source summary, keeping its opening and its last lines.
pub fn truncate_summary(text: &str, max_chars: usize) -> String {
    let len = text.chars().count();
    if len <= max_chars {
        return text.to_string();
    }
    let head_chars = max_chars.saturating_sub(SUMMARY_TAIL_CHARS);
    let head: String = text.chars().take(head_chars).collect();
    let tail: String = text.chars().skip(len - SUMMARY_TAIL_CHARS.min(len)).collect();
    format!("{head}{SUMMARY_TRUNCATION_MARKER}{tail}")
}

/// Keep query summaries within a combined character budget.
///
/// Entries are taken in order; the one that overflows is clipped and
/// marked, and the rest are dropped.
pub fn clip_query_summaries(summaries: &[String], max_chars: usize) -> Vec<String> {
    let mut remaining = max_chars;
    let mut kept = Vec::new();
    for summary in summaries {
        let len = summary.chars().count();
        if len <= remaining {
            kept.push(summary.clone());
            remaining -= len;
            continue;
        }
        let room = remaining.saturating_sub(TRUNCATION_MARKER.len());
        if room > 0 {
            kept.push(format!("{}{TRUNCATION_MARKER}", clip_chars(summary, room)));
        }
        break;
    }
    kept
}

/// Rough prompt size: four characters per token
pub fn estimate_tokens(request: &ReportRequest) -> usize {
    let chars = request.topic.chars().count()
        + request.subtopics.iter().map(|s| s.chars().count()).sum::<usize>()
        + request.query_summaries.iter().map(|s| s.chars().count()).sum::<usize>()
        + request
            .sources
            .iter()
            .map(|s| s.title.chars().count() + s.url.chars().count() + s.summary.chars().count())
            .sum::<usize>();
    chars / 4
}

/// Subtopics the topic itself enumerates ("... focus on X, Y or Z")
fn subtopics_from_topic(topic: &str, max: usize) -> Vec<String> {
    let strip_article = |part: &str| match LEADING_ARTICLE.as_ref() {
        Some(re) => re.replace(part, "").trim().to_string(),
        None => part.trim().to_string(),
    };

    if let Some(enumerated) = ENUMERATION_PATTERN
        .as_ref()
        .and_then(|re| re.captures(topic))
        .and_then(|c| c.get(1))
    {
        let text = enumerated.as_str();
        for separator in [",", ";", ":", "|", " or ", " and "] {
            if !text.contains(separator) {
                continue;
            }
            let parts: Vec<&str> = text
                .split(separator)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() < 2 {
                continue;
            }
            let cleaned: Vec<String> = parts
                .into_iter()
                .map(strip_article)
                .filter(|p| p.chars().count() > 10)
                .take(max)
                .collect();
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
    }

    if topic.contains(',') {
        let cleaned: Vec<String> = topic
            .split(',')
            .map(str::trim)
            .filter(|p| p.chars().count() > 15 && p.contains(' '))
            .map(str::to_string)
            .collect();
        if cleaned.len() >= 2 {
            return cleaned.into_iter().take(max).collect();
        }
    }

    Vec::new()
}

/// Derive report subtopics from the issued queries.
///
/// Queries are matched against research themes (background, statistics,
/// trends, ...) and the most frequent themes win. Sparse matches are padded
/// with query prefixes; with no queries the topic's own enumeration, or the
/// topic itself, is used.
pub fn extract_subtopics(queries: &[String], topic: &str, max: usize) -> Vec<String> {
    if queries.is_empty() {
        let enumerated = subtopics_from_topic(topic, max);
        if !enumerated.is_empty() {
            return enumerated;
        }
        let topic = topic.trim();
        return if topic.is_empty() || max == 0 {
            Vec::new()
        } else {
            vec![clip_chars(topic, SUBTOPIC_CHARS)]
        };
    }

    let lowered: Vec<String> = queries.iter().map(|q| q.to_lowercase()).collect();
    let mut counted: Vec<(&str, usize)> = THEMES
        .iter()
        .map(|(name, keywords)| {
            let hits = lowered
                .iter()
                .filter(|q| keywords.iter().any(|k| q.contains(k)))
                .count();
            (*name, hits)
        })
        .filter(|(_, hits)| *hits > 0)
        .collect();
    // Stable sort keeps theme order for equal counts
    counted.sort_by(|a, b| b.1.cmp(&a.1));

    let mut subtopics: Vec<String> = counted
        .into_iter()
        .take(max)
        .map(|(name, _)| name.to_string())
        .collect();

    if subtopics.len() < 3 {
        for query in queries.iter().take(5) {
            let prefix = clip_chars(query.trim(), SUBTOPIC_CHARS);
            if !prefix.is_empty() && !subtopics.contains(&prefix) {
                subtopics.push(prefix);
            }
        }
        subtopics.truncate(max);
    }
    subtopics
}

/// What the synthesis step produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    pub report: ResearchReport,
    /// Remaining validation issues; empty when the report is valid
    pub issues: Vec<ValidationIssue>,
    /// Whether the simplified retry was needed
    pub retried: bool,
    /// The curated sources the returned report was written from
    pub sources: Vec<SourceDoc>,
    pub subtopics: Vec<String>,
}

impl SynthesisOutcome {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Shapes the report request, calls the writer and validates its output.
pub struct ReportSynthesizer {
    writer: Arc<dyn ReportWriter>,
    config: ReportConfig,
    call_timeout: Duration,
}

impl ReportSynthesizer {
    pub fn new(writer: Arc<dyn ReportWriter>, config: &ReportConfig, call_timeout: Duration) -> Self {
        Self {
            writer,
            config: config.clone(),
            call_timeout,
        }
    }

    fn prepare_sources(&self, sources: Vec<SourceDoc>) -> Vec<SourceDoc> {
        sources
            .into_iter()
            .map(|mut doc| {
                doc.summary = truncate_summary(&doc.summary, self.config.max_summary_chars);
                doc
            })
            .collect()
    }

    /// The full request for `session`'s curated sources
    pub fn build_request(&self, session: &ResearchSession) -> ReportRequest {
        let queries: Vec<String> = session.queries().iter().map(|q| q.text.clone()).collect();
        let request = ReportRequest {
            topic: session.topic().to_string(),
            subtopics: extract_subtopics(&queries, session.topic(), self.config.max_subtopics),
            query_summaries: clip_query_summaries(
                session.query_summaries(),
                self.config.max_query_summary_chars,
            ),
            sources: self.prepare_sources(session.curated_sources(self.config.max_sources)),
            simplified: false,
        };

        let tokens = estimate_tokens(&request);
        if tokens > self.config.prompt_token_warning {
            warn!(
                "Report request is long (~{tokens} tokens, {} sources); consider fewer sources",
                request.sources.len()
            );
        } else {
            debug!("Report request is ~{tokens} tokens");
        }
        request
    }

    /// The reduced request used for the single retry
    fn simplify(&self, request: &ReportRequest, session: &ResearchSession) -> ReportRequest {
        let limit = self.config.retry_max_sources.min(request.sources.len());
        ReportRequest {
            topic: request.topic.clone(),
            subtopics: request
                .subtopics
                .iter()
                .take(RETRY_MAX_SUBTOPICS)
                .cloned()
                .collect(),
            query_summaries: clip_query_summaries(&request.query_summaries, RETRY_QUERY_SUMMARY_CHARS),
            sources: self.prepare_sources(session.index().top_k(limit)),
            simplified: true,
        }
    }

    async fn call_writer(&self, request: &ReportRequest) -> Result<ResearchReport> {
        match timeout(self.call_timeout, self.writer.write(request)).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(ResearchError::ReportWriter(e.to_string())),
            Err(_) => Err(ResearchError::timeout(
                "report writing",
                self.call_timeout.as_secs(),
            )),
        }
    }

    /// Write and validate the report, retrying once with a simplified
    /// request.
    ///
    /// A retry that still fails validation is returned as a partial report
    /// with its issues. Errors only when neither attempt produced a report.
    pub async fn synthesize(&self, session: &ResearchSession) -> Result<SynthesisOutcome> {
        let request = self.build_request(session);
        let known = citation_ids(&request.sources);

        let first = match self.call_writer(&request).await {
            Ok(report) => {
                let issues = validate_report(&report, &known);
                if issues.is_empty() {
                    info!(
                        "Report generated with {} sections from {} sources",
                        report.sections.len(),
                        request.sources.len()
                    );
                    return Ok(SynthesisOutcome {
                        report,
                        issues,
                        retried: false,
                        sources: request.sources,
                        subtopics: request.subtopics,
                    });
                }
                warn!(
                    "Report failed validation ({}), retrying with a simplified request",
                    describe(&issues)
                );
                Some((report, issues))
            }
            Err(e) => {
                warn!("{e}, retrying with a simplified request");
                None
            }
        };

        let simplified = self.simplify(&request, session);
        let retry_known = citation_ids(&simplified.sources);

        match self.call_writer(&simplified).await {
            Ok(report) => {
                let issues = validate_report(&report, &retry_known);
                if issues.is_empty() {
                    info!("Simplified retry produced a valid report");
                } else {
                    warn!(
                        "Simplified report still has issues ({}), returning it as partial",
                        describe(&issues)
                    );
                }
                Ok(SynthesisOutcome {
                    report,
                    issues,
                    retried: true,
                    sources: simplified.sources,
                    subtopics: simplified.subtopics,
                })
            }
            Err(e) => match first {
                Some((report, issues)) => {
                    warn!("Simplified retry failed ({e}), returning the first report as partial");
                    Ok(SynthesisOutcome {
                        report,
                        issues,
                        retried: true,
                        sources: request.sources,
                        subtopics: request.subtopics,
                    })
                }
                None => Err(e),
            },
        }
    }
}

fn citation_ids(sources: &[SourceDoc]) -> Vec<u32> {
    sources.iter().map(|s| s.citation_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepwave_core::ReportSection;
    use pretty_assertions::assert_eq;

    fn section(title: &str, summary_len: usize, citations: Vec<u32>) -> ReportSection {
        ReportSection {
            title: title.to_string(),
            summary: "a".repeat(summary_len),
            citation_ids: citations,
        }
    }

    #[test]
    fn test_valid_report_has_no_issues() {
        let report = ResearchReport {
            outline: vec!["Deployment overview".to_string()],
            sections: vec![
                section("Deployment overview", 300, vec![1, 2]),
                section("Costs and financing", 300, vec![2]),
            ],
            notes: None,
        };
        assert!(validate_report(&report, &[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_missing_sections_short_circuits() {
        assert_eq!(
            validate_report(&ResearchReport::default(), &[]),
            vec![ValidationIssue::MissingSections]
        );
    }

    #[test]
    fn test_collects_every_issue() {
        let report = ResearchReport {
            outline: Vec::new(),
            sections: vec![
                section("Intro", 20, vec![1, 9]),
                section("Detailed findings", 100, vec![7, 9]),
            ],
            notes: None,
        };
        assert_eq!(
            validate_report(&report, &[1, 2]),
            vec![
                ValidationIssue::ShortSections(vec![0]),
                ValidationIssue::GenericTitles(vec![0]),
                ValidationIssue::InsufficientContent(120),
                ValidationIssue::UnknownCitations(vec![7, 9]),
            ]
        );
    }

    #[test]
    fn test_truncate_summary_keeps_head_and_tail() {
        let text = format!("{}{}", "h".repeat(3_000), "t".repeat(500));
        let clipped = truncate_summary(&text, 3_000);
        assert!(clipped.starts_with(&"h".repeat(2_800)));
        assert!(clipped.contains("... [truncated] ..."));
        assert!(clipped.ends_with(&"t".repeat(200)));
        assert_eq!(
            clipped.chars().count(),
            2_800 + SUMMARY_TRUNCATION_MARKER.len() + 200
        );
        assert_eq!(truncate_summary("short", 3_000), "short");
    }

    #[test]
    fn test_clip_query_summaries_budget() {
        let summaries = vec!["a".repeat(40), "b".repeat(40), "c".repeat(40)];
        let clipped = clip_query_summaries(&summaries, 70);
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped[0], "a".repeat(40));
        assert_eq!(clipped[1], format!("{}... [truncated]", "b".repeat(15)));
        assert_eq!(clip_query_summaries(&summaries, 200).len(), 3);
    }

    #[test]
    fn test_subtopics_from_query_themes() {
        let queries = vec![
            "carbon capture statistics 2020".to_string(),
            "carbon capture future outlook".to_string(),
            "carbon capture cost data".to_string(),
            "risks of carbon capture".to_string(),
        ];
        assert_eq!(
            extract_subtopics(&queries, "Carbon capture", 7),
            vec![
                "Statistics & Data".to_string(),
                "Future Trends & Outlook".to_string(),
                "Risks & Challenges".to_string(),
            ]
        );
    }

    #[test]
    fn test_sparse_themes_padded_with_queries() {
        let queries = vec![
            "solar panel efficiency".to_string(),
            "solar adoption in europe".to_string(),
        ];
        assert_eq!(
            extract_subtopics(&queries, "Solar", 7),
            vec![
                "Adoption & Implementation".to_string(),
                "solar panel efficiency".to_string(),
                "solar adoption in europe".to_string(),
            ]
        );
    }

    #[test]
    fn test_subtopics_from_topic_enumeration() {
        let topic = "Future of space exploration: focus on Mars colonization missions, advanced propulsion systems, or the search for extraterrestrial life";
        assert_eq!(
            extract_subtopics(&[], topic, 7),
            vec![
                "Mars colonization missions".to_string(),
                "advanced propulsion systems".to_string(),
                "or the search for extraterrestrial life".to_string(),
            ]
        );
    }

    #[test]
    fn test_subtopics_fall_back_to_topic() {
        assert_eq!(
            extract_subtopics(&[], "Geothermal energy", 7),
            vec!["Geothermal energy".to_string()]
        );
        assert!(extract_subtopics(&[], "  ", 7).is_empty());
    }

    #[test]
    fn test_estimate_tokens() {
        let request = ReportRequest {
            topic: "abcd".to_string(),
            subtopics: vec!["efgh".to_string()],
            query_summaries: vec!["ijkl".to_string()],
            sources: Vec::new(),
            simplified: false,
        };
        assert_eq!(estimate_tokens(&request), 3);
    }
}
