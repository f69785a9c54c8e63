//! The research session aggregate and its derived views

use crate::error::QueryFailure;
use crate::executor::{CacheStatus, Resolution};
use crate::source_index::SourceIndex;
use crate::wave::ResearchWave;
use chrono::{DateTime, Utc};
use deepwave_core::{normalize_query, FindingHighlight, Findings, Query, SourceDoc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Characters of each source summary shown to the follow-up decision
const HIGHLIGHT_EXCERPT_CHARS: usize = 100;

/// Cache counters observed by one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub bypasses: u64,
}

impl SessionCacheStats {
    /// Fraction of cache-eligible queries that hit; `None` before any lookup
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}

/// Root aggregate of one research request.
///
/// Owns the source index, the ordered wave history and the cumulative
/// counters. Everything exposed here is a read-only view; mutation happens
/// through the wave controller.
#[derive(Debug)]
pub struct ResearchSession {
    id: Uuid,
    topic: String,
    started_at: DateTime<Utc>,
    started: Instant,
    finished: Option<Duration>,
    index: SourceIndex,
    waves: Vec<ResearchWave>,
    queries: Vec<Query>,
    query_summaries: Vec<String>,
    failures: Vec<QueryFailure>,
    cache: SessionCacheStats,
    sources_seen: usize,
    recommended_source_count: Option<usize>,
}

impl ResearchSession {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into().trim().to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            finished: None,
            index: SourceIndex::new(),
            waves: Vec::new(),
            queries: Vec::new(),
            query_summaries: Vec::new(),
            failures: Vec::new(),
            cache: SessionCacheStats::default(),
            sources_seen: 0,
            recommended_source_count: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn index(&self) -> &SourceIndex {
        &self.index
    }

    /// Completed waves, oldest first
    pub fn waves(&self) -> &[ResearchWave] {
        &self.waves
    }

    /// Every query issued, in the order results arrived
    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn query_summaries(&self) -> &[String] {
        &self.query_summaries
    }

    pub fn failures(&self) -> &[QueryFailure] {
        &self.failures
    }

    pub fn cache_stats(&self) -> SessionCacheStats {
        self.cache
    }

    pub fn cache_hit_rate(&self) -> Option<f64> {
        self.cache.hit_rate()
    }

    /// Sources returned across all queries, duplicates included
    pub fn total_sources_seen(&self) -> usize {
        self.sources_seen
    }

    /// Distinct sources retained in the index
    pub fn unique_sources(&self) -> usize {
        self.index.len()
    }

    pub fn recommended_source_count(&self) -> Option<usize> {
        self.recommended_source_count
    }

    /// `(wave_number, elapsed)` for each completed wave
    pub fn wave_timings(&self) -> Vec<(usize, Duration)> {
        self.waves
            .iter()
            .map(|w| (w.wave_number, w.elapsed))
            .collect()
    }

    /// Wall time of the session, frozen once it finishes
    pub fn elapsed(&self) -> Duration {
        self.finished.unwrap_or_else(|| self.started.elapsed())
    }

    /// The curated source set for the report writer.
    ///
    /// Uses the planner's recommended count when it gave one, never more
    /// than `max_sources`.
    pub fn curated_sources(&self, max_sources: usize) -> Vec<SourceDoc> {
        let k = match self.recommended_source_count {
            Some(n) if n > 0 => n.min(max_sources),
            _ => max_sources,
        };
        self.index.top_k(k)
    }

    /// Accumulated findings for the follow-up decision
    pub fn findings(&self, highlights: usize) -> Findings {
        let highlights = self
            .index
            .top_k(highlights)
            .into_iter()
            .map(|doc| FindingHighlight {
                citation_id: doc.citation_id,
                excerpt: excerpt(&doc.summary),
                title: doc.title,
            })
            .collect();

        Findings {
            topic: self.topic.clone(),
            waves_completed: self.waves.len(),
            total_sources: self.index.len(),
            queries_issued: self.queries.iter().map(|q| q.text.clone()).collect(),
            highlights,
            query_summaries: self.query_summaries.clone(),
        }
    }

    /// Normalized forms of every query issued so far
    pub(crate) fn issued_queries(&self) -> HashSet<String> {
        self.queries.iter().map(|q| normalize_query(&q.text)).collect()
    }

    pub(crate) fn set_recommended_source_count(&mut self, count: usize) {
        self.recommended_source_count = (count > 0).then_some(count);
    }

    /// Fold one executor batch into the session counters
    pub(crate) fn record_resolution(&mut self, resolution: &Resolution) {
        for outcome in &resolution.outcomes {
            match outcome.cache {
                CacheStatus::Hit(_) => self.cache.hits += 1,
                CacheStatus::Miss => self.cache.misses += 1,
                CacheStatus::Bypassed => self.cache.bypasses += 1,
            }
            self.sources_seen += outcome.bundle.sources.len();
            if let Some(summary) = outcome.query_summary() {
                if !self.query_summaries.contains(&summary) {
                    self.query_summaries.push(summary);
                }
            }
            self.queries.push(outcome.query.clone());
        }
        self.failures.extend(resolution.failures.iter().cloned());
    }

    pub(crate) fn record_wave(&mut self, wave: ResearchWave) {
        assert_eq!(
            wave.wave_number,
            self.waves.len() + 1,
            "waves must be recorded in order"
        );
        self.waves.push(wave);
    }

    pub(crate) fn finish(&mut self) {
        if self.finished.is_none() {
            self.finished = Some(self.started.elapsed());
        }
    }
}

fn excerpt(summary: &str) -> String {
    let trimmed = summary.trim();
    if trimmed.chars().count() <= HIGHLIGHT_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(HIGHLIGHT_EXCERPT_CHARS).collect();
    format!("{}...", clipped.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::QueryOutcome;
    use deepwave_cache::CacheLayer;
    use deepwave_core::{SourceBundle, SourceCandidate, SourceType};
    use pretty_assertions::assert_eq;

    fn outcome(query: &str, cache: CacheStatus, urls: &[&str]) -> QueryOutcome {
        QueryOutcome {
            query: Query::new(query, 1),
            bundle: SourceBundle {
                query_summary: Some(format!("About {query}")),
                sources: urls
                    .iter()
                    .map(|url| SourceCandidate {
                        url: url.to_string(),
                        title: format!("Page {url}"),
                        summary: "x".repeat(150),
                        published: None,
                        source_type: SourceType::Web,
                        found_by: query.to_string(),
                    })
                    .collect(),
            },
            cache,
            resolved: true,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_record_resolution_counts() {
        let mut session = ResearchSession::new("  Ocean energy ");
        let resolution = Resolution {
            sources: Vec::new(),
            failures: Vec::new(),
            outcomes: vec![
                outcome("tidal", CacheStatus::Miss, &["https://a.com", "https://b.com"]),
                outcome("wave", CacheStatus::Hit(CacheLayer::Memory), &["https://a.com"]),
                outcome("latest wave farms", CacheStatus::Bypassed, &[]),
            ],
        };
        for o in &resolution.outcomes {
            for c in &o.bundle.sources {
                session.index().add(c);
            }
        }
        session.record_resolution(&resolution);

        assert_eq!(session.topic(), "Ocean energy");
        assert_eq!(session.total_sources_seen(), 3);
        assert_eq!(session.unique_sources(), 2);
        assert_eq!(
            session.cache_stats(),
            SessionCacheStats {
                hits: 1,
                misses: 1,
                bypasses: 1
            }
        );
        assert_eq!(session.cache_hit_rate(), Some(0.5));
        assert_eq!(session.query_summaries().len(), 3);
        assert!(session.issued_queries().contains("latest wave farms"));
    }

    #[test]
    fn test_curated_sources_respects_recommendation() {
        let mut session = ResearchSession::new("topic");
        for i in 0..6 {
            session.index().add(&SourceCandidate {
                url: format!("https://site{i}.com"),
                title: format!("Site {i}"),
                summary: "summary".to_string(),
                published: None,
                source_type: SourceType::Web,
                found_by: "q".to_string(),
            });
        }

        assert_eq!(session.curated_sources(4).len(), 4);
        session.set_recommended_source_count(2);
        assert_eq!(session.curated_sources(4).len(), 2);
        session.set_recommended_source_count(10);
        assert_eq!(session.curated_sources(4).len(), 4);
        session.set_recommended_source_count(0);
        assert_eq!(session.recommended_source_count(), None);
    }

    #[test]
    fn test_findings_clip_excerpts() {
        let session = ResearchSession::new("topic");
        let resolution = Resolution {
            outcomes: vec![outcome("q", CacheStatus::Miss, &["https://a.com"])],
            ..Default::default()
        };
        session.index().add(&resolution.outcomes[0].bundle.sources[0]);

        let findings = session.findings(10);
        assert_eq!(findings.total_sources, 1);
        assert_eq!(findings.highlights.len(), 1);
        assert_eq!(findings.highlights[0].citation_id, 1);
        assert_eq!(findings.highlights[0].excerpt.chars().count(), 103);
        assert!(findings.highlights[0].excerpt.ends_with("..."));
    }

    #[test]
    #[should_panic(expected = "waves must be recorded in order")]
    fn test_out_of_order_wave_panics() {
        let mut session = ResearchSession::new("topic");
        session.record_wave(ResearchWave {
            wave_number: 2,
            queries: Vec::new(),
            sources_discovered: 0,
            cache_hits: 0,
            failures: 0,
            continue_research: false,
            elapsed: Duration::ZERO,
        });
    }

    #[test]
    fn test_elapsed_freezes_on_finish() {
        let mut session = ResearchSession::new("topic");
        session.finish();
        let first = session.elapsed();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(session.elapsed(), first);
        assert!(session.wave_timings().is_empty());
    }
}
