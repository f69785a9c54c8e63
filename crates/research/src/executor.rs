//! Cache-first, bounded-concurrency query resolution
//!
//! Two independent pools bound outbound work: at most `concurrency_limit`
//! queries are resolved at once, and a semaphore caps summarization calls
//! across all of them. A failure in one query is captured as a
//! [`QueryFailure`] and never aborts its siblings.

use crate::error::{QueryFailure, ResearchError, Result};
use crate::source_index::SourceIndex;
use deepwave_cache::{CacheLayer, CacheLookup, CacheManager};
use deepwave_core::{
    Query, RawSearchResult, ResultSummarizer, SearchConfig, SearchProvider, SearchResponse,
    SourceBundle, SourceCandidate, SourceDoc,
};
use futures::future::join_all;
use futures::stream::{self, Stream, StreamExt};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(8);

/// How the cache answered for one query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit(CacheLayer),
    Miss,
    /// Time-sensitive query, cache not consulted
    Bypassed,
}

/// Everything learned while resolving one query
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub query: Query,
    pub bundle: SourceBundle,
    pub cache: CacheStatus,
    /// False when the search call itself failed and the bundle is empty
    pub resolved: bool,
    pub failures: Vec<QueryFailure>,
    pub elapsed: Duration,
}

impl QueryOutcome {
    pub fn is_cache_hit(&self) -> bool {
        matches!(self.cache, CacheStatus::Hit(_))
    }

    /// The provider's query-level summary, labelled with its query
    pub fn query_summary(&self) -> Option<String> {
        self.bundle
            .query_summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("Query: {}\nSummary: {s}", self.query.text))
    }
}

/// Result of resolving a batch of queries
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Distinct sources touched by this batch, in citation order
    pub sources: Vec<SourceDoc>,
    pub failures: Vec<QueryFailure>,
    /// Per-query outcomes in completion order
    pub outcomes: Vec<QueryOutcome>,
}

/// Resolves queries into summarized sources.
pub struct SearchExecutor {
    cache: Arc<CacheManager>,
    search: Arc<dyn SearchProvider>,
    summarizer: Arc<dyn ResultSummarizer>,
    summary_permits: Semaphore,
    summary_limit: usize,
    results_per_query: usize,
    call_timeout: Duration,
    retry_attempts: usize,
    retry_backoff: Duration,
}

impl std::fmt::Debug for SearchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchExecutor")
            .field("summary_limit", &self.summary_limit)
            .field("results_per_query", &self.results_per_query)
            .field("call_timeout", &self.call_timeout)
            .field("retry_attempts", &self.retry_attempts)
            .finish()
    }
}

impl SearchExecutor {
    pub fn new(
        cache: Arc<CacheManager>,
        search: Arc<dyn SearchProvider>,
        summarizer: Arc<dyn ResultSummarizer>,
        config: &SearchConfig,
    ) -> Self {
        let summary_limit = config.summary_concurrency_limit.max(1);
        Self {
            cache,
            search,
            summarizer,
            summary_permits: Semaphore::new(summary_limit),
            summary_limit,
            results_per_query: config.results_per_query.max(1),
            call_timeout: Duration::from_secs(config.call_timeout_secs.max(1)),
            retry_attempts: config.retry_attempts,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// Resolve `queries`, yielding each outcome as soon as it completes.
    ///
    /// At most `concurrency_limit` queries are in flight. Completion order is
    /// unspecified.
    pub fn stream(
        &self,
        queries: Vec<Query>,
        concurrency_limit: usize,
    ) -> impl Stream<Item = QueryOutcome> + '_ {
        stream::iter(queries)
            .map(move |query| self.resolve_query(query))
            .buffer_unordered(concurrency_limit.max(1))
    }

    /// Resolve a batch, merging sources into `index` as each query finishes.
    ///
    /// Best effort: failed queries are reported in [`Resolution::failures`]
    /// and everything else is kept. Sources merged before the future is
    /// dropped stay in the index.
    pub async fn resolve(
        &self,
        queries: &[Query],
        concurrency_limit: usize,
        index: &SourceIndex,
    ) -> Resolution {
        let mut resolution = Resolution::default();
        let mut touched = BTreeSet::new();

        let mut outcomes = Box::pin(self.stream(queries.to_vec(), concurrency_limit));
        while let Some(outcome) = outcomes.next().await {
            for candidate in &outcome.bundle.sources {
                touched.insert(index.add(candidate));
            }
            resolution.failures.extend(outcome.failures.iter().cloned());
            resolution.outcomes.push(outcome);
        }

        resolution.sources = touched.into_iter().filter_map(|id| index.get(id)).collect();
        info!(
            "Resolved {} queries: {} sources, {} failures",
            queries.len(),
            resolution.sources.len(),
            resolution.failures.len()
        );
        resolution
    }

    async fn resolve_query(&self, query: Query) -> QueryOutcome {
        let started = Instant::now();

        let cache = match self.cache.lookup(&query.text).await {
            CacheLookup::Hit { bundle, layer } => {
                debug!("Cache hit ({layer:?}) for query: {}", query.text);
                return QueryOutcome {
                    query,
                    bundle,
                    cache: CacheStatus::Hit(layer),
                    resolved: true,
                    failures: Vec::new(),
                    elapsed: started.elapsed(),
                };
            }
            CacheLookup::Miss => CacheStatus::Miss,
            CacheLookup::Bypassed => CacheStatus::Bypassed,
        };

        let response = match self.search_with_retry(&query.text).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Query '{}' failed: {e}", query.text);
                return QueryOutcome {
                    failures: vec![QueryFailure::new(&query.text, &e)],
                    query,
                    bundle: SourceBundle::default(),
                    cache,
                    resolved: false,
                    elapsed: started.elapsed(),
                };
            }
        };

        let raw: Vec<RawSearchResult> = response
            .results
            .into_iter()
            .filter_map(RawSearchResult::sanitize)
            .take(self.results_per_query)
            .collect();

        let summaries = join_all(raw.iter().map(|r| self.summarize(&query.text, r))).await;

        let mut failures = Vec::new();
        let sources: Vec<SourceCandidate> = raw
            .iter()
            .zip(summaries)
            .map(|(result, summary)| {
                let text = match summary {
                    Ok(text) => text,
                    Err(e) => {
                        debug!("Falling back to snippet for {}: {e}", result.url);
                        failures.push(QueryFailure::new(&query.text, &e));
                        fallback_summary(result)
                    }
                };
                SourceCandidate::from_raw(result, text, &query.text)
            })
            .collect();

        let bundle = SourceBundle {
            query_summary: response.summary,
            sources,
        };

        if cache == CacheStatus::Miss && failures.is_empty() && !bundle.sources.is_empty() {
            self.cache.store(&query.text, &bundle).await;
        } else if !failures.is_empty() {
            debug!(
                "Not caching degraded results for '{}' ({} summaries failed)",
                query.text,
                failures.len()
            );
        }

        QueryOutcome {
            query,
            bundle,
            cache,
            resolved: true,
            failures,
            elapsed: started.elapsed(),
        }
    }

    async fn search_once(&self, query: &str) -> Result<SearchResponse> {
        match timeout(
            self.call_timeout,
            self.search.search(query, self.results_per_query),
        )
        .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_transient() => Err(ResearchError::Search(e.to_string())),
            Ok(Err(e)) => Err(ResearchError::Core(e)),
            Err(_) => Err(ResearchError::timeout("search", self.call_timeout.as_secs())),
        }
    }

    async fn search_with_retry(&self, query: &str) -> Result<SearchResponse> {
        let max_attempts = self.retry_attempts + 1;
        let mut backoff = self.retry_backoff;
        let mut attempt = 1;

        loop {
            match self.search_once(query).await {
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    warn!(
                        "Search for '{query}' failed: {e}. Retrying in {backoff:?} (attempt {attempt}/{max_attempts})"
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 1 {
                        warn!("Giving up on search for '{query}' after {attempt} attempts");
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn summarize(&self, query: &str, result: &RawSearchResult) -> Result<String> {
        let _permit = self
            .summary_permits
            .acquire()
            .await
            .map_err(|_| ResearchError::Summarize("summarization pool closed".to_string()))?;

        let summary = match timeout(self.call_timeout, self.summarizer.summarize(query, result)).await
        {
            Ok(Ok(summary)) => summary,
            Ok(Err(e)) => return Err(ResearchError::Summarize(e.to_string())),
            Err(_) => {
                return Err(ResearchError::timeout(
                    "summarization",
                    self.call_timeout.as_secs(),
                ))
            }
        };

        let trimmed = summary.trim();
        if trimmed.is_empty() {
            return Err(ResearchError::Summarize(format!(
                "empty summary for {}",
                result.url
            )));
        }
        Ok(trimmed.to_string())
    }
}

/// Text kept for a result whose summarization failed
fn fallback_summary(result: &RawSearchResult) -> String {
    if result.snippet.is_empty() {
        result.title.clone()
    } else {
        result.snippet.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deepwave_core::SourceType;

    #[test]
    fn test_query_summary_format() {
        let outcome = QueryOutcome {
            query: Query::new("heat pumps", 1),
            bundle: SourceBundle {
                query_summary: Some("  Efficient in cold climates. ".to_string()),
                sources: Vec::new(),
            },
            cache: CacheStatus::Miss,
            resolved: true,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert_eq!(
            outcome.query_summary().as_deref(),
            Some("Query: heat pumps\nSummary: Efficient in cold climates.")
        );
        assert!(!outcome.is_cache_hit());
    }

    #[test]
    fn test_blank_query_summary_is_dropped() {
        let outcome = QueryOutcome {
            query: Query::new("q", 1),
            bundle: SourceBundle {
                query_summary: Some("   ".to_string()),
                sources: Vec::new(),
            },
            cache: CacheStatus::Hit(CacheLayer::Memory),
            resolved: true,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        };
        assert_eq!(outcome.query_summary(), None);
        assert!(outcome.is_cache_hit());
    }

    #[test]
    fn test_fallback_prefers_snippet() {
        let with_snippet = RawSearchResult::new("https://a.com", "Title", "Snippet text");
        assert_eq!(fallback_summary(&with_snippet), "Snippet text");

        let bare = RawSearchResult::new("https://a.com", "Title", "")
            .with_source_type(SourceType::News);
        assert_eq!(fallback_summary(&bare), "Title");
    }
}
