//! Post-synthesis analytics over a finished session

use crate::session::ResearchSession;
use deepwave_core::{extract_domain, ResearchReport, SourceDoc, SourceType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::LazyLock;

const UNKNOWN_BUCKET: &str = "Unknown";
const UNTITLED_SECTION: &str = "(Untitled section)";
const TOP_CITED_SECTIONS: usize = 5;

static YEAR_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").ok());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionOverview {
    pub topic: String,
    /// Words across all section summaries
    pub word_count: usize,
    pub num_sections: usize,
    pub num_sources: usize,
    pub num_web_sources: usize,
    pub num_file_sources: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTypeStat {
    pub source_type: SourceType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainStat {
    pub domain: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationBucketStat {
    /// A four-digit year or "Unknown"
    pub bucket: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredibilityStat {
    pub score: u8,
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionCoverageStat {
    pub title: String,
    pub word_count: usize,
    pub citation_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationFrequencyStat {
    pub citation_id: u32,
    pub title: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveStat {
    pub wave_index: usize,
    pub num_queries: usize,
    pub num_sources_discovered: usize,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyMetrics {
    pub queries_executed: usize,
    /// Sources returned across all queries, duplicates included
    pub total_sources_seen: usize,
    /// Sources handed to the report writer
    pub unique_sources_used: usize,
    /// `None` when no query consulted the cache
    pub cache_hit_rate: Option<f64>,
    pub waves_completed: usize,
    pub total_duration_seconds: f64,
}

/// Everything the analytics view reports about one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsPayload {
    pub overview: SessionOverview,
    pub source_type_stats: Vec<SourceTypeStat>,
    pub domain_stats: Vec<DomainStat>,
    pub publication_stats: Vec<PublicationBucketStat>,
    pub credibility_stats: Vec<CredibilityStat>,
    pub section_coverage: Vec<SectionCoverageStat>,
    pub citation_frequencies: Vec<CitationFrequencyStat>,
    pub sections_with_most_citations: Vec<SectionCoverageStat>,
    pub wave_stats: Vec<WaveStat>,
    pub efficiency: EfficiencyMetrics,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Counts in descending order; equal counts keep first-seen order
fn most_common<K: Eq + Hash + Clone>(items: impl IntoIterator<Item = K>) -> Vec<(K, usize)> {
    let mut order: Vec<K> = Vec::new();
    let mut counts: HashMap<K, usize> = HashMap::new();
    for item in items {
        let count = counts.entry(item.clone()).or_insert(0);
        if *count == 0 {
            order.push(item);
        }
        *count += 1;
    }
    let mut counted: Vec<(K, usize)> = order
        .into_iter()
        .map(|k| {
            let n = counts.get(&k).copied().unwrap_or(0);
            (k, n)
        })
        .collect();
    counted.sort_by(|a, b| b.1.cmp(&a.1));
    counted
}

/// Most recent plausible year mentioned in a publication date
fn publication_bucket(published: Option<&str>) -> String {
    let Some(re) = YEAR_PATTERN.as_ref() else {
        return UNKNOWN_BUCKET.to_string();
    };
    published
        .into_iter()
        .flat_map(|text| re.find_iter(text))
        .filter_map(|m| m.as_str().parse::<u16>().ok())
        .max()
        .map_or_else(|| UNKNOWN_BUCKET.to_string(), |year| year.to_string())
}

fn credibility_label(score: u8) -> &'static str {
    match score {
        5 => "Academic or government",
        4 => "Established news or institution",
        3 => "General",
        2 => "Blog, social or unknown",
        _ => "Unverifiable",
    }
}

fn section_stats(report: &ResearchReport) -> Vec<SectionCoverageStat> {
    report
        .sections
        .iter()
        .map(|section| {
            let title = section.title.trim();
            SectionCoverageStat {
                title: if title.is_empty() {
                    UNTITLED_SECTION.to_string()
                } else {
                    title.to_string()
                },
                word_count: word_count(&section.summary),
                citation_count: section.citation_ids.len(),
            }
        })
        .collect()
}

/// Build the analytics view for a session.
///
/// `sources` is the curated set the report was written from; `report` is
/// `None` when synthesis failed, in which case report-derived stats are empty.
pub fn build_analytics(
    session: &ResearchSession,
    report: Option<&ResearchReport>,
    sources: &[SourceDoc],
) -> AnalyticsPayload {
    let empty = ResearchReport::default();
    let report = report.unwrap_or(&empty);

    let num_file_sources = sources
        .iter()
        .filter(|s| s.source_type == SourceType::File)
        .count();
    let overview = SessionOverview {
        topic: session.topic().to_string(),
        word_count: report
            .sections
            .iter()
            .map(|s| word_count(&s.summary))
            .sum(),
        num_sections: report.sections.len(),
        num_sources: sources.len(),
        num_web_sources: sources.len() - num_file_sources,
        num_file_sources,
    };

    let source_type_stats = most_common(sources.iter().map(|s| s.source_type))
        .into_iter()
        .map(|(source_type, count)| SourceTypeStat { source_type, count })
        .collect();

    let domain_stats = most_common(sources.iter().filter_map(|s| extract_domain(&s.url)))
        .into_iter()
        .map(|(domain, count)| DomainStat { domain, count })
        .collect();

    let mut buckets: BTreeMap<String, usize> = BTreeMap::new();
    for source in sources {
        *buckets
            .entry(publication_bucket(source.published.as_deref()))
            .or_insert(0) += 1;
    }
    let publication_stats = buckets
        .into_iter()
        .map(|(bucket, count)| PublicationBucketStat { bucket, count })
        .collect();

    let mut scores: BTreeMap<u8, usize> = BTreeMap::new();
    for source in sources {
        *scores.entry(source.credibility).or_insert(0) += 1;
    }
    let credibility_stats = scores
        .into_iter()
        .map(|(score, count)| CredibilityStat {
            score,
            label: credibility_label(score).to_string(),
            count,
        })
        .collect();

    let section_coverage = section_stats(report);
    let mut sections_with_most_citations = section_coverage.clone();
    sections_with_most_citations.sort_by(|a, b| b.citation_count.cmp(&a.citation_count));
    sections_with_most_citations.truncate(TOP_CITED_SECTIONS);

    let citation_frequencies = most_common(report.cited_ids())
        .into_iter()
        .map(|(citation_id, count)| CitationFrequencyStat {
            citation_id,
            title: sources
                .iter()
                .find(|s| s.citation_id == citation_id)
                .map(|s| s.title.clone())
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| format!("Source {citation_id}")),
            count,
        })
        .collect();

    let wave_stats = session
        .waves()
        .iter()
        .map(|wave| WaveStat {
            wave_index: wave.wave_number,
            num_queries: wave.queries.len(),
            num_sources_discovered: wave.sources_discovered,
            duration_seconds: wave.elapsed.as_secs_f64(),
        })
        .collect();

    let efficiency = EfficiencyMetrics {
        queries_executed: session.queries().len(),
        total_sources_seen: session.total_sources_seen(),
        unique_sources_used: sources.len(),
        cache_hit_rate: session.cache_hit_rate(),
        waves_completed: session.waves().len(),
        total_duration_seconds: session.elapsed().as_secs_f64(),
    };

    AnalyticsPayload {
        overview,
        source_type_stats,
        domain_stats,
        publication_stats,
        credibility_stats,
        section_coverage,
        citation_frequencies,
        sections_with_most_citations,
        wave_stats,
        efficiency,
    }
}
