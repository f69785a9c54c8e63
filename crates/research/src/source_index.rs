//! Session-wide source deduplication and citation numbering

use deepwave_core::{normalize_url, score_credibility, SourceCandidate, SourceDoc, SourceUrl};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use twox_hash::XxHash3_128;

/// Characters of a summary that feed the content fingerprint
const FINGERPRINT_CHARS: usize = 500;

/// Fingerprint of a summary's opening text, used to spot the same content
/// published under different URLs.
pub(crate) fn content_hash(summary: &str) -> String {
    let head: String = summary
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(FINGERPRINT_CHARS)
        .collect();
    format!("{:032x}", XxHash3_128::oneshot(head.as_bytes()))
}

fn richness(doc: &SourceDoc) -> (usize, u8) {
    (doc.summary.chars().count(), doc.credibility)
}

#[derive(Debug, Default)]
struct IndexState {
    /// Indexed sources in citation order; `docs[i].citation_id == i + 1`
    docs: Vec<SourceDoc>,
    by_key: HashMap<String, usize>,
    merges: usize,
}

/// Deduplicates sources by normalized URL and assigns citation ids.
///
/// Citation ids start at 1, increase by one per new URL and are never
/// reassigned. All mutation goes through one lock, so concurrent `add`
/// calls observe a single total order.
#[derive(Debug, Default)]
pub struct SourceIndex {
    state: Mutex<IndexState>,
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexState> {
        // A panic while holding the lock cannot leave the vectors half-written
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Index `candidate`, returning its citation id.
    ///
    /// A URL already present keeps its id; the longer of the two summaries is
    /// retained along with its fingerprint.
    pub fn add(&self, candidate: &SourceCandidate) -> u32 {
        // Relative or unusable URLs only identify a page together with its title
        let url = match normalize_url(&candidate.url) {
            url if url.is_web() => url,
            _ => SourceUrl::anchor(&format!(
                "{}\n{}",
                candidate.title.trim(),
                candidate.url.trim()
            )),
        };
        let key = url.dedup_key();

        let mut state = self.lock();

        if let Some(&position) = state.by_key.get(&key) {
            state.merges += 1;
            let existing = &mut state.docs[position];
            if candidate.summary.chars().count() > existing.summary.chars().count() {
                existing.summary = candidate.summary.clone();
                existing.content_hash = content_hash(&candidate.summary);
            }
            if existing.published.is_none() {
                existing.published = candidate.published.clone();
            }
            if existing.title == deepwave_core::models::UNTITLED_SOURCE
                && !candidate.title.trim().is_empty()
            {
                existing.title = candidate.title.clone();
            }
            return existing.citation_id;
        }

        let citation_id = u32::try_from(state.docs.len() + 1).unwrap_or(u32::MAX);
        let url = url.into_string();
        let doc = SourceDoc {
            citation_id,
            credibility: score_credibility(&url, candidate.source_type),
            url,
            title: candidate.title.clone(),
            summary: candidate.summary.clone(),
            content_hash: content_hash(&candidate.summary),
            published: candidate.published.clone(),
            source_type: candidate.source_type,
            found_by: candidate.found_by.clone(),
        };
        let position = state.docs.len();
        state.docs.push(doc);
        state.by_key.insert(key, position);
        citation_id
    }

    pub fn len(&self) -> usize {
        self.lock().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, citation_id: u32) -> Option<SourceDoc> {
        let index = usize::try_from(citation_id).ok()?.checked_sub(1)?;
        self.lock().docs.get(index).cloned()
    }

    /// Every indexed source in citation order
    pub fn all(&self) -> Vec<SourceDoc> {
        self.lock().docs.clone()
    }

    /// Number of `add` calls that landed on an already indexed URL
    pub fn merged_duplicates(&self) -> usize {
        self.lock().merges
    }

    /// Sources whose content fingerprint matches an earlier source at another URL
    pub fn near_duplicates(&self) -> usize {
        let state = self.lock();
        let mut seen = HashSet::new();
        state
            .docs
            .iter()
            .filter(|doc| !seen.insert(doc.content_hash.as_str()))
            .count()
    }

    /// The `k` richest sources, returned in citation order.
    ///
    /// Richness is summary length, then credibility; equal scores keep the
    /// earlier citation. Citation ids are never renumbered.
    pub fn top_k(&self, k: usize) -> Vec<SourceDoc> {
        let state = self.lock();
        let mut ranked: Vec<&SourceDoc> = state.docs.iter().collect();
        ranked.sort_by(|a, b| {
            richness(b)
                .cmp(&richness(a))
                .then(a.citation_id.cmp(&b.citation_id))
        });
        let mut selected: Vec<SourceDoc> = ranked.into_iter().take(k).cloned().collect();
        selected.sort_by_key(|doc| doc.citation_id);
        selected
    }
}
