//! Multi-wave research orchestration
//!
//! A research run plans queries for a topic, resolves them through the cache
//! and the search collaborators, asks whether follow-up waves are worth it,
//! and hands the best sources to a report writer.
//!
//! # Public API
//!
//! ## Main Entry Point
//! - [`ResearchOrchestrator`] - Runs sessions against a cache and a set of
//!   [`Collaborators`]
//! - [`ResearchOutcome`] - Session, report and analytics of one run
//!
//! ## Pipeline Components
//! - [`SearchExecutor`] - Cache-first, bounded-concurrency query resolution
//! - [`SourceIndex`] - URL deduplication and citation numbering
//! - [`WaveController`] - The bounded wave state machine
//! - [`ReportSynthesizer`] - Report request shaping, validation and retry
//!
//! ## Session & Analytics
//! - [`ResearchSession`] - Root aggregate with read-only views
//! - [`AnalyticsPayload`] - Post-synthesis statistics
//!
//! ## Error Handling
//! - [`ResearchError`] - Error types
//! - [`QueryFailure`] - A captured, non-fatal per-query failure

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod analytics;
mod error;
mod executor;
mod orchestrator;
mod session;
mod source_index;
mod synthesis;
mod wave;

pub use analytics::{
    build_analytics, AnalyticsPayload, CitationFrequencyStat, CredibilityStat, DomainStat,
    EfficiencyMetrics, PublicationBucketStat, SectionCoverageStat, SessionOverview,
    SourceTypeStat, WaveStat,
};
pub use error::{FailureStage, QueryFailure, ResearchError, Result};
pub use executor::{CacheStatus, QueryOutcome, Resolution, SearchExecutor};
pub use orchestrator::{Collaborators, ResearchOrchestrator, ResearchOutcome};
pub use session::{ResearchSession, SessionCacheStats};
pub use source_index::SourceIndex;
pub use synthesis::{
    clip_query_summaries, estimate_tokens, extract_subtopics, truncate_summary, validate_report,
    ReportSynthesizer, SynthesisOutcome, ValidationIssue,
};
pub use wave::{ResearchWave, WaveController, WaveDriver, WavePhase};
