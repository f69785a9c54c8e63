//! Core types and traits for the deepwave research orchestrator
//!
//! This crate provides the foundational pieces shared by the cache, the
//! research pipeline and the CLI:
//!
//! - **Models**: the boundary structs collaborators produce and consume
//! - **Collaborators**: traits for planning, search, summarization, follow-up
//!   decisions and report writing
//! - **Sources**: URL normalization and credibility scoring
//! - **Configuration**: layered config loading
//! - **Error handling**: unified error types
//!

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod collaborators;
pub mod config;
pub mod credibility;
pub mod error;
pub mod models;
pub mod source_url;
pub mod structured;

// Re-export main types for convenience
pub use collaborators::{
    FollowUpDecider, QueryPlanner, ReportWriter, ResultSummarizer, SearchProvider,
};
pub use config::{CacheConfig, Config, ReportConfig, SearchConfig, WaveConfig};
pub use credibility::score_credibility;
pub use error::{truncate_for_error, Error, Result, ResultExt};
pub use models::{
    clean_queries, normalize_query, FindingHighlight, Findings, FollowUpDecision, Query,
    RawSearchResult, ReportRequest, ReportSection, ResearchPlan, ResearchReport, SearchResponse,
    SourceBundle, SourceCandidate, SourceDoc, SourceType,
};
pub use source_url::{extract_domain, normalize_url, SourceUrl};
pub use structured::{extract_json, parse_model_output};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Result, ResultExt};
    pub use crate::models::{SourceCandidate, SourceDoc};
}
