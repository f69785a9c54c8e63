//! Collaborator traits consumed by the research core
//!
//! Model calls and web search live outside this workspace. Implementations
//! wrap whatever client they use and decode responses into the boundary model
//! (see [`crate::structured`] for turning chatty model text into those structs).

use crate::error::Result;
use crate::models::{
    Findings, FollowUpDecision, RawSearchResult, ReportRequest, ResearchPlan, ResearchReport,
    SearchResponse,
};
use async_trait::async_trait;

/// Turns a research topic into initial queries
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    /// Produce queries plus a recommended number of sources for the report
    async fn plan(&self, topic: &str) -> Result<ResearchPlan>;
}

/// The external search capability
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query, returning at most `max_results` raw hits
    async fn search(&self, query: &str, max_results: usize) -> Result<SearchResponse>;
}

/// Produces a detailed summary of one raw result
#[async_trait]
pub trait ResultSummarizer: Send + Sync {
    async fn summarize(&self, query: &str, result: &RawSearchResult) -> Result<String>;
}

/// Decides whether another research wave is warranted
#[async_trait]
pub trait FollowUpDecider: Send + Sync {
    /// Return `should_continue` and, when continuing, new targeted queries
    async fn decide(&self, topic: &str, findings: &Findings) -> Result<FollowUpDecision>;
}

/// Writes the structured report from curated sources
#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write(&self, request: &ReportRequest) -> Result<ResearchReport>;
}
