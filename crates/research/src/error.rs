//! Error types for research runs

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Query planning failed: {0}")]
    Planner(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Summarization failed: {0}")]
    Summarize(String),

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("Follow-up decision failed: {0}")]
    FollowUp(String),

    #[error("Report writer failed: {0}")]
    ReportWriter(String),

    #[error(transparent)]
    Core(#[from] deepwave_core::Error),
}

impl ResearchError {
    pub(crate) fn timeout(operation: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            seconds,
        }
    }

    /// Whether the same call could succeed if repeated
    pub(crate) fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Search(_) => true,
            Self::Core(e) => e.is_transient(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ResearchError>;

/// Where a query's resolution went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    Search,
    Summarize,
    Timeout,
}

/// A per-query failure captured instead of aborting the batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub query: String,
    pub stage: FailureStage,
    pub message: String,
}

impl QueryFailure {
    pub(crate) fn new(query: &str, error: &ResearchError) -> Self {
        let stage = match error {
            ResearchError::Timeout { .. } => FailureStage::Timeout,
            ResearchError::Summarize(_) => FailureStage::Summarize,
            _ => FailureStage::Search,
        };
        Self {
            query: query.to_string(),
            stage,
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for QueryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' ({:?}): {}", self.query, self.stage, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_stage_follows_error_kind() {
        let timeout = QueryFailure::new("q", &ResearchError::timeout("search", 60));
        assert_eq!(timeout.stage, FailureStage::Timeout);
        assert_eq!(timeout.message, "search timed out after 60s");

        let summarize = QueryFailure::new("q", &ResearchError::Summarize("boom".into()));
        assert_eq!(summarize.stage, FailureStage::Summarize);

        let core = QueryFailure::new(
            "q",
            &ResearchError::Core(deepwave_core::Error::collaborator("search", "503")),
        );
        assert_eq!(core.stage, FailureStage::Search);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ResearchError::timeout("search", 1).is_retryable());
        assert!(ResearchError::Search("reset".into()).is_retryable());
        assert!(!ResearchError::Core(deepwave_core::Error::invalid_input("bad")).is_retryable());
        assert!(!ResearchError::Summarize("x".into()).is_retryable());
    }
}
