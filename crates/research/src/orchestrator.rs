//! Research runs: wiring collaborators, the cache and the wave loop
//!
//! [`ResearchOrchestrator::research`] plans, searches and follows up through
//! the [`WaveController`](crate::WaveController), then synthesizes a report and
//! analytics over the curated sources.

use crate::analytics::{build_analytics, AnalyticsPayload};
use crate::error::{ResearchError, Result};
use crate::executor::SearchExecutor;
use crate::session::ResearchSession;
use crate::synthesis::{ReportSynthesizer, SynthesisOutcome};
use crate::wave::{WaveController, WaveDriver};
use deepwave_cache::CacheManager;
use deepwave_core::{
    Config, FollowUpDecider, QueryPlanner, ReportWriter, ResultSummarizer, SearchProvider,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// The external services a research run depends on
#[derive(Clone)]
pub struct Collaborators {
    pub planner: Arc<dyn QueryPlanner>,
    pub search: Arc<dyn SearchProvider>,
    pub summarizer: Arc<dyn ResultSummarizer>,
    pub decider: Arc<dyn FollowUpDecider>,
    pub writer: Arc<dyn ReportWriter>,
}

/// Result of one research run.
///
/// `synthesis` is `None` only when the report writer failed on both
/// attempts; the session still carries every source gathered.
#[derive(Debug)]
pub struct ResearchOutcome {
    pub session: ResearchSession,
    pub synthesis: Option<SynthesisOutcome>,
    pub report_error: Option<String>,
    pub analytics: AnalyticsPayload,
}

/// Runs research sessions against one cache and one set of collaborators.
pub struct ResearchOrchestrator {
    config: Config,
    planner: Arc<dyn QueryPlanner>,
    decider: Arc<dyn FollowUpDecider>,
    executor: SearchExecutor,
    synthesizer: ReportSynthesizer,
}

impl std::fmt::Debug for ResearchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchOrchestrator")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish()
    }
}

impl ResearchOrchestrator {
    pub fn new(
        config: Config,
        cache: Arc<CacheManager>,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ResearchError::Config(e.to_string()))?;

        let executor = SearchExecutor::new(
            cache,
            collaborators.search,
            collaborators.summarizer,
            &config.search,
        );
        let synthesizer = ReportSynthesizer::new(
            collaborators.writer,
            &config.report,
            Duration::from_secs(config.search.call_timeout_secs.max(1)),
        );

        Ok(Self {
            planner: collaborators.planner,
            decider: collaborators.decider,
            executor,
            synthesizer,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Research `topic` through the wave loop and synthesize a report.
    ///
    /// Only an empty topic is rejected. Collaborator failures degrade the
    /// outcome instead of failing it.
    pub async fn research(&self, topic: &str) -> Result<ResearchOutcome> {
        if topic.trim().is_empty() {
            return Err(deepwave_core::Error::invalid_input("research topic is empty").into());
        }

        let mut session = ResearchSession::new(topic);
        let mut controller = WaveController::new(&self.config);
        let driver = WaveDriver {
            planner: self.planner.as_ref(),
            decider: self.decider.as_ref(),
            executor: &self.executor,
            synthesizer: &self.synthesizer,
        };

        let (synthesis, report_error) = match controller.run(&mut session, driver).await {
            Ok(outcome) => (Some(outcome), None),
            Err(e) => {
                error!(
                    "Report synthesis failed for session {}: {e}; returning {} sources without a report",
                    session.id(),
                    session.unique_sources()
                );
                (None, Some(e.to_string()))
            }
        };

        let analytics = match &synthesis {
            Some(outcome) => build_analytics(&session, Some(&outcome.report), &outcome.sources),
            None => build_analytics(
                &session,
                None,
                &session.curated_sources(self.config.report.max_sources),
            ),
        };

        info!(
            "Research session {} finished in {:.2}s: {} waves, {} queries, {} unique sources",
            session.id(),
            session.elapsed().as_secs_f64(),
            session.waves().len(),
            session.queries().len(),
            session.unique_sources()
        );

        Ok(ResearchOutcome {
            session,
            synthesis,
            report_error,
            analytics,
        })
    }
}
