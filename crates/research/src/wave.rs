//! The bounded research loop
//!
//! `Planning -> Searching -> Evaluating -> {Searching | Synthesizing} -> Done`
//!
//! The loop runs at most `max_waves` searches no matter what the follow-up
//! collaborator answers; exceeding the ceiling is a programming error and
//! panics.

use crate::error::{ResearchError, Result};
use crate::executor::SearchExecutor;
use crate::session::ResearchSession;
use crate::synthesis::{ReportSynthesizer, SynthesisOutcome};
use deepwave_core::{clean_queries, Config, FollowUpDecider, Query, QueryPlanner};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{info, warn};

/// Phase of the wave state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WavePhase {
    Planning,
    Searching,
    Evaluating,
    Synthesizing,
    Done,
}

impl WavePhase {
    pub fn can_transition_to(self, next: WavePhase) -> bool {
        use WavePhase::*;
        matches!(
            (self, next),
            (Planning, Searching)
                | (Searching, Evaluating)
                | (Evaluating, Searching)
                | (Evaluating, Synthesizing)
                | (Synthesizing, Done)
        )
    }
}

/// One completed iteration of the research loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchWave {
    /// 1-based
    pub wave_number: usize,
    pub queries: Vec<String>,
    /// New unique sources this wave added to the index
    pub sources_discovered: usize,
    pub cache_hits: usize,
    pub failures: usize,
    /// Whether another wave followed this one
    pub continue_research: bool,
    pub elapsed: Duration,
}

/// Collaborators and components a controller drives
#[derive(Clone, Copy)]
pub struct WaveDriver<'a> {
    pub planner: &'a dyn QueryPlanner,
    pub decider: &'a dyn FollowUpDecider,
    pub executor: &'a SearchExecutor,
    pub synthesizer: &'a ReportSynthesizer,
}

/// Drives one session through the wave state machine.
#[derive(Debug, Clone)]
pub struct WaveController {
    phase: WavePhase,
    transitions: Vec<WavePhase>,
    max_waves: usize,
    max_queries_per_wave: usize,
    max_followup_queries: usize,
    findings_highlights: usize,
    search_concurrency: usize,
    call_timeout: Duration,
}

impl WaveController {
    pub fn new(config: &Config) -> Self {
        Self {
            phase: WavePhase::Planning,
            transitions: vec![WavePhase::Planning],
            max_waves: config.waves.max_waves.max(1),
            max_queries_per_wave: config.waves.max_queries_per_wave.max(1),
            max_followup_queries: config.waves.max_followup_queries.max(1),
            findings_highlights: config.waves.findings_highlights,
            search_concurrency: config.search.search_concurrency_limit.max(1),
            call_timeout: Duration::from_secs(config.search.call_timeout_secs.max(1)),
        }
    }

    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    /// Every phase entered so far, starting with `Planning`
    pub fn transitions(&self) -> &[WavePhase] {
        &self.transitions
    }

    pub fn max_waves(&self) -> usize {
        self.max_waves
    }

    fn advance(&mut self, next: WavePhase) {
        assert!(
            self.phase.can_transition_to(next),
            "illegal wave transition {:?} -> {next:?}",
            self.phase
        );
        self.phase = next;
        self.transitions.push(next);
    }

    /// Run the loop to completion and hand the curated sources to the report
    /// writer.
    ///
    /// Collaborator failures never abort the loop. The error case is only a
    /// report writer that failed on both attempts; the session keeps every
    /// source gathered either way.
    pub async fn run(
        &mut self,
        session: &mut ResearchSession,
        driver: WaveDriver<'_>,
    ) -> Result<SynthesisOutcome> {
        assert_eq!(self.phase, WavePhase::Planning, "controller already ran");
        info!(
            "Starting research session {} on '{}' (max {} waves)",
            session.id(),
            session.topic(),
            self.max_waves
        );

        let mut pending = self.plan(session, driver.planner).await;

        loop {
            self.advance(WavePhase::Searching);
            let wave_number = session.waves().len() + 1;
            assert!(
                wave_number <= self.max_waves,
                "wave {wave_number} exceeds the ceiling of {} waves",
                self.max_waves
            );

            let started = Instant::now();
            let queries: Vec<Query> = pending
                .iter()
                .map(|q| Query::new(q.clone(), wave_number))
                .collect();
            let before = session.unique_sources();
            let resolution = driver
                .executor
                .resolve(&queries, self.search_concurrency, session.index())
                .await;
            session.record_resolution(&resolution);
            let discovered = session.unique_sources().saturating_sub(before);
            info!(
                "Wave {wave_number}/{}: {} queries, {discovered} new sources, {} failures",
                self.max_waves,
                queries.len(),
                resolution.failures.len()
            );

            self.advance(WavePhase::Evaluating);
            let next = self.evaluate(session, driver.decider, wave_number).await;

            session.record_wave(ResearchWave {
                wave_number,
                queries: pending,
                sources_discovered: discovered,
                cache_hits: resolution.outcomes.iter().filter(|o| o.is_cache_hit()).count(),
                failures: resolution.failures.len(),
                continue_research: next.is_some(),
                elapsed: started.elapsed(),
            });

            match next {
                Some(queries) => pending = queries,
                None => break,
            }
        }

        self.advance(WavePhase::Synthesizing);
        info!(
            "Synthesizing report from {} unique sources after {} waves",
            session.unique_sources(),
            session.waves().len()
        );
        let outcome = driver.synthesizer.synthesize(session).await;
        self.advance(WavePhase::Done);
        session.finish();
        outcome
    }

    /// Initial queries for wave 1; falls back to the topic itself
    async fn plan(&self, session: &mut ResearchSession, planner: &dyn QueryPlanner) -> Vec<String> {
        let topic = session.topic().to_string();
        let plan = match timeout(self.call_timeout, planner.plan(&topic)).await {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                let e = ResearchError::Planner(e.to_string());
                warn!("{e}, researching the topic directly");
                return vec![topic];
            }
            Err(_) => {
                let e = ResearchError::timeout("query planning", self.call_timeout.as_secs());
                warn!("{e}, researching the topic directly");
                return vec![topic];
            }
        };

        session.set_recommended_source_count(plan.recommended_source_count);
        let queries = clean_queries(&plan.queries, self.max_queries_per_wave);
        if queries.is_empty() {
            warn!("Planner returned no usable queries, researching the topic directly");
            return vec![topic];
        }
        info!("Planned {} queries for '{topic}'", queries.len());
        queries
    }

    /// Follow-up queries for the next wave, or `None` to stop
    async fn evaluate(
        &self,
        session: &ResearchSession,
        decider: &dyn FollowUpDecider,
        wave_number: usize,
    ) -> Option<Vec<String>> {
        if wave_number >= self.max_waves {
            info!("Reached max waves ({})", self.max_waves);
            return None;
        }

        let mut findings = session.findings(self.findings_highlights);
        // The current wave is searched but not yet recorded
        findings.waves_completed = wave_number;
        let decision = match timeout(self.call_timeout, decider.decide(session.topic(), &findings))
            .await
        {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                warn!("{}, stopping", ResearchError::FollowUp(e.to_string()));
                return None;
            }
            Err(_) => {
                let e = ResearchError::timeout("follow-up decision", self.call_timeout.as_secs());
                warn!("{e}, stopping");
                return None;
            }
        };

        if !decision.should_continue {
            info!("Follow-up decided to stop: {}", decision.reasoning);
            return None;
        }

        let issued = session.issued_queries();
        let fresh: Vec<String> = clean_queries(&decision.queries, usize::MAX)
            .into_iter()
            .filter(|q| !issued.contains(&deepwave_core::normalize_query(q)))
            .take(self.max_followup_queries)
            .collect();

        if fresh.is_empty() {
            warn!("Follow-up asked to continue without new queries, stopping");
            return None;
        }
        info!(
            "Continuing with {} follow-up queries: {}",
            fresh.len(),
            decision.reasoning
        );
        Some(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_transitions() {
        use WavePhase::*;
        assert!(Planning.can_transition_to(Searching));
        assert!(Evaluating.can_transition_to(Searching));
        assert!(Evaluating.can_transition_to(Synthesizing));
        assert!(!Planning.can_transition_to(Synthesizing));
        assert!(!Searching.can_transition_to(Synthesizing));
        assert!(!Done.can_transition_to(Planning));
    }

    #[test]
    #[should_panic(expected = "illegal wave transition")]
    fn test_illegal_transition_panics() {
        let mut controller = WaveController::new(&Config::default());
        controller.advance(WavePhase::Synthesizing);
    }

    #[test]
    fn test_new_clamps_limits() {
        let mut config = Config::default();
        config.waves.max_waves = 0;
        let controller = WaveController::new(&config);
        assert_eq!(controller.max_waves(), 1);
        assert_eq!(controller.phase(), WavePhase::Planning);
        assert_eq!(controller.transitions(), &[WavePhase::Planning]);
    }
}
