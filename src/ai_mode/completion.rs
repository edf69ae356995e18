//! Waiting for answer generation to finish
//!
//! The answer streams in after the load event. Completion is detected by a
//! cascade of progressively weaker signals, all sharing one global deadline:
//!
//! ```text
//! NotStarted -> AwaitingSignal(PrimaryMarker)
//!            -> AwaitingSignal(SecondaryMarker)
//!            -> AwaitingSignal(CompletionText)
//!            -> TimedOut -> Ready(DeadlineElapsed)
//! ```
//!
//! Any step may jump straight to `Ready`. Running out of time is not a
//! failure: extraction proceeds with whatever has rendered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::config::ScrapeConfig;
use super::error::ScrapeError;
use crate::browser::{DriverError, PageDriver};
use crate::utils::{Clock, WaitOutcome, wait_for_visible};

/// Which signal ended the wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSignal {
    /// The thumbs-up icon rendered below the answer
    PrimaryMarker,
    /// The feedback control rendered below the answer
    SecondaryMarker,
    /// A localized "AI-generated" phrase appeared in the body
    CompletionText,
    /// Nothing confirmed completion before the deadline
    DeadlineElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionState {
    NotStarted,
    AwaitingSignal(CompletionSignal),
    TimedOut,
    Ready(CompletionSignal),
}

/// Outcome of one completion wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReport {
    pub signal: CompletionSignal,
    pub elapsed: Duration,
    /// Every state visited, in order
    pub states: Vec<CompletionState>,
}

pub struct CompletionWaiter {
    primary_marker: String,
    secondary_marker: String,
    complete_phrases: Vec<String>,
    deadline: Duration,
    method_timeout: Duration,
    marker_poll: Duration,
    text_poll: Duration,
    clock: Arc<dyn Clock>,
}

impl CompletionWaiter {
    pub fn new(config: &ScrapeConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            primary_marker: config.selectors.primary_completion_marker.clone(),
            secondary_marker: config.selectors.secondary_completion_marker.clone(),
            complete_phrases: config.phrases.complete.clone(),
            deadline: config.timing.completion_deadline(),
            method_timeout: config.timing.completion_method(),
            marker_poll: config.timing.marker_poll(),
            text_poll: config.timing.text_poll(),
            clock,
        }
    }

    /// Block until the answer looks complete or the deadline passes
    ///
    /// Only session loss is an error.
    pub async fn wait(&self, page: &dyn PageDriver) -> Result<CompletionReport, ScrapeError> {
        let start = self.clock.now();
        let mut states = vec![CompletionState::NotStarted];

        let markers = [
            (CompletionSignal::PrimaryMarker, self.primary_marker.as_str()),
            (CompletionSignal::SecondaryMarker, self.secondary_marker.as_str()),
        ];

        for (signal, selector) in markers {
            let Some(budget) = self.step_budget(start) else {
                break;
            };
            states.push(CompletionState::AwaitingSignal(signal));
            debug!("Waiting up to {:?} for {:?} ({})", budget, signal, selector);

            let outcome = wait_for_visible(
                page,
                selector,
                budget,
                self.marker_poll,
                self.clock.as_ref(),
            )
            .await
            .map_err(|e| Self::session_lost(e, "waiting for completion marker"))?;

            if outcome == WaitOutcome::Visible {
                return Ok(self.finish(start, states, signal));
            }
        }

        if let Some(budget) = self.step_budget(start) {
            states.push(CompletionState::AwaitingSignal(
                CompletionSignal::CompletionText,
            ));
            debug!("Polling page text for completion phrases (up to {:?})", budget);

            if self.poll_completion_text(page, budget).await? {
                return Ok(self.finish(start, states, CompletionSignal::CompletionText));
            }
        }

        warn!("Completion not confirmed within {:?}, extracting anyway", self.deadline);
        states.push(CompletionState::TimedOut);
        Ok(self.finish(start, states, CompletionSignal::DeadlineElapsed))
    }

    /// `min(per-method timeout, remaining)`, or `None` once the deadline is spent
    fn step_budget(&self, start: Instant) -> Option<Duration> {
        let elapsed = self.clock.now().saturating_duration_since(start);
        let remaining = self.deadline.checked_sub(elapsed)?;
        if remaining.is_zero() {
            return None;
        }
        Some(remaining.min(self.method_timeout))
    }

    async fn poll_completion_text(
        &self,
        page: &dyn PageDriver,
        budget: Duration,
    ) -> Result<bool, ScrapeError> {
        let start = self.clock.now();

        loop {
            match page.body_text().await {
                Ok(body) => {
                    if let Some(phrase) = self.matching_phrase(&body) {
                        debug!("Completion phrase found: '{}'", phrase);
                        return Ok(true);
                    }
                }
                Err(e) if e.is_session_closed() => {
                    return Err(Self::session_lost(e, "polling page text"));
                }
                Err(e) => debug!("Body text unavailable while polling: {}", e),
            }

            let elapsed = self.clock.now().saturating_duration_since(start);
            if elapsed >= budget {
                return Ok(false);
            }
            self.clock.sleep(self.text_poll.min(budget - elapsed)).await;
        }
    }

    fn matching_phrase(&self, body: &str) -> Option<&str> {
        self.complete_phrases
            .iter()
            .find(|phrase| body.contains(phrase.as_str()))
            .map(String::as_str)
    }

    fn finish(
        &self,
        start: Instant,
        mut states: Vec<CompletionState>,
        signal: CompletionSignal,
    ) -> CompletionReport {
        let elapsed = self.clock.now().saturating_duration_since(start);
        states.push(CompletionState::Ready(signal));
        info!("AI response ready ({:?} after {:.1}s)", signal, elapsed.as_secs_f64());
        CompletionReport {
            signal,
            elapsed,
            states,
        }
    }

    fn session_lost(err: DriverError, stage: &str) -> ScrapeError {
        ScrapeError::from_driver(err, stage)
    }
}
