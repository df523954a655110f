//! Completion detection for the asynchronously rendered output
//!
//! The page gives no "done" signal: output is debounced and then drawn incrementally.
//! Detection is therefore two-phase:
//!
//! ```text
//!  Idle ──► Polling ──(non-empty, not the input)──► Detected ──(quiet period)──► Stable
//!              │
//!              └──(deadline passed)──► TimedOut
//! ```
//!
//! Polling finds the first appearance of output; the quiet period that follows absorbs the
//! rest of an incremental render. No reads happen during the quiet period.

use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::debug;

use crate::automation::Automation;
use crate::config::TimingConfig;
use crate::driver::{InputHandle, OutputHandle, TargetDriver};
use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorConfig {
    pub poll_interval: Duration,
    pub quiet_period: Duration,
    pub deadline: Duration,
}

impl From<&TimingConfig> for DetectorConfig {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(timing.poll_interval_ms),
            quiet_period: Duration::from_millis(timing.quiet_period_ms),
            deadline: Duration::from_millis(timing.deadline_ms),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    Idle,
    Polling,
    Detected,
    Stable,
    TimedOut,
}

/// Outcome of a successful wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Trimmed output at the moment it was first seen
    pub first_observed: String,
    /// Time from the start of polling until Stable
    pub elapsed: Duration,
    /// Number of output reads made while polling
    pub polls: u32,
}

pub struct CompletionDetector {
    config: DetectorConfig,
    state: DetectorState,
    transitions: Vec<DetectorState>,
}

impl CompletionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            state: DetectorState::Idle,
            transitions: vec![DetectorState::Idle],
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// States visited during the last wait, starting with Idle
    pub fn transitions(&self) -> &[DetectorState] {
        &self.transitions
    }

    fn enter(&mut self, next: DetectorState) {
        debug!("detector {:?} -> {:?}", self.state, next);
        self.state = next;
        self.transitions.push(next);
    }

    fn time_out(&mut self, start: Instant, last_observed: String) -> HarnessError {
        self.enter(DetectorState::TimedOut);
        HarnessError::CompletionTimeout {
            elapsed_ms: start.elapsed().as_millis() as u64,
            last_observed,
        }
    }

    /// Block until the output region holds settled, non-empty text that is not the input
    pub async fn await_completion<A: Automation>(
        &mut self,
        driver: &mut TargetDriver<A>,
        input: InputHandle,
        output: OutputHandle,
    ) -> HarnessResult<Completion> {
        self.state = DetectorState::Idle;
        self.transitions = vec![DetectorState::Idle];

        let start = Instant::now();
        let deadline_at = start + self.config.deadline;
        let mut polls = 0u32;
        let mut last_observed = String::new();
        self.enter(DetectorState::Polling);

        let first_observed = loop {
            // A read still in flight at the deadline is abandoned
            let read = timeout_at(deadline_at, driver.read_output_snapshot(output));
            let snapshot = match read.await {
                Ok(snapshot) => snapshot?,
                Err(_) => return Err(self.time_out(start, last_observed)),
            };
            polls += 1;

            let text = snapshot.text.trim();
            let is_input = snapshot.editable || output.region() == input.region();
            if !text.is_empty() && !is_input {
                break text.to_string();
            }
            last_observed = text.to_string();

            let now = Instant::now();
            if now >= deadline_at {
                return Err(self.time_out(start, last_observed));
            }

            sleep(self.config.poll_interval.min(deadline_at - now)).await;
        };

        self.enter(DetectorState::Detected);
        sleep(self.config.quiet_period).await;
        self.enter(DetectorState::Stable);

        Ok(Completion {
            first_observed,
            elapsed: start.elapsed(),
            polls,
        })
    }
}
