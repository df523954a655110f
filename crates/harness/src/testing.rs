//! In-process stand-in for the live translator page
//!
//! [`SimulatedTarget`] behaves like the real UI where it matters for synchronization:
//! output is debounced after each keystroke, keeps showing the previous render while the
//! debounce runs, and then appears character by character. All timing runs on the tokio
//! clock, so tests can use `#[tokio::test(start_paused = true)]`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::automation::{Automation, RegionId, RegionQuery, RegionSnapshot};
use crate::corpus::Corpus;
use crate::error::{HarnessError, HarnessResult};

pub const INPUT_REGION: RegionId = RegionId(1);
pub const OUTPUT_REGION: RegionId = RegionId(2);
pub const DECOY_REGION: RegionId = RegionId(3);

type Transform = Arc<dyn Fn(&str) -> String + Send + Sync>;

pub struct SimulatedTarget {
    transform: Transform,
    debounce: Duration,
    char_interval: Duration,
    padding: (String, String),
    read_latency: Duration,

    has_input: bool,
    has_output: bool,
    decoy_editable: bool,
    silent: bool,
    fail_on: Option<String>,

    input: String,
    stale: String,
    last_change: Instant,

    navigations: Vec<String>,
    output_reads: Vec<Instant>,
    closed: bool,
}

impl SimulatedTarget {
    pub fn new(transform: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            transform: Arc::new(transform),
            debounce: Duration::from_millis(300),
            char_interval: Duration::from_millis(25),
            padding: (String::new(), String::new()),
            read_latency: Duration::ZERO,
            has_input: true,
            has_output: true,
            decoy_editable: false,
            silent: false,
            fail_on: None,
            input: String::new(),
            stale: String::new(),
            last_change: Instant::now(),
            navigations: Vec::new(),
            output_reads: Vec::new(),
            closed: false,
        }
    }

    /// Echoes the input back unchanged
    pub fn identity() -> Self {
        Self::new(|s| s.to_string())
    }

    /// Maps known inputs to fixed outputs and echoes everything else
    pub fn with_table(pairs: &[(&str, &str)]) -> Self {
        let table: HashMap<String, String> = pairs
            .iter()
            .map(|(i, o)| (i.to_string(), o.to_string()))
            .collect();
        Self::new(move |s| table.get(s).cloned().unwrap_or_else(|| s.to_string()))
    }

    /// A target that produces every expected output of `corpus`
    pub fn conforming_to(corpus: &Corpus) -> Self {
        let table: HashMap<String, String> = corpus
            .entries()
            .iter()
            .map(|e| (e.case().input.clone(), e.case().expected_output.clone()))
            .collect();
        Self::new(move |s| table.get(s).cloned().unwrap_or_else(|| s.to_string()))
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_char_interval(mut self, interval: Duration) -> Self {
        self.char_interval = interval;
        self
    }

    /// Surround rendered output with whitespace
    pub fn with_padding(mut self, leading: &str, trailing: &str) -> Self {
        self.padding = (leading.to_string(), trailing.to_string());
        self
    }

    /// Add an editable element that also matches the output selector, ahead of the real one
    pub fn with_decoy_editable(mut self) -> Self {
        self.decoy_editable = true;
        self
    }

    pub fn without_input(mut self) -> Self {
        self.has_input = false;
        self
    }

    pub fn without_output(mut self) -> Self {
        self.has_output = false;
        self
    }

    /// Never render any output
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Fail with an automation error when asked to enter `input`
    pub fn failing_on(mut self, input: &str) -> Self {
        self.fail_on = Some(input.to_string());
        self
    }

    /// Delay every output read from now on, like a stalled automation round trip
    pub fn set_read_latency(&mut self, latency: Duration) {
        self.read_latency = latency;
    }

    pub fn input_text(&self) -> &str {
        &self.input
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// Times at which the output region was read
    pub fn output_reads(&self) -> &[Instant] {
        &self.output_reads
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// What the output region shows right now, before padding
    fn rendered(&self, now: Instant) -> String {
        let elapsed = now.saturating_duration_since(self.last_change);
        if elapsed < self.debounce {
            return self.stale.clone();
        }
        if self.input.is_empty() || self.silent {
            return String::new();
        }

        let full = (self.transform)(&self.input);
        if self.char_interval.is_zero() {
            return full;
        }
        let streamed = (elapsed - self.debounce).as_nanos() / self.char_interval.as_nanos();
        let shown = 1 + streamed as usize;
        full.chars().take(shown).collect()
    }

    fn change_input(&mut self, apply: impl FnOnce(&mut String)) {
        let now = Instant::now();
        self.stale = self.rendered(now);
        apply(&mut self.input);
        self.last_change = now;
    }

    fn check_failure(&self, text: &str) -> HarnessResult<()> {
        match &self.fail_on {
            Some(bad) if !text.is_empty() && bad == text => Err(HarnessError::Automation(format!(
                "simulated automation failure for {:?}",
                text
            ))),
            _ => Ok(()),
        }
    }

    fn check_open(&self) -> HarnessResult<()> {
        if self.closed {
            return Err(HarnessError::Automation("session closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Automation for SimulatedTarget {
    async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.check_open()?;
        self.navigations.push(url.to_string());
        self.input.clear();
        self.stale.clear();
        self.last_change = Instant::now();
        Ok(())
    }

    async fn resolve(&mut self, query: &RegionQuery, timeout: Duration) -> HarnessResult<RegionId> {
        self.check_open()?;

        let found = match query {
            RegionQuery::Label { .. } => self.has_input.then_some(INPUT_REGION),
            RegionQuery::Selector { exclude_editable, .. } => {
                let mut candidates = Vec::new();
                if self.decoy_editable {
                    candidates.push((DECOY_REGION, true));
                }
                if self.has_output {
                    candidates.push((OUTPUT_REGION, false));
                }
                candidates
                    .into_iter()
                    .find(|(_, editable)| !(*exclude_editable && *editable))
                    .map(|(id, _)| id)
            }
        };

        match found {
            Some(id) => Ok(id),
            None => {
                tokio::time::sleep(timeout).await;
                Err(HarnessError::target_unavailable(query.describe(), timeout))
            }
        }
    }

    async fn read(&mut self, region: RegionId) -> HarnessResult<RegionSnapshot> {
        self.check_open()?;

        match region {
            INPUT_REGION | DECOY_REGION => Ok(RegionSnapshot {
                text: self.input.clone(),
                editable: true,
            }),
            OUTPUT_REGION => {
                if !self.read_latency.is_zero() {
                    tokio::time::sleep(self.read_latency).await;
                }
                let now = Instant::now();
                self.output_reads.push(now);
                let body = self.rendered(now);
                let text = if body.is_empty() {
                    body
                } else {
                    format!("{}{}{}", self.padding.0, body, self.padding.1)
                };
                Ok(RegionSnapshot { text, editable: false })
            }
            other => Err(HarnessError::Automation(format!("unknown region {:?}", other))),
        }
    }

    async fn fill(&mut self, region: RegionId, text: &str) -> HarnessResult<()> {
        self.check_open()?;
        if region != INPUT_REGION {
            return Err(HarnessError::Automation(format!("region {:?} is not fillable", region)));
        }
        self.check_failure(text)?;

        let text = text.to_string();
        self.change_input(move |input| *input = text);
        Ok(())
    }

    async fn type_text(
        &mut self,
        region: RegionId,
        text: &str,
        key_delay: Duration,
    ) -> HarnessResult<()> {
        self.check_open()?;
        if region != INPUT_REGION {
            return Err(HarnessError::Automation(format!("region {:?} is not typeable", region)));
        }

        let mut keys = text.chars().peekable();
        while let Some(key) = keys.next() {
            self.change_input(|input| input.push(key));
            if keys.peek().is_some() {
                tokio::time::sleep(key_delay).await;
            }
        }
        self.check_failure(&self.input.clone())
    }

    async fn close(&mut self) -> HarnessResult<()> {
        self.closed = true;
        Ok(())
    }
}
