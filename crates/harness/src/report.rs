//! Verdicts and the sinks that consume them

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::corpus::Intent;
use crate::error::{HarnessError, HarnessResult, Quoted};

/// Why a case failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    /// Settled output differs from the expected output
    AssertionMismatch { expected: String, actual: String },

    /// Output never appeared before the deadline
    CompletionTimeout { elapsed_ms: u64, last_observed: String },

    /// A page region could not be found
    TargetUnavailable { region: String },

    /// The partial-input stage of an incremental case did not satisfy its predicate
    PartialStage { observed: String },

    /// Anything else the automation layer reported
    Automation { message: String },
}

impl From<HarnessError> for Failure {
    fn from(err: HarnessError) -> Self {
        match err {
            HarnessError::AssertionMismatch { expected, actual } => {
                Failure::AssertionMismatch { expected, actual }
            }
            HarnessError::CompletionTimeout { elapsed_ms, last_observed } => {
                Failure::CompletionTimeout { elapsed_ms, last_observed }
            }
            HarnessError::TargetUnavailable { region, .. } => Failure::TargetUnavailable { region },
            other => Failure::Automation { message: other.to_string() },
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::AssertionMismatch { expected, actual } => {
                write!(f, "expected {}, got {}", Quoted(expected), Quoted(actual))
            }
            Failure::CompletionTimeout { elapsed_ms, last_observed } => {
                write!(
                    f,
                    "no output after {} ms (last observed {})",
                    elapsed_ms,
                    Quoted(last_observed)
                )
            }
            Failure::TargetUnavailable { region } => write!(f, "region unavailable: {}", region),
            Failure::PartialStage { observed } => {
                write!(f, "partial input produced {}", Quoted(observed))
            }
            Failure::Automation { message } => f.write_str(message),
        }
    }
}

/// Outcome of one test case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub test_id: String,
    pub name: String,
    pub intent: Intent,
    pub category: String,
    pub passed: bool,
    pub expected: String,
    /// Settled, trimmed output; empty when the case failed before extraction
    pub actual_output: String,
    /// Output after the partial stage of an incremental case
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_output: Option<String>,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<Failure>,
}

/// Receives one verdict per completed case
pub trait VerdictSink {
    fn record(&mut self, verdict: &Verdict) -> HarnessResult<()>;
}

impl<S: VerdictSink + ?Sized> VerdictSink for &mut S {
    fn record(&mut self, verdict: &Verdict) -> HarnessResult<()> {
        (**self).record(verdict)
    }
}

impl<S: VerdictSink + ?Sized> VerdictSink for Box<S> {
    fn record(&mut self, verdict: &Verdict) -> HarnessResult<()> {
        (**self).record(verdict)
    }
}

/// Keeps every verdict in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    verdicts: Vec<Verdict>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    pub fn into_verdicts(self) -> Vec<Verdict> {
        self.verdicts
    }
}

impl VerdictSink for MemorySink {
    fn record(&mut self, verdict: &Verdict) -> HarnessResult<()> {
        self.verdicts.push(verdict.clone());
        Ok(())
    }
}

/// Writes one JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: &Path) -> HarnessResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        Ok(Self::new(std::io::BufWriter::new(file)))
    }
}

impl<W: Write> VerdictSink for JsonLinesSink<W> {
    fn record(&mut self, verdict: &Verdict) -> HarnessResult<()> {
        serde_json::to_writer(&mut self.writer, verdict)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Logs each verdict through `tracing`
#[derive(Debug, Default)]
pub struct LogSink;

impl VerdictSink for LogSink {
    fn record(&mut self, verdict: &Verdict) -> HarnessResult<()> {
        if verdict.passed {
            info!("✓ {} - {} ({} ms)", verdict.test_id, verdict.name, verdict.elapsed_ms);
        } else {
            let reason = verdict
                .failure
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "unknown failure".to_string());
            error!("✗ {} - {}: {}", verdict.test_id, verdict.name, reason);
        }
        Ok(())
    }
}

/// Forwards each verdict to every inner sink
#[derive(Default)]
pub struct FanOut<'a> {
    sinks: Vec<Box<dyn VerdictSink + 'a>>,
}

impl<'a> FanOut<'a> {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl VerdictSink + 'a) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl VerdictSink for FanOut<'_> {
    fn record(&mut self, verdict: &Verdict) -> HarnessResult<()> {
        for sink in &mut self.sinks {
            sink.record(verdict)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentTally {
    pub passed: usize,
    pub failed: usize,
}

/// Totals for one run over a corpus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub corpus_fingerprint: String,
    pub by_intent: BTreeMap<String, IntentTally>,
}

impl SuiteSummary {
    pub fn new(corpus_fingerprint: String) -> Self {
        Self {
            total: 0,
            passed: 0,
            failed: 0,
            duration_ms: 0,
            corpus_fingerprint,
            by_intent: BTreeMap::new(),
        }
    }

    pub fn tally(&mut self, verdict: &Verdict) {
        self.total += 1;
        let bucket = self.by_intent.entry(verdict.intent.to_string()).or_default();
        if verdict.passed {
            self.passed += 1;
            bucket.passed += 1;
        } else {
            self.failed += 1;
            bucket.failed += 1;
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Everything written to `test-results.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub summary: SuiteSummary,
    pub verdicts: Vec<Verdict>,
}

impl SuiteReport {
    /// Write the report as pretty JSON into `output_dir`
    pub fn write_json(&self, output_dir: &Path) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(output_dir)?;

        let path = output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
