//! swiftcheck conformance harness
//!
//! Drives a live transliteration page through a browser, waits for the asynchronously
//! rendered output to settle, and compares it byte-for-byte against a labeled corpus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Oracle                                                      │
//! │    reset ─► inject ─► await ─► extract ─► compare ─► record  │
//! │      │                  │                              │     │
//! │      ▼                  ▼                              ▼     │
//! │  TargetDriver ◄── CompletionDetector             VerdictSink │
//! │      │            Idle→Polling→Detected→Stable               │
//! │      ▼                                                       │
//! │  Automation (PlaywrightSession | SimulatedTarget)            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Corpus (YAML)                                               │
//! │    positive / negative / incremental_ui cases                │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod automation;
pub mod config;
pub mod corpus;
pub mod detector;
pub mod driver;
pub mod error;
pub mod oracle;
pub mod playwright;
pub mod report;
pub mod testing;

pub use automation::{Automation, RegionId, RegionQuery, RegionSnapshot};
pub use config::HarnessConfig;
pub use corpus::{Corpus, CorpusEntry, IncrementalTestCase, Intent, TestCase};
pub use detector::{CompletionDetector, DetectorConfig, DetectorState};
pub use driver::TargetDriver;
pub use error::{HarnessError, HarnessResult};
pub use oracle::Oracle;
pub use playwright::PlaywrightSession;
pub use report::{Failure, SuiteSummary, Verdict, VerdictSink};
