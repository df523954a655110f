//! Run Command

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tracing::warn;

use swiftcheck_harness::config::Browser;
use swiftcheck_harness::report::{FanOut, JsonLinesSink, LogSink, MemorySink, SuiteReport};
use swiftcheck_harness::{HarnessConfig, Oracle, PlaywrightSession, Verdict};

use super::{load_corpus, select, IntentArg};
use crate::output::{
    print_document, print_info, print_list, print_success, OutputFormat, TableDisplay,
};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Corpus file or directory (defaults to the built-in corpus)
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Run only cases of this intent
    #[arg(long, value_enum)]
    pub intent: Option<IntentArg>,

    /// Run only these case ids
    #[arg(long = "id")]
    pub ids: Vec<String>,

    /// Directory for test-results.json
    #[arg(long, default_value = "test-results")]
    pub results: PathBuf,

    /// Also stream verdicts to this JSON-lines file
    #[arg(long)]
    pub jsonl: Option<PathBuf>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    pub browser: Option<Browser>,

    /// Override the target page address
    #[arg(long)]
    pub url: Option<String>,
}

impl RunArgs {
    /// Apply command-line overrides on top of the file configuration
    fn apply(&self, config: &mut HarnessConfig) {
        if self.headed {
            config.headless = false;
        }
        if let Some(browser) = self.browser {
            config.browser = browser;
        }
        if let Some(url) = &self.url {
            config.target_url = url.clone();
        }
    }
}

/// Verdict display wrapper for serialization
#[derive(Serialize)]
pub struct VerdictDisplay {
    pub test_id: String,
    pub intent: String,
    pub passed: bool,
    pub elapsed_ms: u64,
    pub detail: String,
}

impl From<&Verdict> for VerdictDisplay {
    fn from(verdict: &Verdict) -> Self {
        let detail = match &verdict.failure {
            Some(failure) => failure.to_string(),
            None => verdict.actual_output.clone(),
        };
        Self {
            test_id: verdict.test_id.clone(),
            intent: verdict.intent.to_string(),
            passed: verdict.passed,
            elapsed_ms: verdict.elapsed_ms,
            detail,
        }
    }
}

impl TableDisplay for VerdictDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Intent", "Result", "Time", "Output / Failure"]
    }

    fn row(&self) -> Vec<String> {
        let result = if self.passed {
            "✓ pass".green().to_string()
        } else {
            "✗ fail".red().to_string()
        };
        vec![
            self.test_id.clone(),
            self.intent.clone(),
            result,
            format!("{:.1}s", self.elapsed_ms as f64 / 1000.0),
            self.detail.clone(),
        ]
    }
}

/// Run the selected cases; returns whether every case passed
pub async fn execute(args: RunArgs, config_path: &Path, format: OutputFormat) -> Result<bool> {
    let mut config = HarnessConfig::load(config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    args.apply(&mut config);
    config.validate()?;

    let corpus = select(load_corpus(args.corpus.as_deref())?, args.intent, &args.ids);
    if corpus.is_empty() {
        bail!("no test cases selected");
    }

    print_info(&format!(
        "Running {} case(s) against {} ({})",
        corpus.len(),
        config.target_url,
        config.browser.as_str()
    ));

    let started_at = Utc::now();
    let session = PlaywrightSession::launch(&config)
        .await
        .context("failed to start the Playwright bridge")?;
    let mut oracle = Oracle::open(session, &config).await?;

    let mut memory = MemorySink::new();
    let summary = {
        let mut sink = FanOut::new().with(LogSink).with(&mut memory);
        if let Some(path) = &args.jsonl {
            sink = sink.with(JsonLinesSink::create(path)?);
        }
        oracle.run_corpus(&corpus, &mut sink).await
    };
    if let Err(e) = oracle.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    let summary = summary?;

    let report = SuiteReport {
        target_url: config.target_url.clone(),
        started_at,
        summary,
        verdicts: memory.into_verdicts(),
    };
    let path = report.write_json(&args.results)?;

    match format {
        OutputFormat::Table => {
            let rows: Vec<VerdictDisplay> =
                report.verdicts.iter().map(VerdictDisplay::from).collect();
            print_list(&rows, format);
        }
        _ => print_document(&report, format),
    }

    let summary = &report.summary;
    let line = format!(
        "{} passed, {} failed of {} in {:.1}s",
        summary.passed,
        summary.failed,
        summary.total,
        summary.duration_ms as f64 / 1000.0
    );
    if summary.all_passed() {
        print_success(&line.green().to_string());
    } else {
        eprintln!("❌ {}", line.red());
    }
    print_info(&format!("Results written to {}", path.display()));

    Ok(summary.all_passed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use swiftcheck_harness::{Failure, Intent};

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let args = RunArgs {
            corpus: None,
            intent: None,
            ids: Vec::new(),
            results: PathBuf::from("test-results"),
            jsonl: None,
            headed: true,
            browser: Some(Browser::Webkit),
            url: Some("http://127.0.0.1:8080/".to_string()),
        };
        let mut config = HarnessConfig::default();
        args.apply(&mut config);

        assert!(!config.headless);
        assert_eq!(config.browser, Browser::Webkit);
        assert_eq!(config.target_url, "http://127.0.0.1:8080/");
    }

    #[test]
    fn test_failed_verdict_shows_reason() {
        let verdict = Verdict {
            test_id: "Neg_Fun_0008".to_string(),
            name: "Gibberish".to_string(),
            intent: Intent::Negative,
            category: "Typographical error handling".to_string(),
            passed: false,
            expected: "qzxy".to_string(),
            actual_output: "ක්ස්".to_string(),
            partial_output: None,
            elapsed_ms: 3400,
            failure: Some(Failure::AssertionMismatch {
                expected: "qzxy".to_string(),
                actual: "ක්ස්".to_string(),
            }),
        };
        let display = VerdictDisplay::from(&verdict);
        assert_eq!(display.detail, r#"expected "qzxy", got "ක්ස්""#);
        assert_eq!(display.row()[3], "3.4s");
    }
}
