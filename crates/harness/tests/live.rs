//! Live conformance run against the real translator page
//!
//! Skipped unless `SWIFTCHECK_LIVE=1`. Needs `node` and Playwright installed in the
//! working directory (`npm i playwright && npx playwright install chromium`).
//!
//! Run with: SWIFTCHECK_LIVE=1 cargo test --package swiftcheck-harness --test live
//!
//! Optional environment:
//!   SWIFTCHECK_CONFIG   harness TOML config (defaults apply when unset)
//!   SWIFTCHECK_RESULTS  output directory for test-results.json (default: test-results)

use std::path::PathBuf;

use chrono::Utc;
use tracing_subscriber::EnvFilter;

use swiftcheck_harness::report::{FanOut, LogSink, MemorySink, SuiteReport};
use swiftcheck_harness::{Corpus, HarnessConfig, HarnessResult, Oracle, PlaywrightSession};

fn main() {
    if std::env::var("SWIFTCHECK_LIVE").as_deref() != Ok("1") {
        println!("live: skipped (set SWIFTCHECK_LIVE=1 to run against the live page)");
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
    match rt.block_on(async_main()) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main() -> HarnessResult<bool> {
    let config = match std::env::var_os("SWIFTCHECK_CONFIG") {
        Some(path) => HarnessConfig::load(&PathBuf::from(path))?,
        None => HarnessConfig::default(),
    };
    let results_dir = std::env::var_os("SWIFTCHECK_RESULTS")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("test-results"));

    let corpus = Corpus::builtin()?;
    let started_at = Utc::now();

    let session = PlaywrightSession::launch(&config).await?;
    let mut oracle = Oracle::open(session, &config).await?;

    let mut memory = MemorySink::new();
    let summary = {
        let mut sink = FanOut::new().with(LogSink).with(&mut memory);
        oracle.run_corpus(&corpus, &mut sink).await
    };
    oracle.close().await?;
    let summary = summary?;

    let report = SuiteReport {
        target_url: config.target_url.clone(),
        started_at,
        summary,
        verdicts: memory.into_verdicts(),
    };
    report.write_json(&results_dir)?;

    Ok(report.summary.all_passed())
}
