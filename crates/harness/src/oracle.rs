//! The oracle: runs corpus cases against a live session and judges them
//!
//! Every case follows the same sequence:
//!
//! ```text
//! reset ─► inject ─► await (detector) ─► extract ─► compare ─► record
//! ```
//!
//! Incremental cases inject the partial prefix first, check the loose predicate on the
//! intermediate output, then type the remainder and await again. Any error inside a case
//! becomes that case's verdict; the next case starts with a fresh reset.

use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::automation::Automation;
use crate::config::{HarnessConfig, TimingConfig};
use crate::corpus::{Corpus, CorpusEntry, IncrementalTestCase, PartialExpectation, TestCase};
use crate::detector::{CompletionDetector, DetectorConfig};
use crate::driver::{InputHandle, OutputHandle, TargetDriver};
use crate::error::{HarnessError, HarnessResult};
use crate::report::{Failure, SuiteSummary, Verdict, VerdictSink};

/// Exact comparison: no trimming, case folding or whitespace collapsing
pub fn compare(expected: &str, actual: &str) -> HarnessResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::AssertionMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        })
    }
}

/// What a case produced before it was judged
#[derive(Debug, Default)]
struct Observed {
    partial: Option<String>,
    actual: String,
}

pub struct Oracle<A> {
    driver: TargetDriver<A>,
    detector: CompletionDetector,
    timing: TimingConfig,
    target_url: String,
}

impl<A: Automation> Oracle<A> {
    /// Take ownership of a session and load the target page
    pub async fn open(automation: A, config: &HarnessConfig) -> HarnessResult<Self> {
        config.validate()?;

        let timing = config.timing.clone();
        let mut driver = TargetDriver::new(
            automation,
            &config.selectors,
            timing.resolve_timeout(),
            timing.type_delay(),
        );

        info!("Opening {}", config.target_url);
        driver.navigate(&config.target_url).await?;
        sleep(timing.page_load()).await;

        Ok(Self {
            detector: CompletionDetector::new(DetectorConfig::from(&timing)),
            driver,
            timing,
            target_url: config.target_url.clone(),
        })
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn driver(&self) -> &TargetDriver<A> {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut TargetDriver<A> {
        &mut self.driver
    }

    pub fn detector(&self) -> &CompletionDetector {
        &self.detector
    }

    /// Clear the input and let any in-flight render drain
    pub async fn reset(&mut self) -> HarnessResult<InputHandle> {
        let input = self.driver.locate_input().await?;
        self.driver.clear_input(input).await?;
        sleep(self.timing.reset_settle()).await;
        Ok(input)
    }

    /// Run one entry of either kind
    pub async fn run_entry(&mut self, entry: &CorpusEntry) -> Verdict {
        match entry {
            CorpusEntry::Standard(case) => self.run_case(case).await,
            CorpusEntry::Incremental(case) => self.run_incremental(case).await,
        }
    }

    pub async fn run_case(&mut self, case: &TestCase) -> Verdict {
        let start = Instant::now();
        let mut observed = Observed::default();
        let outcome = self.execute_case(case, &mut observed).await;
        self.judge(case, outcome, observed, start)
    }

    pub async fn run_incremental(&mut self, case: &IncrementalTestCase) -> Verdict {
        let start = Instant::now();
        let mut observed = Observed::default();
        let outcome = self.execute_incremental(case, &mut observed).await;
        self.judge(&case.case, outcome, observed, start)
    }

    /// Run every entry in corpus order, handing each verdict to `sink`
    pub async fn run_corpus<S: VerdictSink>(
        &mut self,
        corpus: &Corpus,
        sink: &mut S,
    ) -> HarnessResult<SuiteSummary> {
        let start = Instant::now();
        let mut summary = SuiteSummary::new(corpus.fingerprint()?);

        info!("Running {} test(s) against {}", corpus.len(), self.target_url);

        for (i, entry) in corpus.entries().iter().enumerate() {
            let verdict = self.run_entry(entry).await;
            summary.tally(&verdict);
            sink.record(&verdict)?;

            if i + 1 < corpus.len() {
                sleep(self.timing.between_cases()).await;
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Test Results: {} passed, {} failed ({} ms)",
            summary.passed, summary.failed, summary.duration_ms
        );

        Ok(summary)
    }

    /// Close the underlying session
    pub async fn close(mut self) -> HarnessResult<A> {
        self.driver.close().await?;
        Ok(self.driver.into_inner())
    }

    async fn execute_case(
        &mut self,
        case: &TestCase,
        observed: &mut Observed,
    ) -> Result<(), Failure> {
        debug!("Running {}: {:?}", case.id, case.input);

        let (input, output) = self.prepare().await?;
        self.driver.set_input_value(input, &case.input).await?;
        self.settle(input, output, observed).await?;

        observed.actual = self.driver.read_output_text(output).await?;
        compare(&case.expected_output, &observed.actual)?;
        Ok(())
    }

    async fn execute_incremental(
        &mut self,
        case: &IncrementalTestCase,
        observed: &mut Observed,
    ) -> Result<(), Failure> {
        debug!(
            "Running {} incrementally: {:?} then {:?}",
            case.case.id,
            case.partial_input,
            case.remaining_input()
        );

        let (input, output) = self.prepare().await?;

        self.driver.type_input(input, &case.partial_input).await?;
        match case.expected_after_partial {
            PartialExpectation::NonEmpty => self.settle(input, output, observed).await?,
            PartialExpectation::Unconstrained => sleep(self.detector.config().quiet_period).await,
        }

        let partial = self.driver.read_output_text(output).await?;
        observed.partial = Some(partial.clone());
        if !case.expected_after_partial.holds(&partial) {
            return Err(Failure::PartialStage { observed: partial });
        }

        self.driver.type_input(input, case.remaining_input()).await?;
        self.settle(input, output, observed).await?;

        observed.actual = self.driver.read_output_text(output).await?;
        compare(&case.case.expected_output, &observed.actual)?;
        Ok(())
    }

    async fn prepare(&mut self) -> HarnessResult<(InputHandle, OutputHandle)> {
        let input = self.reset().await?;
        let output = self.driver.locate_output().await?;
        Ok((input, output))
    }

    async fn settle(
        &mut self,
        input: InputHandle,
        output: OutputHandle,
        observed: &mut Observed,
    ) -> HarnessResult<()> {
        match self.detector.await_completion(&mut self.driver, input, output).await {
            Ok(completion) => {
                debug!("settled after {:?} ({} polls)", completion.elapsed, completion.polls);
                Ok(())
            }
            Err(err) => {
                if let HarnessError::CompletionTimeout { last_observed, .. } = &err {
                    observed.actual = last_observed.clone();
                }
                Err(err)
            }
        }
    }

    fn judge(
        &self,
        case: &TestCase,
        outcome: Result<(), Failure>,
        observed: Observed,
        start: Instant,
    ) -> Verdict {
        let failure = outcome.err();
        if let Some(failure) = &failure {
            debug!("{} failed: {}", case.id, failure);
        }

        Verdict {
            test_id: case.id.clone(),
            name: case.name.clone(),
            intent: case.intent,
            category: case.category.clone(),
            passed: failure.is_none(),
            expected: case.expected_output.clone(),
            actual_output: observed.actual,
            partial_output: observed.partial,
            elapsed_ms: start.elapsed().as_millis() as u64,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use test_case::test_case;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use crate::report::LogSink;
    use crate::testing::SimulatedTarget;

    /// Counts events at warn level or above
    struct Alerts(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for Alerts {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= tracing::Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_reported_once() {
        let alerts = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(Alerts(alerts.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let corpus = Corpus::builtin().unwrap().filter_by_ids(&["Neg_Fun_0008".to_string()]);
        let target = SimulatedTarget::with_table(&[("qzxy", "ක්ස්")]);
        let mut oracle = Oracle::open(target, &HarnessConfig::default()).await.unwrap();

        let summary = oracle.run_corpus(&corpus, &mut LogSink).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(alerts.load(Ordering::SeqCst), 1);
    }

    #[test_case("මට  කන්න  ඕනි.", "මට කන්න ඕනි." ; "collapsed spaces")]
    #[test_case("Line 1.\nLine 2.", "Line 1. Line 2." ; "newline flattened")]
    #[test_case("SiNgLiSh", "singlish" ; "case folded")]
    #[test_case("qzxy", "qzxy " ; "trailing space")]
    fn test_compare_is_exact(expected: &str, actual: &str) {
        assert!(matches!(
            compare(expected, actual),
            Err(HarnessError::AssertionMismatch { .. })
        ));
    }

    #[test]
    fn test_compare_accepts_identical() {
        assert!(compare("සුබ රාත්\u{200D}රියක්!", "සුබ රාත්\u{200D}රියක්!").is_ok());
        // Same letters without the zero-width joiner are a different string
        assert!(compare("සුබ රාත්\u{200D}රියක්!", "සුබ රාත්රියක්!").is_err());
    }
}
