//! Target driver: the four operations the oracle needs from the page

use std::time::Duration;

use tracing::debug;

use crate::automation::{Automation, RegionId, RegionQuery, RegionSnapshot};
use crate::config::SelectorConfig;
use crate::error::{HarnessError, HarnessResult};

/// The editable region text is typed into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputHandle(RegionId);

/// The rendered region the transliteration appears in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputHandle(RegionId);

impl InputHandle {
    pub fn region(&self) -> RegionId {
        self.0
    }
}

impl OutputHandle {
    pub fn region(&self) -> RegionId {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn aliasing(input: InputHandle) -> Self {
        OutputHandle(input.0)
    }
}

/// Drives one automation session
pub struct TargetDriver<A> {
    automation: A,
    input_query: RegionQuery,
    output_query: RegionQuery,
    resolve_timeout: Duration,
    key_delay: Duration,
}

impl<A: Automation> TargetDriver<A> {
    pub fn new(
        automation: A,
        selectors: &SelectorConfig,
        resolve_timeout: Duration,
        key_delay: Duration,
    ) -> Self {
        Self {
            automation,
            input_query: selectors.input_query(),
            output_query: selectors.output_query(),
            resolve_timeout,
            key_delay,
        }
    }

    pub async fn navigate(&mut self, url: &str) -> HarnessResult<()> {
        self.automation.navigate(url).await
    }

    /// Resolve the input region by its accessible label
    pub async fn locate_input(&mut self) -> HarnessResult<InputHandle> {
        let region = self.automation.resolve(&self.input_query, self.resolve_timeout).await?;
        debug!("input region {} -> {:?}", self.input_query.describe(), region);
        Ok(InputHandle(region))
    }

    /// Resolve the output region, never an editable one
    pub async fn locate_output(&mut self) -> HarnessResult<OutputHandle> {
        let query = match &self.output_query {
            RegionQuery::Selector { css, .. } => RegionQuery::Selector {
                css: css.clone(),
                exclude_editable: true,
            },
            other => other.clone(),
        };
        let region = self.automation.resolve(&query, self.resolve_timeout).await?;

        let snapshot = self.automation.read(region).await?;
        if snapshot.editable {
            return Err(HarnessError::target_unavailable(
                format!("{} (only editable matches)", query.describe()),
                self.resolve_timeout,
            ));
        }

        debug!("output region {} -> {:?}", query.describe(), region);
        Ok(OutputHandle(region))
    }

    /// Replace the input content with `text`
    pub async fn set_input_value(&mut self, handle: InputHandle, text: &str) -> HarnessResult<()> {
        self.automation.fill(handle.0, text).await
    }

    pub async fn clear_input(&mut self, handle: InputHandle) -> HarnessResult<()> {
        self.automation.fill(handle.0, "").await
    }

    /// Append `text` key by key
    pub async fn type_input(&mut self, handle: InputHandle, text: &str) -> HarnessResult<()> {
        self.automation.type_text(handle.0, text, self.key_delay).await
    }

    pub async fn read_input_text(&mut self, handle: InputHandle) -> HarnessResult<String> {
        Ok(self.automation.read(handle.0).await?.text)
    }

    /// Rendered output with leading/trailing whitespace removed; inner whitespace untouched
    pub async fn read_output_text(&mut self, handle: OutputHandle) -> HarnessResult<String> {
        let snapshot = self.automation.read(handle.0).await?;
        Ok(snapshot.text.trim().to_string())
    }

    pub async fn read_output_snapshot(
        &mut self,
        handle: OutputHandle,
    ) -> HarnessResult<RegionSnapshot> {
        self.automation.read(handle.0).await
    }

    pub async fn close(&mut self) -> HarnessResult<()> {
        self.automation.close().await
    }

    pub fn automation(&self) -> &A {
        &self.automation
    }

    pub fn automation_mut(&mut self) -> &mut A {
        &mut self.automation
    }

    pub fn into_inner(self) -> A {
        self.automation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimulatedTarget;

    fn driver(target: SimulatedTarget) -> TargetDriver<SimulatedTarget> {
        TargetDriver::new(
            target,
            &SelectorConfig::default(),
            Duration::from_millis(500),
            Duration::from_millis(10),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_output_skips_editable_match() {
        let mut driver = driver(SimulatedTarget::identity().with_decoy_editable());
        let input = driver.locate_input().await.unwrap();
        let output = driver.locate_output().await.unwrap();
        assert_ne!(input.region(), output.region());
        assert!(!driver.read_output_snapshot(output).await.unwrap().editable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_region_is_target_unavailable() {
        let mut driver = driver(SimulatedTarget::identity().without_output());
        assert!(driver.locate_input().await.is_ok());
        let err = driver.locate_output().await.unwrap_err();
        assert!(matches!(err, HarnessError::TargetUnavailable { waited_ms: 500, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_input_value_replaces_content() {
        let mut driver = driver(SimulatedTarget::identity());
        let input = driver.locate_input().await.unwrap();

        driver.set_input_value(input, "mamawadakaranawa").await.unwrap();
        driver.set_input_value(input, "qzxy").await.unwrap();
        assert_eq!(driver.read_input_text(input).await.unwrap(), "qzxy");
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_output_trims_only_outer_whitespace() {
        let mut driver = driver(SimulatedTarget::identity().with_padding("\n  ", "  \n"));
        let input = driver.locate_input().await.unwrap();
        let output = driver.locate_output().await.unwrap();

        driver.set_input_value(input, "Line 1.\nLine  2.").await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(driver.read_output_text(output).await.unwrap(), "Line 1.\nLine  2.");
    }
}
