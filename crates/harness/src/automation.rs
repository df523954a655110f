//! The browser automation capability the harness is written against
//!
//! Anything that can navigate, find a region, and read or write its text can drive the
//! harness: the Playwright bridge in production, [`crate::testing::SimulatedTarget`] in tests.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HarnessResult;

/// Opaque handle to a resolved UI region, valid for the session that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u32);

/// How to find a region on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum RegionQuery {
    /// Accessible role plus accessible name (stable semantic label)
    Label { role: String, name: String },

    /// CSS selector; the first match that is not an editable control when
    /// `exclude_editable` is set
    Selector {
        css: String,
        #[serde(default)]
        exclude_editable: bool,
    },
}

impl RegionQuery {
    pub fn describe(&self) -> String {
        match self {
            RegionQuery::Label { role, name } => format!("{}[name={:?}]", role, name),
            RegionQuery::Selector { css, .. } => css.clone(),
        }
    }
}

/// Point-in-time view of a region
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    /// Raw text content, untrimmed
    pub text: String,
    /// Whether the element is an editable control (textarea, textbox role, contenteditable)
    pub editable: bool,
}

/// Automation session against a live target.
///
/// Methods take `&mut self`: a session is driven by exactly one oracle at a time.
#[async_trait]
pub trait Automation: Send {
    /// Load the target page and wait for it to become idle
    async fn navigate(&mut self, url: &str) -> HarnessResult<()>;

    /// Resolve a region, failing with `TargetUnavailable` once `timeout` has passed
    async fn resolve(&mut self, query: &RegionQuery, timeout: Duration) -> HarnessResult<RegionId>;

    async fn read(&mut self, region: RegionId) -> HarnessResult<RegionSnapshot>;

    /// Replace the region's content with `text`
    async fn fill(&mut self, region: RegionId, text: &str) -> HarnessResult<()>;

    /// Append `text` key by key, pausing `key_delay` between keys
    async fn type_text(
        &mut self,
        region: RegionId,
        text: &str,
        key_delay: Duration,
    ) -> HarnessResult<()>;

    async fn close(&mut self) -> HarnessResult<()>;
}
