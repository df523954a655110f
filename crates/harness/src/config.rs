//! Harness configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::automation::RegionQuery;
use crate::error::{HarnessError, HarnessResult};

pub const DEFAULT_TARGET_URL: &str = "https://www.swifttranslator.com/";

/// Harness configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Address of the page under test
    pub target_url: String,

    /// Browser engine
    pub browser: Browser,

    /// Run without a visible window
    pub headless: bool,

    /// Node.js executable used for the Playwright bridge
    pub node_binary: PathBuf,

    /// How the input and output regions are located
    pub selectors: SelectorConfig,

    /// Delays, polling and deadlines
    pub timing: TimingConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            browser: Browser::Chromium,
            headless: true,
            node_binary: PathBuf::from("node"),
            selectors: SelectorConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(HarnessError::InvalidConfig(format!("unknown browser '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Accessible role of the input region
    pub input_role: String,

    /// Accessible name of the input region
    pub input_label: String,

    /// CSS selector shared by the output panel (and, on the live page, the input panel)
    pub output_selector: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            input_role: "textbox".to_string(),
            input_label: "Input Your Singlish Text Here.".to_string(),
            output_selector: "div.w-full.h-80.p-3.rounded-lg.ring-1.ring-slate-300.whitespace-pre-wrap"
                .to_string(),
        }
    }
}

impl SelectorConfig {
    pub fn input_query(&self) -> RegionQuery {
        RegionQuery::Label {
            role: self.input_role.clone(),
            name: self.input_label.clone(),
        }
    }

    pub fn output_query(&self) -> RegionQuery {
        RegionQuery::Selector {
            css: self.output_selector.clone(),
            exclude_editable: true,
        }
    }
}

/// All durations in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Settle delay after the initial page load
    pub page_load_ms: u64,

    /// Settle delay after clearing the input
    pub reset_settle_ms: u64,

    /// Spacing between output polls
    pub poll_interval_ms: u64,

    /// Quiet period after the first non-empty output
    pub quiet_period_ms: u64,

    /// Overall deadline for output to appear
    pub deadline_ms: u64,

    /// Bounded wait when resolving a region
    pub resolve_timeout_ms: u64,

    /// Pause after each case
    pub between_cases_ms: u64,

    /// Per-key delay when typing incrementally
    pub type_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_load_ms: 2000,
            reset_settle_ms: 1000,
            poll_interval_ms: 100,
            quiet_period_ms: 3000,
            deadline_ms: 10_000,
            resolve_timeout_ms: 5000,
            between_cases_ms: 2000,
            type_delay_ms: 150,
        }
    }
}

impl TimingConfig {
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout_ms)
    }

    pub fn between_cases(&self) -> Duration {
        Duration::from_millis(self.between_cases_ms)
    }

    pub fn type_delay(&self) -> Duration {
        Duration::from_millis(self.type_delay_ms)
    }

    /// Detector policy: poll interval < quiet period < deadline
    pub fn validate(&self) -> HarnessResult<()> {
        if self.poll_interval_ms == 0 {
            return Err(HarnessError::InvalidConfig(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms >= self.quiet_period_ms {
            return Err(HarnessError::InvalidConfig(format!(
                "poll_interval_ms ({}) must be shorter than quiet_period_ms ({})",
                self.poll_interval_ms, self.quiet_period_ms
            )));
        }
        if self.quiet_period_ms >= self.deadline_ms {
            return Err(HarnessError::InvalidConfig(format!(
                "quiet_period_ms ({}) must be shorter than deadline_ms ({})",
                self.quiet_period_ms, self.deadline_ms
            )));
        }
        Ok(())
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> HarnessResult<Self> {
        let config: Self = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> HarnessResult<()> {
        if self.target_url.trim().is_empty() {
            return Err(HarnessError::InvalidConfig("target_url is empty".to_string()));
        }
        self.timing.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_default_config_is_valid() {
        let config = HarnessConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timing.quiet_period_ms, 3000);
        assert_eq!(config.target_url, DEFAULT_TARGET_URL);
    }

    #[test_case(0, 3000, 10_000 ; "zero poll interval")]
    #[test_case(3000, 3000, 10_000 ; "poll equals quiet")]
    #[test_case(100, 10_000, 10_000 ; "quiet equals deadline")]
    #[test_case(100, 12_000, 10_000 ; "quiet beyond deadline")]
    fn test_timing_policy_rejected(poll: u64, quiet: u64, deadline: u64) {
        let timing = TimingConfig {
            poll_interval_ms: poll,
            quiet_period_ms: quiet,
            deadline_ms: deadline,
            ..Default::default()
        };
        assert!(matches!(timing.validate(), Err(HarnessError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: HarnessConfig = toml::from_str(
            r#"
target_url = "http://127.0.0.1:3000/"
browser = "firefox"

[timing]
quiet_period_ms = 1500
"#,
        )
        .unwrap();
        assert_eq!(config.browser, Browser::Firefox);
        assert_eq!(config.timing.quiet_period_ms, 1500);
        assert_eq!(config.timing.deadline_ms, 10_000);
        assert_eq!(config.selectors.input_role, "textbox");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("swiftcheck.toml");

        let mut config = HarnessConfig::default();
        config.headless = false;
        config.save(&path).unwrap();

        assert_eq!(HarnessConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, HarnessConfig::default());
    }

    #[test]
    fn test_output_query_excludes_editable() {
        match SelectorConfig::default().output_query() {
            RegionQuery::Selector { exclude_editable, .. } => assert!(exclude_editable),
            other => panic!("unexpected query {:?}", other),
        }
    }
}
