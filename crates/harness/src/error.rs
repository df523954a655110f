//! Error types for the conformance harness

use std::fmt::{self, Write as _};
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Target region unavailable: {region} (waited {waited_ms} ms)")]
    TargetUnavailable { region: String, waited_ms: u64 },

    #[error(
        "Output did not settle within {elapsed_ms} ms (last observed: {})",
        Quoted(.last_observed)
    )]
    CompletionTimeout {
        elapsed_ms: u64,
        last_observed: String,
    },

    #[error("Assertion failed: expected {}, got {}", Quoted(.expected), Quoted(.actual))]
    AssertionMismatch { expected: String, actual: String },

    #[error("Automation error: {0}")]
    Automation(String),

    #[error("Node.js not found at '{0}'. Install Node.js and run: npx playwright install")]
    BridgeNotFound(String),

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl HarnessError {
    pub fn target_unavailable(region: impl Into<String>, waited: Duration) -> Self {
        HarnessError::TargetUnavailable {
            region: region.into(),
            waited_ms: waited.as_millis() as u64,
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;

/// Displays text in double quotes, escaping only control characters.
///
/// `{:?}` would also escape combining marks such as the Sinhala virama.
pub struct Quoted<'a>(pub &'a str);

impl fmt::Display for Quoted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
                c => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }
}
