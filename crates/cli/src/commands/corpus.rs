//! Corpus Commands

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;

use swiftcheck_harness::corpus::SuspiciousExpectation;
use swiftcheck_harness::CorpusEntry;

use super::{load_corpus, select, IntentArg};
use crate::output::{print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum CorpusCommands {
    /// List test cases
    List {
        /// Corpus file or directory (defaults to the built-in corpus)
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Show only cases of this intent
        #[arg(long, value_enum)]
        intent: Option<IntentArg>,
    },

    /// Validate the corpus and report suspicious expectations
    Check {
        /// Corpus file or directory (defaults to the built-in corpus)
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

/// Case display wrapper for serialization
#[derive(Serialize)]
pub struct CaseDisplay {
    pub id: String,
    pub intent: String,
    pub name: String,
    pub length: String,
    pub input: String,
    pub expected_output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_input: Option<String>,
}

impl From<&CorpusEntry> for CaseDisplay {
    fn from(entry: &CorpusEntry) -> Self {
        let case = entry.case();
        Self {
            id: case.id.clone(),
            intent: case.intent.to_string(),
            name: case.name.clone(),
            length: format!("{:?}", case.length_class),
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            partial_input: match entry {
                CorpusEntry::Incremental(inc) => Some(inc.partial_input.clone()),
                CorpusEntry::Standard(_) => None,
            },
        }
    }
}

impl TableDisplay for CaseDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Intent", "Name", "Len", "Input", "Expected"]
    }

    fn row(&self) -> Vec<String> {
        let input = match &self.partial_input {
            Some(partial) => format!("{} ⟶ {}", partial, self.input),
            None => self.input.clone(),
        };
        vec![
            self.id.clone(),
            self.intent.clone(),
            self.name.clone(),
            self.length.clone(),
            input,
            self.expected_output.clone(),
        ]
    }
}

impl TableDisplay for SuspiciousExpectation {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Token"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.id.clone(), self.token.clone()]
    }
}

pub fn execute(cmd: CorpusCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        CorpusCommands::List { corpus, intent } => {
            let corpus = select(load_corpus(corpus.as_deref())?, intent, &[]);
            let rows: Vec<CaseDisplay> = corpus.entries().iter().map(CaseDisplay::from).collect();
            print_list(&rows, format);
        }

        CorpusCommands::Check { corpus } => {
            let corpus = load_corpus(corpus.as_deref())?;
            let fingerprint = corpus.fingerprint()?;
            let flagged = corpus.suspicious_expectations();

            if format == OutputFormat::Table {
                print_success(&format!("{} case(s) valid (sha256 {})", corpus.len(), fingerprint));
                if !flagged.is_empty() {
                    print_warning(&format!(
                        "{} expected output(s) mix Latin and Sinhala letters in one word",
                        flagged.len()
                    ));
                }
            }
            if !flagged.is_empty() || format != OutputFormat::Table {
                print_list(&flagged, format);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incremental_case_shows_partial_prefix() {
        let corpus = load_corpus(None).unwrap();
        let display = CaseDisplay::from(corpus.get("Pos_UI_0001").unwrap());

        assert_eq!(display.partial_input.as_deref(), Some("mama gedhara"));
        assert_eq!(display.row()[4], "mama gedhara ⟶ mama gedhara yanavaa");
    }
}
