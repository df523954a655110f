//! CLI Commands

use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;

use swiftcheck_harness::{Corpus, Intent};

pub mod config;
pub mod corpus;
pub mod run;

/// Corpus grouping as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum IntentArg {
    Positive,
    Negative,
    IncrementalUi,
}

impl From<IntentArg> for Intent {
    fn from(arg: IntentArg) -> Self {
        match arg {
            IntentArg::Positive => Intent::Positive,
            IntentArg::Negative => Intent::Negative,
            IntentArg::IncrementalUi => Intent::IncrementalUi,
        }
    }
}

/// Load a corpus file or directory, or the built-in corpus when no path is given
pub fn load_corpus(path: Option<&Path>) -> Result<Corpus> {
    match path {
        Some(path) => Corpus::load(path)
            .with_context(|| format!("failed to load corpus from {}", path.display())),
        None => Corpus::builtin().context("built-in corpus is invalid"),
    }
}

/// Narrow a corpus by intent and explicit ids, keeping declaration order
pub fn select(corpus: Corpus, intent: Option<IntentArg>, ids: &[String]) -> Corpus {
    let corpus = match intent {
        Some(intent) => corpus.filter_by_intent(intent.into()),
        None => corpus,
    };
    if ids.is_empty() {
        corpus
    } else {
        corpus.filter_by_ids(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_intent_and_id() {
        let corpus = load_corpus(None).unwrap();

        assert_eq!(select(corpus.clone(), None, &[]).len(), corpus.len());
        assert_eq!(select(corpus.clone(), Some(IntentArg::Negative), &[]).len(), 10);

        let picked = select(
            corpus.clone(),
            Some(IntentArg::Positive),
            &["Pos_Fun_0001".to_string(), "Neg_Fun_0001".to_string()],
        );
        assert_eq!(picked.len(), 1);
        assert_eq!(picked.entries()[0].id(), "Pos_Fun_0001");
    }

    #[test]
    fn test_missing_corpus_path_reports_location() {
        let err = load_corpus(Some(Path::new("/nonexistent/corpus.yaml"))).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/corpus.yaml"));
    }
}
