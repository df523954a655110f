//! Declarative test corpus
//!
//! The corpus is a flat, ordered list of cases loaded from YAML. Each entry is either a
//! plain [`TestCase`] (type the whole input, compare the settled output) or an
//! [`IncrementalTestCase`] (type a prefix first, assert a loose predicate, then finish).
//! Classification tags are carried for reporting only.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{HarnessError, HarnessResult, Quoted};

const BUILTIN_CORPUS: &str = include_str!("../corpus/swifttranslator.yaml");

/// A Latin letter directly next to a Sinhala letter
fn mixed_script() -> &'static Regex {
    static MIXED: OnceLock<Regex> = OnceLock::new();
    MIXED.get_or_init(|| {
        Regex::new(r"\p{Sinhala}[A-Za-z]|[A-Za-z]\p{Sinhala}")
            .expect("mixed-script pattern is valid")
    })
}

/// Which group of the corpus a case belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Well-formed input expected to transliterate
    Positive,
    /// Adversarial input (URLs, markup, gibberish, typos)
    Negative,
    /// Real-time output behavior while typing
    IncrementalUi,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Positive => "positive",
            Intent::Negative => "negative",
            Intent::IncrementalUi => "incremental_ui",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthClass {
    S,
    M,
    L,
}

/// A single input/expected-output pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub intent: Intent,
    pub name: String,
    pub input: String,
    /// Exact settled output, byte-for-byte
    pub expected_output: String,
    pub category: String,
    pub grammar_class: String,
    pub length_class: LengthClass,
}

impl TestCase {
    /// Whether the target is expected to leave the input untouched
    pub fn is_pass_through(&self) -> bool {
        self.expected_output == self.input
    }
}

/// Loose check applied to the output after only the partial input was typed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartialExpectation {
    /// Some output must have appeared
    #[default]
    NonEmpty,
    /// Intermediate output is not checked
    Unconstrained,
}

impl PartialExpectation {
    pub fn holds(&self, text: &str) -> bool {
        match self {
            PartialExpectation::NonEmpty => !text.trim().is_empty(),
            PartialExpectation::Unconstrained => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalTestCase {
    #[serde(flatten)]
    pub case: TestCase,
    /// Strict, non-empty prefix of `case.input`
    pub partial_input: String,
    #[serde(default)]
    pub expected_after_partial: PartialExpectation,
}

impl IncrementalTestCase {
    /// The part of the input typed after the partial stage
    pub fn remaining_input(&self) -> &str {
        self.case
            .input
            .strip_prefix(self.partial_input.as_str())
            .unwrap_or_default()
    }
}

/// One corpus record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub enum CorpusEntry {
    Incremental(IncrementalTestCase),
    Standard(TestCase),
}

/// On-disk shape of a corpus record; the variant is chosen by `partial_input`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEntry {
    #[serde(flatten)]
    case: TestCase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    partial_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expected_after_partial: Option<PartialExpectation>,
}

impl TryFrom<RawEntry> for CorpusEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        match (raw.partial_input, raw.expected_after_partial) {
            (Some(partial_input), expected_after_partial) => {
                Ok(CorpusEntry::Incremental(IncrementalTestCase {
                    case: raw.case,
                    partial_input,
                    expected_after_partial: expected_after_partial.unwrap_or_default(),
                }))
            }
            (None, Some(_)) => Err(format!(
                "{}: expected_after_partial requires partial_input",
                raw.case.id
            )),
            (None, None) => Ok(CorpusEntry::Standard(raw.case)),
        }
    }
}

impl From<CorpusEntry> for RawEntry {
    fn from(entry: CorpusEntry) -> Self {
        match entry {
            CorpusEntry::Standard(case) => RawEntry {
                case,
                partial_input: None,
                expected_after_partial: None,
            },
            CorpusEntry::Incremental(inc) => RawEntry {
                case: inc.case,
                partial_input: Some(inc.partial_input),
                expected_after_partial: Some(inc.expected_after_partial),
            },
        }
    }
}

impl CorpusEntry {
    pub fn case(&self) -> &TestCase {
        match self {
            CorpusEntry::Standard(case) => case,
            CorpusEntry::Incremental(inc) => &inc.case,
        }
    }

    pub fn id(&self) -> &str {
        &self.case().id
    }
}

/// An expected output that mixes scripts inside a single word
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspiciousExpectation {
    pub id: String,
    pub token: String,
}

#[derive(Debug, Deserialize, Serialize)]
struct CorpusFile {
    #[serde(default)]
    cases: Vec<CorpusEntry>,
}

/// Ordered, validated set of test cases
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Corpus {
    entries: Vec<CorpusEntry>,
}

impl Corpus {
    pub fn new(entries: Vec<CorpusEntry>) -> HarnessResult<Self> {
        let corpus = Self { entries };
        corpus.validate()?;
        Ok(corpus)
    }

    /// The SwiftTranslator corpus shipped with the crate
    pub fn builtin() -> HarnessResult<Self> {
        Self::from_yaml(BUILTIN_CORPUS)
    }

    /// Parse a corpus from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        let file: CorpusFile = serde_yaml::from_str(yaml)?;
        Self::new(file.cases)
    }

    /// Parse a corpus from a YAML file
    pub fn from_file(path: &Path) -> HarnessResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load every `.yaml`/`.yml` file under `dir`, in path order, as one corpus
    pub fn load_dir(dir: &Path) -> HarnessResult<Self> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        let mut entries = Vec::new();
        for path in paths {
            let content = std::fs::read_to_string(&path)?;
            let file: CorpusFile = serde_yaml::from_str(&content)?;
            entries.extend(file.cases);
        }

        Self::new(entries)
    }

    /// Load from a file or a directory
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.is_dir() {
            Self::load_dir(path)
        } else {
            Self::from_file(path)
        }
    }

    /// Check corpus-wide invariants
    pub fn validate(&self) -> HarnessResult<()> {
        let mut seen = HashSet::new();

        for entry in &self.entries {
            let case = entry.case();
            if case.id.trim().is_empty() {
                return Err(HarnessError::InvalidCorpus(format!(
                    "case '{}' has an empty id",
                    case.name
                )));
            }
            if !seen.insert(case.id.as_str()) {
                return Err(HarnessError::InvalidCorpus(format!("duplicate id '{}'", case.id)));
            }
            if case.input.is_empty() {
                return Err(HarnessError::InvalidCorpus(format!("{}: empty input", case.id)));
            }

            if let CorpusEntry::Incremental(inc) = entry {
                let partial = &inc.partial_input;
                let strict_prefix = !partial.is_empty()
                    && partial.len() < case.input.len()
                    && case.input.starts_with(partial.as_str());
                if !strict_prefix {
                    return Err(HarnessError::InvalidCorpus(format!(
                        "{}: partial_input {} is not a strict prefix of {}",
                        case.id,
                        Quoted(partial),
                        Quoted(&case.input)
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn entries(&self) -> &[CorpusEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CorpusEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    /// Keep only cases of the given intent
    pub fn filter_by_intent(&self, intent: Intent) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| e.case().intent == intent)
                .cloned()
                .collect(),
        }
    }

    /// Keep only the cases with the given ids, in corpus order
    pub fn filter_by_ids(&self, ids: &[String]) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|e| ids.iter().any(|id| id == e.id()))
                .cloned()
                .collect(),
        }
    }

    /// SHA-256 over the canonical JSON form of the entries
    pub fn fingerprint(&self) -> HarnessResult<String> {
        let canonical = serde_json::to_vec(&self.entries)?;
        let mut hasher = Sha256::new();
        hasher.update(&canonical);
        Ok(hex::encode(hasher.finalize()))
    }

    /// Expected outputs where a Latin letter touches a Sinhala letter inside one token.
    ///
    /// These usually point at a transcription slip in the corpus rather than at real
    /// target behavior. They are reported, never corrected.
    pub fn suspicious_expectations(&self) -> Vec<SuspiciousExpectation> {
        let mixed = mixed_script();

        let mut flagged = Vec::new();
        for entry in &self.entries {
            let case = entry.case();
            for token in case.expected_output.split_whitespace() {
                if mixed.is_match(token) {
                    warn!(
                        "{}: expected output token {} mixes Latin and Sinhala letters",
                        case.id,
                        Quoted(token)
                    );
                    flagged.push(SuspiciousExpectation {
                        id: case.id.clone(),
                        token: token.to_string(),
                    });
                }
            }
        }
        flagged
    }
}

impl<'a> IntoIterator for &'a Corpus {
    type Item = &'a CorpusEntry;
    type IntoIter = std::slice::Iter<'a, CorpusEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard(id: &str, input: &str, expected: &str) -> CorpusEntry {
        CorpusEntry::Standard(TestCase {
            id: id.to_string(),
            intent: Intent::Positive,
            name: id.to_string(),
            input: input.to_string(),
            expected_output: expected.to_string(),
            category: "Simple sentence".to_string(),
            grammar_class: "Simple sentence".to_string(),
            length_class: LengthClass::S,
        })
    }

    #[test]
    fn test_builtin_corpus_loads() {
        let corpus = Corpus::builtin().unwrap();
        assert_eq!(corpus.len(), 35);
        assert_eq!(corpus.filter_by_intent(Intent::Positive).len(), 24);
        assert_eq!(corpus.filter_by_intent(Intent::Negative).len(), 10);
        assert_eq!(corpus.filter_by_intent(Intent::IncrementalUi).len(), 1);
        assert_eq!(corpus.entries()[0].id(), "Pos_Fun_0001");
    }

    #[test]
    fn test_builtin_preserves_exact_text() {
        let corpus = Corpus::builtin().unwrap();

        let greeting = corpus.get("Pos_Fun_0001").unwrap().case();
        assert_eq!(greeting.expected_output, "සුබ රාත්\u{200D}රියක්!");

        let spaces = corpus.get("Pos_Fun_0021").unwrap().case();
        assert_eq!(spaces.input, "mata  kanna  ooni.");
        assert_eq!(spaces.expected_output, "මට  කන්න  ඕනි.");

        let breaks = corpus.get("Pos_Fun_0022").unwrap().case();
        assert_eq!(breaks.expected_output, "Line 1.\nLine 2.");
    }

    #[test]
    fn test_incremental_entry_parsed() {
        let corpus = Corpus::builtin().unwrap();
        let CorpusEntry::Incremental(inc) = corpus.get("Pos_UI_0001").unwrap() else {
            panic!("Pos_UI_0001 should be incremental");
        };
        assert_eq!(inc.expected_after_partial, PartialExpectation::NonEmpty);
        assert_eq!(format!("{}{}", inc.partial_input, inc.remaining_input()), inc.case.input);
    }

    #[test]
    fn test_pass_through_cases() {
        let corpus = Corpus::builtin().unwrap();
        for id in ["Neg_Fun_0002", "Neg_Fun_0004", "Neg_Fun_0005", "Neg_Fun_0008"] {
            assert!(corpus.get(id).unwrap().case().is_pass_through(), "{id}");
        }
        assert!(!corpus.get("Neg_Fun_0003").unwrap().case().is_pass_through());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = Corpus::new(vec![standard("A", "x", "x"), standard("A", "y", "y")]).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidCorpus(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_partial_must_be_strict_prefix() {
        let yaml = r#"
cases:
  - id: UI_1
    intent: incremental_ui
    name: whole input as partial
    input: mama
    expected_output: මම
    category: Real-time output update behavior
    grammar_class: Simple sentence
    length_class: S
    partial_input: mama
"#;
        assert!(matches!(Corpus::from_yaml(yaml), Err(HarnessError::InvalidCorpus(_))));
    }

    const UI_CASE: &str = r#"
cases:
  - id: Pos_UI_0001
    intent: incremental_ui
    name: Real-time Output Update
    input: "mama gedhara yanavaa"
    expected_output: "මම ගෙදර යනවා"
    category: Usability flow
    grammar_class: Simple sentence
    length_class: S
"#;

    #[test]
    fn test_partial_spelling_typo_is_rejected() {
        let yaml = format!(
            "{}    partial_input: \"NOT A PREFIX\"\n    expected_after_partial: non-empty\n",
            UI_CASE
        );
        let err = Corpus::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, HarnessError::Yaml(_)), "{}", err);
        assert!(err.to_string().contains("non-empty"), "{}", err);
    }

    #[test]
    fn test_bad_prefix_stays_incremental_and_fails_validation() {
        let yaml = format!(
            "{}    partial_input: \"NOT A PREFIX\"\n    expected_after_partial: non_empty\n",
            UI_CASE
        );
        assert!(matches!(Corpus::from_yaml(&yaml), Err(HarnessError::InvalidCorpus(_))));
    }

    #[test]
    fn test_partial_expectation_requires_partial_input() {
        let yaml = format!("{}    expected_after_partial: non_empty\n", UI_CASE);
        let err = Corpus::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("requires partial_input"), "{}", err);
    }

    #[test]
    fn test_missing_field_is_named() {
        let yaml = UI_CASE.replace("    expected_output: \"මම ගෙදර යනවා\"\n", "");
        let err = Corpus::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("expected_output"), "{}", err);
    }

    #[test]
    fn test_partial_input_alone_defaults_to_non_empty() {
        let yaml = format!("{}    partial_input: \"mama gedhara\"\n", UI_CASE);
        let corpus = Corpus::from_yaml(&yaml).unwrap();
        match &corpus.entries()[0] {
            CorpusEntry::Incremental(inc) => {
                assert_eq!(inc.expected_after_partial, PartialExpectation::NonEmpty);
                assert_eq!(inc.remaining_input(), " yanavaa");
            }
            other => panic!("expected an incremental case, got {:?}", other),
        }
    }

    #[test]
    fn test_flags_mixed_script_expectation() {
        let corpus = Corpus::builtin().unwrap();
        let flagged = corpus.suspicious_expectations();
        assert!(flagged.iter().any(|f| f.id == "Pos_Fun_0004" && f.token == "කන්නwඅ"));
        // Latin words standing alone ("TV", "email") are legitimate
        assert!(flagged.iter().all(|f| f.id != "Pos_Fun_0008"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = Corpus::new(vec![standard("A", "qzxy", "qzxy")]).unwrap();
        let b = Corpus::new(vec![standard("A", "qzxy", "qzxz")]).unwrap();
        assert_eq!(a.fingerprint().unwrap(), a.clone().fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn test_filter_by_ids_keeps_corpus_order() {
        let corpus = Corpus::builtin().unwrap();
        let subset =
            corpus.filter_by_ids(&["Neg_Fun_0008".to_string(), "Pos_Fun_0001".to_string()]);
        let ids: Vec<_> = subset.entries().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["Pos_Fun_0001", "Neg_Fun_0008"]);
    }
}
