//! Concept matching for free-text answers
//!
//! Answers are reduced to a set of lemmatized content words and compared
//! against the concept phrases a question expects. A concept counts as
//! covered when it shares at least one lemma with the answer.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LearnConfig;
use crate::error::{CoreError, Result};

static WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("word pattern is valid"));

const ENGLISH_STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his", "himself",
    "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself", "they", "them",
    "their", "theirs", "themselves", "what", "which", "who", "whom", "this", "that", "that'll",
    "these", "those", "am", "is", "are", "was", "were", "be", "been", "being", "have", "has",
    "had", "having", "do", "does", "did", "doing", "a", "an", "the", "and", "but", "if", "or",
    "because", "as", "until", "while", "of", "at", "by", "for", "with", "about", "against",
    "between", "into", "through", "during", "before", "after", "above", "below", "to", "from",
    "up", "down", "in", "out", "on", "off", "over", "under", "again", "further", "then", "once",
    "here", "there", "when", "where", "why", "how", "all", "any", "both", "each", "few", "more",
    "most", "other", "some", "such", "no", "nor", "not", "only", "own", "same", "so", "than",
    "too", "very", "s", "t", "can", "will", "just", "don", "don't", "should", "should've", "now",
    "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "aren't", "couldn", "couldn't", "didn",
    "didn't", "doesn", "doesn't", "hadn", "hadn't", "hasn", "hasn't", "haven", "haven't", "isn",
    "isn't", "ma", "mightn", "mightn't", "mustn", "mustn't", "needn", "needn't", "shan",
    "shan't", "shouldn", "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't",
    "wouldn", "wouldn't",
];

const ENGLISH_LEMMA_EXCEPTIONS: &[(&str, &str)] = &[
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("gases", "gas"),
    ("analyses", "analysis"),
    ("hypotheses", "hypothesis"),
    ("phenomena", "phenomenon"),
    ("criteria", "criterion"),
    ("data", "data"),
    ("species", "species"),
    ("series", "series"),
    ("news", "news"),
    ("physics", "physics"),
    ("mathematics", "mathematics"),
    ("economics", "economics"),
    ("politics", "politics"),
];

/// Stop-words and irregular lemma forms used by [`ConceptMatcher`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lexicon {
    pub stop_words: HashSet<String>,
    #[serde(default)]
    pub lemma_exceptions: HashMap<String, String>,
}

impl Lexicon {
    /// Built-in English resources.
    pub fn english() -> Self {
        Self {
            stop_words: ENGLISH_STOP_WORDS.iter().map(|w| w.to_string()).collect(),
            lemma_exceptions: ENGLISH_LEMMA_EXCEPTIONS
                .iter()
                .map(|(form, lemma)| (form.to_string(), lemma.to_string()))
                .collect(),
        }
    }

    /// Load a lexicon from a JSON file with `stop_words` and `lemma_exceptions`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ResourceUnavailable(format!("lexicon {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            CoreError::ResourceUnavailable(format!("lexicon {}: {}", path.display(), e))
        })
    }

    fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Reduce a lowercase word to its dictionary base form.
    pub fn lemmatize(&self, word: &str) -> String {
        if let Some(lemma) = self.lemma_exceptions.get(word) {
            return lemma.clone();
        }
        if word.chars().count() <= 3 {
            return word.to_string();
        }
        if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
            return word.to_string();
        }
        if let Some(stem) = word.strip_suffix("ies") {
            if stem.chars().count() > 1 {
                return format!("{stem}y");
            }
        }
        for suffix in ["sses", "ches", "shes", "xes", "zes"] {
            if word.ends_with(suffix) {
                return word[..word.len() - 2].to_string();
            }
        }
        match word.strip_suffix('s') {
            Some(stem) => stem.to_string(),
            None => word.to_string(),
        }
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::english()
    }
}

/// Concepts found in a response and the fraction of expected concepts covered.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptMatch {
    pub matched: Vec<String>,
    pub ratio: f64,
}

/// Normalizes free text and measures overlap with expected concepts.
#[derive(Debug, Clone)]
pub struct ConceptMatcher {
    lexicon: Option<Lexicon>,
}

impl ConceptMatcher {
    pub fn new(lexicon: Lexicon) -> Self {
        Self {
            lexicon: Some(lexicon),
        }
    }

    /// Matcher with the built-in English lexicon.
    pub fn english() -> Self {
        Self::new(Lexicon::english())
    }

    /// Matcher without linguistic resources; normalization splits on whitespace.
    pub fn degraded() -> Self {
        Self { lexicon: None }
    }

    /// Build a matcher from configuration. An unreadable external lexicon
    /// leaves the matcher degraded rather than failing startup.
    pub fn from_config(config: &LearnConfig) -> Self {
        match &config.lexicon_path {
            None => Self::english(),
            Some(path) => match Lexicon::from_file(path) {
                Ok(lexicon) => Self::new(lexicon),
                Err(e) => {
                    warn!(error = %e, "falling back to whitespace tokenization");
                    Self::degraded()
                }
            },
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.lexicon.is_none()
    }

    /// Lowercase, tokenize on word boundaries, keep alphabetic non-stop-words
    /// and lemmatize them.
    pub fn try_normalize(&self, text: &str) -> Result<BTreeSet<String>> {
        let lexicon = self
            .lexicon
            .as_ref()
            .ok_or_else(|| CoreError::ResourceUnavailable("no lexicon loaded".to_string()))?;

        let lowered = text.to_lowercase();
        Ok(WORD
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| token.chars().all(char::is_alphabetic))
            .filter(|token| !lexicon.is_stop_word(token))
            .map(|token| lexicon.lemmatize(token))
            .collect())
    }

    /// Like [`try_normalize`](Self::try_normalize) but never fails: without
    /// a lexicon the text is lowercased and split on whitespace.
    pub fn normalize(&self, text: &str) -> BTreeSet<String> {
        match self.try_normalize(text) {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!(error = %e, "normalizing with whitespace split");
                text.to_lowercase()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect()
            }
        }
    }

    /// Which expected concepts the response covers, and the covered fraction.
    pub fn match_ratio(&self, response_text: &str, expected_concepts: &[String]) -> ConceptMatch {
        if expected_concepts.is_empty() {
            return ConceptMatch {
                matched: Vec::new(),
                ratio: 0.0,
            };
        }

        let response = self.normalize(response_text);
        let matched: Vec<String> = expected_concepts
            .iter()
            .filter(|concept| {
                self.normalize(concept)
                    .iter()
                    .any(|token| response.contains(token))
            })
            .cloned()
            .collect();

        let ratio = matched.len() as f64 / expected_concepts.len() as f64;
        ConceptMatch { matched, ratio }
    }
}

impl Default for ConceptMatcher {
    fn default() -> Self {
        Self::english()
    }
}
