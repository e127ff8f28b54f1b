//! Answer evaluation
//!
//! A response is checked first against a table of curated literal rules,
//! each tied to a subject and to a concept tag the current question must
//! carry. When no rule fires, the verdict comes from concept overlap.

use std::path::Path;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::config::LearnConfig;
use crate::error::{CoreError, Result};
use crate::matcher::ConceptMatcher;

/// Default minimum concept match ratio for a correct answer.
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.7;

/// Predicate a literal rule applies to the response. Comparisons ignore case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerCheck {
    Contains { text: String },
    ContainsAny { terms: Vec<String> },
    ContainsAll { terms: Vec<String> },
    ContainsAtLeast { count: usize, terms: Vec<String> },
    Matches { pattern: String },
}

impl AnswerCheck {
    fn contains(text: &str) -> Self {
        AnswerCheck::Contains {
            text: text.to_string(),
        }
    }

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// Whether `response` satisfies the check.
    pub fn is_satisfied(&self, response: &str) -> Result<bool> {
        let lowered = response.to_lowercase();
        let hit = |term: &String| lowered.contains(&term.to_lowercase());

        Ok(match self {
            AnswerCheck::Contains { text } => hit(text),
            AnswerCheck::ContainsAny { terms } => terms.iter().any(hit),
            AnswerCheck::ContainsAll { terms } => !terms.is_empty() && terms.iter().all(hit),
            AnswerCheck::ContainsAtLeast { count, terms } => {
                terms.iter().filter(|t| hit(*t)).count() >= *count
            }
            AnswerCheck::Matches { pattern } => RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| CoreError::InvalidRule(format!("pattern '{pattern}': {e}")))?
                .is_match(response),
        })
    }

    fn validate(&self) -> Result<()> {
        match self {
            AnswerCheck::ContainsAtLeast { count, terms } if *count > terms.len() => {
                Err(CoreError::InvalidRule(format!(
                    "needs {count} of only {} terms",
                    terms.len()
                )))
            }
            AnswerCheck::ContainsAtLeast { count: 0, .. } => Err(CoreError::InvalidRule(
                "count must be at least 1".to_string(),
            )),
            AnswerCheck::Contains { text } if text.trim().is_empty() => {
                Err(CoreError::InvalidRule("empty text".to_string()))
            }
            AnswerCheck::ContainsAny { terms }
            | AnswerCheck::ContainsAll { terms }
            | AnswerCheck::ContainsAtLeast { terms, .. }
                if terms.iter().any(|t| t.trim().is_empty()) =>
            {
                Err(CoreError::InvalidRule("empty term".to_string()))
            }
            AnswerCheck::Matches { .. } => self.is_satisfied("").map(|_| ()),
            _ => Ok(()),
        }
    }
}

/// A known-answer shortcut for one kind of question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteralRule {
    pub subject: String,
    /// Concept the current question must list for the rule to apply.
    pub concept_tag: String,
    pub check: AnswerCheck,
    pub feedback: String,
}

impl LiteralRule {
    pub fn new(subject: &str, concept_tag: &str, check: AnswerCheck, feedback: &str) -> Self {
        Self {
            subject: subject.to_string(),
            concept_tag: concept_tag.to_string(),
            check,
            feedback: feedback.to_string(),
        }
    }

    fn applies_to(&self, subject: &str, expected_concepts: &[String]) -> bool {
        self.subject == subject && expected_concepts.iter().any(|c| *c == self.concept_tag)
    }
}

/// Ordered literal rules; the first one that applies and passes wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<LiteralRule>,
}

impl RuleTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rules for the curated built-in questions.
    pub fn builtin() -> Self {
        use AnswerCheck as C;

        let rules = vec![
            LiteralRule::new(
                "Mathematics",
                "addition",
                C::contains("12"),
                "That's right! 5 + 7 = 12. Great job with your addition.",
            ),
            LiteralRule::new(
                "Mathematics",
                "multiplication",
                C::contains("32"),
                "Correct! 8 × 4 = 32. You're good at multiplication!",
            ),
            LiteralRule::new(
                "Mathematics",
                "area",
                C::contains("24"),
                "That's right! The area is length × width = 6 × 4 = 24 square units.",
            ),
            LiteralRule::new(
                "Mathematics",
                "algebra",
                C::ContainsAny {
                    terms: C::terms(&["x = 4", "4"]),
                },
                "Correct! 3x + 2 = 14 means x = 4. Good algebra skills!",
            ),
            LiteralRule::new(
                "Mathematics",
                "calculus",
                C::contains("2x + 3"),
                "Excellent! The derivative of f(x) = x² + 3x + 2 is indeed 2x + 3.",
            ),
            LiteralRule::new(
                "Science",
                "states of matter",
                C::ContainsAll {
                    terms: C::terms(&["solid", "liquid", "gas"]),
                },
                "Correct! The three states of matter are solid, liquid, and gas.",
            ),
            LiteralRule::new(
                "Science",
                "photosynthesis",
                C::ContainsAtLeast {
                    count: 3,
                    terms: C::terms(&[
                        "light",
                        "sunlight",
                        "carbon dioxide",
                        "water",
                        "chlorophyll",
                        "oxygen",
                        "plant",
                        "energy",
                        "biology",
                    ]),
                },
                "Great explanation of photosynthesis! Plants use light, carbon dioxide, and water to create energy.",
            ),
            LiteralRule::new(
                "Programming",
                "print",
                C::ContainsAny {
                    terms: C::terms(&["output", "display", "screen", "console", "show"]),
                },
                "That's right! The print function outputs or displays information to the user.",
            ),
            LiteralRule::new(
                "Programming",
                "loops",
                C::ContainsAny {
                    terms: C::terms(&["repeat", "iteration", "iterative", "multiple times", "cycle"]),
                },
                "Good explanation of for loops! They're used to repeat operations for iteration.",
            ),
        ];
        Self { rules }
    }

    /// Parse a JSON array of rules.
    pub fn from_json(content: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(content)?;
        table.validate()?;
        Ok(table)
    }

    /// Append the rules stored in a JSON file.
    pub fn extend_from_file(&mut self, path: &Path) -> Result<usize> {
        let content =
            std::fs::read_to_string(path).map_err(|e| CoreError::persistence(path, e))?;
        let extra = Self::from_json(&content)?;
        let added = extra.rules.len();
        self.rules.extend(extra.rules);
        Ok(added)
    }

    pub fn push(&mut self, rule: LiteralRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules {
            rule.check.validate().map_err(|e| {
                CoreError::InvalidRule(format!("{} / {}: {}", rule.subject, rule.concept_tag, e))
            })?;
        }
        Ok(())
    }

    /// First rule that applies to the question and accepts the response.
    pub fn find_match(
        &self,
        response: &str,
        subject: &str,
        expected_concepts: &[String],
    ) -> Result<Option<&LiteralRule>> {
        for rule in self
            .rules
            .iter()
            .filter(|r| r.applies_to(subject, expected_concepts))
        {
            if rule.check.is_satisfied(response)? {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }
}

/// Outcome of evaluating one answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub is_correct: bool,
    /// 1.0 for a literal rule hit, otherwise the concept match ratio.
    pub score: f64,
    pub feedback: String,
    pub matched_concepts: Vec<String>,
}

/// Combines literal rules with the concept-overlap fallback.
#[derive(Debug, Clone)]
pub struct AnswerEvaluator {
    matcher: ConceptMatcher,
    rules: RuleTable,
    pass_threshold: f64,
}

impl AnswerEvaluator {
    pub fn new(matcher: ConceptMatcher, rules: RuleTable, pass_threshold: f64) -> Self {
        Self {
            matcher,
            rules,
            pass_threshold,
        }
    }

    /// Evaluator from configuration; unreadable extra rules are logged and skipped.
    pub fn from_config(config: &LearnConfig) -> Self {
        let mut rules = RuleTable::builtin();
        if let Some(path) = &config.rules_path {
            match rules.extend_from_file(path) {
                Ok(added) => info!(path = %path.display(), added, "loaded extra answer rules"),
                Err(e) => error!(path = %path.display(), error = %e, "ignoring answer rules file"),
            }
        }
        Self::new(ConceptMatcher::from_config(config), rules, config.pass_threshold)
    }

    pub fn matcher(&self) -> &ConceptMatcher {
        &self.matcher
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Evaluate a response; failures become an incorrect verdict with a
    /// diagnostic message.
    pub fn evaluate(&self, response_text: &str, subject: &str, expected_concepts: &[String]) -> Verdict {
        match self.try_evaluate(response_text, subject, expected_concepts) {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(subject, error = %e, "answer evaluation failed");
                Verdict {
                    is_correct: false,
                    score: 0.0,
                    feedback: format!("Error analyzing response: {e}"),
                    matched_concepts: Vec::new(),
                }
            }
        }
    }

    pub fn try_evaluate(
        &self,
        response_text: &str,
        subject: &str,
        expected_concepts: &[String],
    ) -> Result<Verdict> {
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(CoreError::Config(format!(
                "pass threshold {} outside 0..=1",
                self.pass_threshold
            )));
        }

        if let Some(rule) = self.rules.find_match(response_text, subject, expected_concepts)? {
            debug!(subject, tag = %rule.concept_tag, "literal rule matched");
            return Ok(Verdict {
                is_correct: true,
                score: 1.0,
                feedback: rule.feedback.clone(),
                matched_concepts: vec![rule.concept_tag.clone()],
            });
        }

        let result = self.matcher.match_ratio(response_text, expected_concepts);
        debug!(subject, ratio = result.ratio, "concept overlap");

        let verdict = if result.ratio >= self.pass_threshold {
            Verdict {
                is_correct: true,
                score: result.ratio,
                feedback: format!(
                    "Great answer! You covered {} out of {} key concepts.",
                    result.matched.len(),
                    expected_concepts.len()
                ),
                matched_concepts: result.matched,
            }
        } else {
            Verdict {
                is_correct: false,
                score: result.ratio,
                feedback: format!(
                    "That's not quite right. The key points to consider are: {}.",
                    expected_concepts.join(", ")
                ),
                matched_concepts: result.matched,
            }
        };
        Ok(verdict)
    }
}

impl Default for AnswerEvaluator {
    fn default() -> Self {
        Self::new(ConceptMatcher::english(), RuleTable::builtin(), DEFAULT_PASS_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concepts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn addition_rule_fires() {
        let verdict = AnswerEvaluator::default().evaluate(
            "I think it's 12",
            "Mathematics",
            &concepts(&["addition", "basic math"]),
        );
        assert!(verdict.is_correct);
        assert!(verdict.feedback.contains("5 + 7 = 12"));
    }

    #[test]
    fn rule_needs_its_concept_tag() {
        // "12" only counts for the addition question.
        let verdict = AnswerEvaluator::default().evaluate(
            "12",
            "Mathematics",
            &concepts(&["multiplication", "basic math"]),
        );
        assert!(!verdict.is_correct);
    }

    #[test]
    fn rule_needs_matching_subject() {
        let verdict =
            AnswerEvaluator::default().evaluate("12", "Science", &concepts(&["addition"]));
        assert!(!verdict.is_correct);
    }

    #[test]
    fn science_answer_about_plants_is_correct() {
        // Concept overlap is only 2 of 3 here, below the threshold. The
        // photosynthesis rule accepts it since plant, energy and biology are
        // three of its keywords.
        let verdict = AnswerEvaluator::default().evaluate(
            "plants make energy from biology",
            "Science",
            &concepts(&["photosynthesis", "plants", "biology"]),
        );
        assert!(verdict.is_correct);
        assert!(verdict.feedback.starts_with("Great explanation of photosynthesis!"));
    }

    #[test]
    fn states_of_matter_need_all_three() {
        let evaluator = AnswerEvaluator::default();
        let expected = concepts(&["states of matter", "basic science", "solid", "liquid", "gas"]);
        assert!(evaluator.evaluate("Solid, Liquid and Gas", "Science", &expected).is_correct);
        assert!(!evaluator.evaluate("solid and liquid", "Science", &expected).is_correct);
    }

    #[test]
    fn concept_overlap_fallback_reports_counts() {
        let verdict = AnswerEvaluator::default().evaluate(
            "a noun names a thing and a verb is an action, basic grammar",
            "Language Arts",
            &concepts(&["noun", "verb", "grammar", "parts of speech"]),
        );
        assert!(verdict.is_correct);
        assert_eq!(verdict.feedback, "Great answer! You covered 3 out of 4 key concepts.");
        assert!((verdict.score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn incorrect_answer_lists_expected_concepts() {
        let verdict = AnswerEvaluator::default().evaluate(
            "no idea",
            "History",
            &concepts(&["president", "united states"]),
        );
        assert!(!verdict.is_correct);
        assert!(verdict.feedback.contains("president, united states"));
    }

    #[test]
    fn evaluation_is_deterministic() {
        let evaluator = AnswerEvaluator::default();
        let expected = concepts(&["loops", "iteration", "control flow", "repetition"]);
        let first = evaluator.evaluate("it loops over items", "Programming", &expected);
        for _ in 0..10 {
            assert_eq!(evaluator.evaluate("it loops over items", "Programming", &expected), first);
        }
    }

    #[test]
    fn bad_pattern_becomes_diagnostic_verdict() {
        let mut rules = RuleTable::empty();
        rules.push(LiteralRule::new(
            "Art",
            "colour",
            AnswerCheck::Matches {
                pattern: "(unclosed".to_string(),
            },
            "never shown",
        ));
        let evaluator = AnswerEvaluator::new(ConceptMatcher::english(), rules, 0.7);
        let verdict = evaluator.evaluate("red", "Art", &concepts(&["colour"]));
        assert!(!verdict.is_correct);
        assert!(verdict.feedback.starts_with("Error analyzing response"));
    }

    #[test]
    fn rules_load_from_json() {
        let table = RuleTable::from_json(
            r#"[{
                "subject": "Geography",
                "concept_tag": "capital",
                "check": {"kind": "matches", "pattern": "\\bparis\\b"},
                "feedback": "Yes, Paris!"
            }]"#,
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        let evaluator = AnswerEvaluator::new(ConceptMatcher::english(), table, 0.7);
        let verdict = evaluator.evaluate("It is PARIS", "Geography", &concepts(&["capital", "france"]));
        assert!(verdict.is_correct);
        assert_eq!(verdict.feedback, "Yes, Paris!");
    }

    #[test]
    fn invalid_rule_rejected_at_load() {
        let err = RuleTable::from_json(
            r#"[{"subject": "A", "concept_tag": "b",
                 "check": {"kind": "contains_at_least", "count": 3, "terms": ["x"]},
                 "feedback": "f"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidRule(_)));
    }

    #[test]
    fn rules_that_accept_everything_are_rejected() {
        for check in [
            r#"{"kind": "contains_at_least", "count": 0, "terms": ["x"]}"#,
            r#"{"kind": "contains", "text": ""}"#,
            r#"{"kind": "contains_any", "terms": ["ok", " "]}"#,
        ] {
            let json = format!(
                r#"[{{"subject": "A", "concept_tag": "b", "check": {check}, "feedback": "f"}}]"#
            );
            let err = RuleTable::from_json(&json).unwrap_err();
            assert!(matches!(err, CoreError::InvalidRule(_)), "{check}");
        }
    }

    #[test]
    fn empty_expected_concepts_are_incorrect() {
        let verdict = AnswerEvaluator::default().evaluate("anything", "Mathematics", &[]);
        assert!(!verdict.is_correct);
        assert_eq!(verdict.score, 0.0);
    }
}
