//! Question bank and difficulty-based question selection

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// A prompt with the concepts a good answer should mention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub concepts: Vec<String>,
    #[serde(default)]
    pub media_ref: Option<String>,
}

impl Question {
    pub fn new(prompt: impl Into<String>, concepts: &[&str]) -> Self {
        Self {
            prompt: prompt.into(),
            concepts: concepts.iter().map(|c| c.to_string()).collect(),
            media_ref: None,
        }
    }

    pub fn with_media(mut self, media_ref: impl Into<String>) -> Self {
        self.media_ref = Some(media_ref.into());
        self
    }

    /// Generic question used for subjects the bank does not know.
    pub fn generic(subject: &str) -> Self {
        Self {
            prompt: format!("Tell me about {subject}."),
            concepts: vec![subject.to_string()],
            media_ref: None,
        }
    }
}

type Levels = BTreeMap<u32, Vec<Question>>;

/// Collects questions and validates them into a [`QuestionBank`].
#[derive(Debug, Default)]
pub struct QuestionBankBuilder {
    subjects: BTreeMap<String, Levels>,
}

impl QuestionBankBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a question to `subject` at difficulty `level`.
    pub fn add(mut self, subject: impl Into<String>, level: u32, question: Question) -> Self {
        self.push(subject, level, question);
        self
    }

    pub fn push(&mut self, subject: impl Into<String>, level: u32, question: Question) {
        self.subjects
            .entry(subject.into())
            .or_default()
            .entry(level)
            .or_default()
            .push(question);
    }

    /// Declare a level without questions. `build` rejects it unless
    /// questions are added later.
    pub fn declare_level(mut self, subject: impl Into<String>, level: u32) -> Self {
        self.subjects.entry(subject.into()).or_default().entry(level).or_default();
        self
    }

    pub fn build(self) -> Result<QuestionBank> {
        for (subject, levels) in &self.subjects {
            if subject.trim().is_empty() {
                return Err(CoreError::InvalidQuestionBank("empty subject name".to_string()));
            }
            if levels.is_empty() {
                return Err(CoreError::InvalidQuestionBank(format!(
                    "subject '{subject}' has no levels"
                )));
            }
            for (level, questions) in levels {
                if *level == 0 {
                    return Err(CoreError::InvalidQuestionBank(format!(
                        "subject '{subject}' uses level 0; levels start at 1"
                    )));
                }
                if questions.is_empty() {
                    return Err(CoreError::InvalidQuestionBank(format!(
                        "subject '{subject}' level {level} has no questions"
                    )));
                }
                if let Some(q) = questions.iter().find(|q| q.prompt.trim().is_empty()) {
                    return Err(CoreError::InvalidQuestionBank(format!(
                        "subject '{subject}' level {level} has a question with an empty prompt (concepts: {:?})",
                        q.concepts
                    )));
                }
            }
        }
        Ok(QuestionBank {
            subjects: self.subjects,
            current: None,
        })
    }
}

/// Read-only question data plus the most recently selected question.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    subjects: BTreeMap<String, Levels>,
    current: Option<Question>,
}

impl QuestionBank {
    pub fn builder() -> QuestionBankBuilder {
        QuestionBankBuilder::new()
    }

    /// Curated bank shipped with the app.
    pub fn builtin() -> Self {
        let mut b = QuestionBankBuilder::new();

        b.push(
            "Mathematics",
            1,
            Question::new("What is 5 + 7?", &["addition", "single digit", "basic math"])
                .with_media("videos/math_addition.mp4"),
        );
        b.push(
            "Mathematics",
            1,
            Question::new("What is 8 × 4?", &["multiplication", "single digit", "basic math"])
                .with_media("videos/math_multiplication.mp4"),
        );
        b.push(
            "Mathematics",
            2,
            Question::new(
                "What is the area of a rectangle with length 6 and width 4?",
                &["area", "rectangle", "multiplication"],
            ),
        );
        b.push(
            "Mathematics",
            3,
            Question::new("Solve for x: 3x + 2 = 14", &["algebra", "equations", "solving for variable"]),
        );
        b.push(
            "Mathematics",
            4,
            Question::new("What is the derivative of f(x) = x² + 3x + 2?", &["calculus", "derivatives", "polynomial"]),
        );

        b.push(
            "Science",
            1,
            Question::new(
                "What are the three states of matter?",
                &["states of matter", "basic science", "solid", "liquid", "gas"],
            )
            .with_media("videos/science_states.mp4"),
        );
        b.push(
            "Science",
            2,
            Question::new("What is photosynthesis?", &["photosynthesis", "plants", "biology", "energy"]),
        );
        b.push(
            "Science",
            3,
            Question::new(
                "Explain how photosynthesis works.",
                &["photosynthesis", "biology", "plants", "chlorophyll", "carbon dioxide", "water", "sunlight"],
            ),
        );
        b.push(
            "Science",
            4,
            Question::new(
                "Describe quantum entanglement.",
                &["quantum physics", "entanglement", "advanced physics", "particles"],
            ),
        );

        b.push(
            "Programming",
            1,
            Question::new(
                "What does the print function do in programming?",
                &["print", "output", "basic programming", "display"],
            ),
        );
        b.push(
            "Programming",
            2,
            Question::new("What is a variable in programming?", &["variable", "data storage", "programming basics"]),
        );
        b.push(
            "Programming",
            3,
            Question::new(
                "Explain the concept of a for loop.",
                &["loops", "iteration", "control flow", "repetition"],
            ),
        );
        b.push(
            "Programming",
            4,
            Question::new(
                "Describe how recursion works and provide an example.",
                &["recursion", "functions", "advanced programming", "call stack"],
            ),
        );

        b.push(
            "History",
            1,
            Question::new(
                "Who was the first President of the United States?",
                &["president", "united states", "george washington", "american history"],
            ),
        );

        b.push(
            "Language Arts",
            1,
            Question::new(
                "What is the difference between a noun and a verb?",
                &["noun", "verb", "grammar", "parts of speech"],
            ),
        );

        QuestionBank {
            subjects: b.subjects,
            current: None,
        }
    }

    /// Subject names, alphabetically.
    pub fn subjects(&self) -> Vec<String> {
        self.subjects.keys().cloned().collect()
    }

    pub fn contains_subject(&self, subject: &str) -> bool {
        self.subjects.contains_key(subject)
    }

    /// Highest difficulty level available for `subject`.
    pub fn max_level(&self, subject: &str) -> Option<u32> {
        self.subjects
            .get(subject)
            .and_then(|levels| levels.keys().next_back().copied())
    }

    /// Number of questions across all subjects and levels.
    pub fn question_count(&self) -> usize {
        self.subjects
            .values()
            .flat_map(|levels| levels.values())
            .map(Vec::len)
            .sum()
    }

    /// The level actually used for a requested difficulty: the highest
    /// level not above `difficulty`, or the lowest level if all are above.
    pub fn resolve_level(&self, subject: &str, difficulty: u32) -> Option<u32> {
        let levels = self.subjects.get(subject)?;
        levels
            .range(..=difficulty)
            .next_back()
            .or_else(|| levels.iter().next())
            .map(|(level, _)| *level)
    }

    /// Pick a random question for `subject` at `difficulty` and remember it
    /// as the current question.
    pub fn get_question(&mut self, subject: &str, difficulty: u32) -> Question {
        let mut rng = rand::thread_rng();
        self.get_question_with(subject, difficulty, &mut rng)
    }

    /// Same as [`get_question`](Self::get_question) with a caller-supplied RNG.
    pub fn get_question_with<R: Rng + ?Sized>(
        &mut self,
        subject: &str,
        difficulty: u32,
        rng: &mut R,
    ) -> Question {
        let picked = self
            .resolve_level(subject, difficulty)
            .and_then(|level| {
                debug!(subject, difficulty, level, "resolved question level");
                self.subjects.get(subject)?.get(&level)?.choose(rng).cloned()
            })
            .unwrap_or_else(|| {
                debug!(subject, "unknown subject, using generic question");
                Question::generic(subject)
            });

        self.current = Some(picked.clone());
        picked
    }

    /// Concepts of the last selected question, empty if none selected yet.
    pub fn current_concepts(&self) -> Vec<String> {
        self.current
            .as_ref()
            .map(|q| q.concepts.clone())
            .unwrap_or_default()
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.current.as_ref()
    }
}

impl Default for QuestionBank {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn unknown_subject_gets_generic_question() {
        let mut bank = QuestionBank::builtin();
        let q = bank.get_question("Astronomy", 3);
        assert!(q.prompt.contains("Astronomy"));
        assert_eq!(q.concepts, vec!["Astronomy".to_string()]);
        assert_eq!(bank.current_concepts(), vec!["Astronomy".to_string()]);
    }

    #[test]
    fn difficulty_above_max_uses_hardest_level() {
        let mut bank = QuestionBank::builtin();
        assert_eq!(bank.max_level("History"), Some(1));
        let q = bank.get_question("History", 99);
        assert!(q.prompt.contains("first President"));

        assert_eq!(bank.resolve_level("Mathematics", 10), Some(4));
        let q = bank.get_question("Mathematics", 10);
        assert!(q.concepts.contains(&"calculus".to_string()));
    }

    #[test]
    fn difficulty_below_lowest_level_uses_lowest() {
        let bank = QuestionBank::builder()
            .add("Chess", 3, Question::new("What is castling?", &["king", "rook"]))
            .add("Chess", 5, Question::new("What is zugzwang?", &["zugzwang"]))
            .build()
            .unwrap();
        assert_eq!(bank.resolve_level("Chess", 1), Some(3));
        assert_eq!(bank.resolve_level("Chess", 4), Some(3));
        assert_eq!(bank.resolve_level("Chess", 0), Some(3));
        assert_eq!(bank.resolve_level("Chess", 7), Some(5));
    }

    #[test]
    fn selection_stays_within_resolved_level() {
        let mut bank = QuestionBank::builtin();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let q = bank.get_question_with("Mathematics", 1, &mut rng);
            assert!(q.concepts.contains(&"basic math".to_string()));
        }
    }

    #[test]
    fn current_concepts_empty_before_selection() {
        let bank = QuestionBank::builtin();
        assert!(bank.current_concepts().is_empty());
        assert!(bank.current_question().is_none());
    }

    #[test]
    fn builder_rejects_empty_level() {
        let err = QuestionBank::builder()
            .declare_level("Art", 1)
            .build()
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidQuestionBank(_)));
    }

    #[test]
    fn builder_rejects_level_zero() {
        let err = QuestionBank::builder()
            .add("Art", 0, Question::new("Who painted the Mona Lisa?", &["da vinci"]))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("level 0"));
    }

    #[test]
    fn builtin_bank_lists_all_subjects() {
        let bank = QuestionBank::builtin();
        let subjects = bank.subjects();
        for subject in ["Mathematics", "Science", "History", "Language Arts", "Programming"] {
            assert!(subjects.contains(&subject.to_string()), "missing {subject}");
        }
        assert_eq!(bank.question_count(), 15);
    }
}
