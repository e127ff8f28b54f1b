//! LearnXP Core - session and scoring engine for the gamified learning assistant
//!
//! Provides question selection, answer evaluation, XP/level progress with
//! JSON persistence, and the session state machine the desktop front end drives.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod import;
pub mod logging;
pub mod matcher;
pub mod progress;
pub mod questions;
pub mod session;
pub mod speech;

#[cfg(feature = "python")]
mod python;

pub use config::LearnConfig;
pub use error::{CoreError, Result};
pub use evaluator::{AnswerCheck, AnswerEvaluator, LiteralRule, RuleTable, Verdict};
pub use import::{load_question_bank, parse_file};
pub use logging::init_logging;
pub use matcher::{ConceptMatch, ConceptMatcher, Lexicon};
pub use progress::{AnswerTally, ProgressStore, ProgressTracker, SubjectProgress, XpAward};
pub use questions::{Question, QuestionBank, QuestionBankBuilder};
pub use session::{Feedback, SessionController, SessionPhase, SessionState, SessionSummary, SessionView};
pub use speech::{
    spawn_transcription, SpeechCapture, Transcriber, TranscriptionFailure, TranscriptionOutcome,
    TranscriptionSink,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// LearnXP Core Python Module
#[cfg(feature = "python")]
#[pymodule]
fn learnxp_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(python::py_init_logging, m)?)?;
    m.add_function(wrap_pyfunction!(python::py_subjects, m)?)?;

    m.add_class::<python::PySession>()?;
    m.add_class::<python::PySessionView>()?;
    m.add_class::<python::PyFeedback>()?;

    Ok(())
}
