//! Python bindings for the desktop front end

use std::path::Path;

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::config::LearnConfig;
use crate::error::CoreError;
use crate::questions::QuestionBank;
use crate::session::{Feedback, SessionController, SessionView};
use crate::speech::{TranscriptionFailure, TranscriptionOutcome, TranscriptionSink};

fn to_py_err(e: CoreError) -> PyErr {
    if e.is_recoverable() {
        PyValueError::new_err(e.to_string())
    } else {
        PyRuntimeError::new_err(e.to_string())
    }
}

fn load_config(config_path: Option<&str>) -> PyResult<LearnConfig> {
    match config_path {
        Some(path) => LearnConfig::load(Path::new(path)).map_err(to_py_err),
        None => Ok(LearnConfig::default()),
    }
}

/// Feedback after an answer
#[pyclass(name = "Feedback")]
#[derive(Debug, Clone)]
pub struct PyFeedback {
    #[pyo3(get)]
    pub title: String,
    #[pyo3(get)]
    pub body: String,
    #[pyo3(get)]
    pub is_correct: bool,
    #[pyo3(get)]
    pub xp_gained: u64,
    #[pyo3(get)]
    pub leveled_up: bool,
}

#[pymethods]
impl PyFeedback {
    fn __repr__(&self) -> String {
        format!(
            "Feedback(title='{}', is_correct={}, xp_gained={})",
            self.title, self.is_correct, self.xp_gained
        )
    }
}

impl From<Feedback> for PyFeedback {
    fn from(feedback: Feedback) -> Self {
        Self {
            title: feedback.title,
            body: feedback.body,
            is_correct: feedback.is_correct,
            xp_gained: feedback.award.map(|a| a.xp_gained).unwrap_or(0),
            leveled_up: feedback.award.map(|a| a.leveled_up).unwrap_or(false),
        }
    }
}

/// Snapshot of what the window should display
#[pyclass(name = "SessionView")]
#[derive(Debug, Clone)]
pub struct PySessionView {
    #[pyo3(get)]
    pub phase: String,
    #[pyo3(get)]
    pub subject: Option<String>,
    #[pyo3(get)]
    pub prompt: Option<String>,
    #[pyo3(get)]
    pub media_ref: Option<String>,
    #[pyo3(get)]
    pub progress_fraction: f64,
    #[pyo3(get)]
    pub level: u32,
    #[pyo3(get)]
    pub xp: u64,
    #[pyo3(get)]
    pub feedback: Option<PyFeedback>,
    #[pyo3(get)]
    pub answer_draft: Option<String>,
    #[pyo3(get)]
    pub is_listening: bool,
}

#[pymethods]
impl PySessionView {
    fn __repr__(&self) -> String {
        format!(
            "SessionView(phase='{}', level={}, xp={}, progress={:.2})",
            self.phase, self.level, self.xp, self.progress_fraction
        )
    }
}

impl From<SessionView> for PySessionView {
    fn from(view: SessionView) -> Self {
        Self {
            phase: view.phase.as_str().to_string(),
            subject: view.subject,
            prompt: view.prompt,
            media_ref: view.media_ref,
            progress_fraction: view.progress_fraction,
            level: view.level,
            xp: view.xp,
            feedback: view.feedback.map(PyFeedback::from),
            answer_draft: view.answer_draft,
            is_listening: view.is_listening,
        }
    }
}

/// One learner's session controller
#[pyclass(name = "Session", unsendable)]
pub struct PySession {
    inner: SessionController,
    sink: Option<TranscriptionSink>,
}

#[pymethods]
impl PySession {
    #[new]
    #[pyo3(signature = (config_path=None))]
    fn new(config_path: Option<&str>) -> PyResult<Self> {
        let config = load_config(config_path)?;
        Ok(Self {
            inner: SessionController::from_config(&config),
            sink: None,
        })
    }

    fn subjects(&self) -> Vec<String> {
        self.inner.subjects()
    }

    /// Returns the first prompt.
    fn start_session(&mut self, subject: &str) -> PyResult<String> {
        self.inner
            .start_session(subject)
            .map(|q| q.prompt)
            .map_err(to_py_err)
    }

    fn submit_answer(&mut self, text: &str) -> PyResult<PyFeedback> {
        self.inner
            .submit_answer(text)
            .map(PyFeedback::from)
            .map_err(to_py_err)
    }

    /// Returns the next prompt.
    fn continue_session(&mut self) -> PyResult<String> {
        self.inner
            .continue_session()
            .map(|q| q.prompt)
            .map_err(to_py_err)
    }

    /// Returns `(questions_answered, correct_answers, accuracy_percent)`.
    fn end_session(&mut self) -> Option<(u32, u32, f64)> {
        self.sink = None;
        self.inner
            .end_session()
            .map(|s| (s.questions_answered, s.correct_answers, s.accuracy_percent))
    }

    fn begin_capture(&mut self) -> PyResult<()> {
        let sink = self.inner.begin_capture().map_err(to_py_err)?;
        self.sink = Some(sink);
        Ok(())
    }

    /// Deliver the recognizer result: either `text`, or a `failure` of
    /// `no_speech`, `unintelligible`, `service_error` or `error`.
    #[pyo3(signature = (text=None, failure=None, detail=None))]
    fn deliver_transcription(
        &mut self,
        text: Option<String>,
        failure: Option<&str>,
        detail: Option<String>,
    ) -> PyResult<Option<String>> {
        let outcome: TranscriptionOutcome = match (text, failure) {
            (Some(text), None) => Ok(text),
            (None, Some(kind)) => {
                let detail = detail.unwrap_or_default();
                Err(match kind {
                    "no_speech" => TranscriptionFailure::NoSpeechDetected,
                    "unintelligible" => TranscriptionFailure::UnintelligibleAudio,
                    "service_error" => TranscriptionFailure::ServiceError(detail),
                    "error" => TranscriptionFailure::Generic(detail),
                    other => {
                        return Err(PyValueError::new_err(format!(
                            "unknown failure kind: {other}"
                        )))
                    }
                })
            }
            _ => {
                return Err(PyValueError::new_err(
                    "pass exactly one of text or failure",
                ))
            }
        };

        let sink = self
            .sink
            .take()
            .ok_or_else(|| PyRuntimeError::new_err("no speech capture in progress"))?;
        sink.complete(outcome);
        Ok(self.inner.poll_transcription())
    }

    fn poll_transcription(&mut self) -> Option<String> {
        self.inner.poll_transcription()
    }

    fn view(&self) -> PySessionView {
        self.inner.view().into()
    }
}

// ============= Module Functions =============

#[pyfunction]
#[pyo3(name = "init_logging", signature = (config_path=None))]
pub fn py_init_logging(config_path: Option<&str>) -> PyResult<()> {
    let config = load_config(config_path)?;
    crate::logging::init_logging(&config).map_err(to_py_err)
}

#[pyfunction]
#[pyo3(name = "subjects")]
pub fn py_subjects() -> Vec<String> {
    QuestionBank::builtin().subjects()
}
