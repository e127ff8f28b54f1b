//! Learning session state machine
//!
//! `Idle -> SubjectSelected -> QuestionPosed -> AwaitingAnswer -> Evaluated`
//! then back to `QuestionPosed` for the next question, or to `Idle` when the
//! user returns home. Answer counters live for the whole controller, so
//! they carry over between sessions.

use std::fmt;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::LearnConfig;
use crate::error::{CoreError, Result};
use crate::evaluator::AnswerEvaluator;
use crate::import::load_question_bank;
use crate::progress::{AnswerTally, ProgressTracker, SubjectProgress, XpAward};
use crate::questions::{Question, QuestionBank};
use crate::speech::{spawn_transcription, SpeechCapture, Transcriber, TranscriptionSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    SubjectSelected,
    QuestionPosed,
    AwaitingAnswer,
    Evaluated,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::SubjectSelected => "subject_selected",
            SessionPhase::QuestionPosed => "question_posed",
            SessionPhase::AwaitingAnswer => "awaiting_answer",
            SessionPhase::Evaluated => "evaluated",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feedback shown after an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub title: String,
    pub body: String,
    pub is_correct: bool,
    pub award: Option<XpAward>,
}

/// Transient state of the active session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub subject: String,
    pub current_question: Question,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub progress_fraction: f64,
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub phase: SessionPhase,
    pub subject: Option<String>,
    pub prompt: Option<String>,
    pub media_ref: Option<String>,
    pub progress_fraction: f64,
    pub level: u32,
    pub xp: u64,
    pub feedback: Option<Feedback>,
    pub answer_draft: Option<String>,
    pub is_listening: bool,
}

/// Totals for one finished session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub subject: String,
    pub questions_answered: u32,
    pub correct_answers: u32,
    pub accuracy_percent: f64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

#[derive(Debug)]
struct ActiveSession {
    subject: String,
    question: Option<Question>,
    started_at: DateTime<Utc>,
    tally: AnswerTally,
    feedback: Option<Feedback>,
    answer_draft: Option<String>,
}

/// Drives one learner through question/answer cycles.
#[derive(Debug)]
pub struct SessionController {
    bank: QuestionBank,
    evaluator: AnswerEvaluator,
    tracker: ProgressTracker,
    speech: SpeechCapture,
    phase: SessionPhase,
    active: Option<ActiveSession>,
    tally: AnswerTally,
    progress_fraction: f64,
    progress_window: u32,
    cycle: u64,
}

impl SessionController {
    pub fn new(bank: QuestionBank, evaluator: AnswerEvaluator, tracker: ProgressTracker) -> Self {
        Self {
            bank,
            evaluator,
            tracker,
            speech: SpeechCapture::new(),
            phase: SessionPhase::Idle,
            active: None,
            tally: AnswerTally::default(),
            progress_fraction: 0.0,
            progress_window: 5,
            cycle: 0,
        }
    }

    pub fn from_config(config: &LearnConfig) -> Self {
        Self::new(
            load_question_bank(config),
            AnswerEvaluator::from_config(config),
            ProgressTracker::open(&config.progress_path),
        )
        .with_progress_window(config.progress_window)
    }

    /// Questions per progress-bar cycle.
    pub fn with_progress_window(mut self, window: u32) -> Self {
        self.progress_window = window.max(1);
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn bank(&self) -> &QuestionBank {
        &self.bank
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn tally(&self) -> AnswerTally {
        self.tally
    }

    pub fn progress_fraction(&self) -> f64 {
        self.progress_fraction
    }

    pub fn subjects(&self) -> Vec<String> {
        self.bank.subjects()
    }

    fn require(&self, allowed: SessionPhase, operation: &'static str) -> Result<()> {
        if self.phase == allowed {
            Ok(())
        } else {
            Err(CoreError::InvalidState {
                operation,
                phase: self.phase.as_str(),
            })
        }
    }

    fn subject_progress(&self) -> SubjectProgress {
        self.active
            .as_ref()
            .and_then(|a| self.tracker.progress(&a.subject))
            .unwrap_or_default()
    }

    /// Begin a session on `subject` and pose its first question.
    pub fn start_session(&mut self, subject: &str) -> Result<Question> {
        self.require(SessionPhase::Idle, "start a session")?;

        self.phase = SessionPhase::SubjectSelected;
        let progress = self.tracker.get_or_init(subject);
        self.active = Some(ActiveSession {
            subject: subject.to_string(),
            question: None,
            started_at: Utc::now(),
            tally: AnswerTally::default(),
            feedback: None,
            answer_draft: None,
        });
        info!(subject, level = progress.level, xp = progress.xp, "session started");

        self.pose_question()
    }

    fn pose_question(&mut self) -> Result<Question> {
        let level = self.subject_progress().level;
        let active = self.active.as_mut().ok_or(CoreError::InvalidState {
            operation: "pose a question",
            phase: SessionPhase::Idle.as_str(),
        })?;

        let question = self.bank.get_question(&active.subject, level);
        self.cycle += 1;
        self.progress_fraction = f64::from(self.tally.questions_answered % self.progress_window)
            / f64::from(self.progress_window);
        active.question = Some(question.clone());
        active.feedback = None;
        active.answer_draft = None;
        self.phase = SessionPhase::QuestionPosed;
        info!(subject = %active.subject, level, prompt = %question.prompt, "loaded question");

        self.phase = SessionPhase::AwaitingAnswer;
        Ok(question)
    }

    /// Evaluate an answer to the current question.
    pub fn submit_answer(&mut self, text: &str) -> Result<Feedback> {
        self.require(SessionPhase::AwaitingAnswer, "submit an answer")?;

        let answer = text.trim();
        if answer.is_empty() {
            warn!("empty answer submitted");
            return Err(CoreError::EmptyAnswer);
        }

        let subject = match &self.active {
            Some(active) => active.subject.clone(),
            None => {
                return Err(CoreError::InvalidState {
                    operation: "submit an answer",
                    phase: SessionPhase::Idle.as_str(),
                })
            }
        };
        let expected = self.bank.current_concepts();
        let verdict = self.evaluator.evaluate(answer, &subject, &expected);

        self.tally.record(verdict.is_correct);
        let mut body = verdict.feedback;
        let award = if verdict.is_correct {
            let level = self.tracker.get_or_init(&subject).level;
            let award = self.tracker.apply_correct_answer(&subject, level);
            if award.leveled_up {
                body.push_str(&format!(
                    "\n\nLevel Up! You've reached Level {}!",
                    award.new_level
                ));
            }
            Some(award)
        } else {
            None
        };

        let feedback = Feedback {
            title: if verdict.is_correct { "Well Done!" } else { "Let's Review" }.to_string(),
            body,
            is_correct: verdict.is_correct,
            award,
        };

        if let Some(active) = self.active.as_mut() {
            active.tally.record(feedback.is_correct);
            active.feedback = Some(feedback.clone());
            active.answer_draft = None;
        }
        self.phase = SessionPhase::Evaluated;
        info!(
            subject = %subject,
            correct = feedback.is_correct,
            questions = self.tally.questions_answered,
            "answer evaluated"
        );
        Ok(feedback)
    }

    /// Move on to the next question after feedback.
    pub fn continue_session(&mut self) -> Result<Question> {
        self.require(SessionPhase::Evaluated, "continue")?;
        self.pose_question()
    }

    /// Return home: persist progress and drop the session.
    pub fn end_session(&mut self) -> Option<SessionSummary> {
        self.tracker.persist();
        self.speech = SpeechCapture::new();
        self.phase = SessionPhase::Idle;

        let active = self.active.take()?;
        let summary = SessionSummary {
            subject: active.subject,
            questions_answered: active.tally.questions_answered,
            correct_answers: active.tally.correct_answers,
            accuracy_percent: active.tally.accuracy_percent(),
            started_at: active.started_at,
            ended_at: Utc::now(),
        };
        info!(
            subject = %summary.subject,
            answered = summary.questions_answered,
            correct = summary.correct_answers,
            "returned to home"
        );
        Some(summary)
    }

    /// Open a transcription request for the current question.
    pub fn begin_capture(&mut self) -> Result<TranscriptionSink> {
        self.require(SessionPhase::AwaitingAnswer, "listen for speech")?;
        self.speech.begin(self.cycle)
    }

    /// Open a request and run `transcriber` on a background thread.
    pub fn listen_with<T: Transcriber>(&mut self, transcriber: T) -> Result<JoinHandle<()>> {
        let sink = self.begin_capture()?;
        Ok(spawn_transcription(transcriber, sink))
    }

    pub fn is_listening(&self) -> bool {
        self.speech.is_listening()
    }

    /// Pick up a finished transcription. The text becomes the answer draft
    /// when the same question is still waiting for an answer; failures are
    /// turned into their message text.
    pub fn poll_transcription(&mut self) -> Option<String> {
        let (cycle, outcome) = self.speech.poll()?;
        if self.phase != SessionPhase::AwaitingAnswer || cycle != self.cycle {
            debug!(cycle, current = self.cycle, phase = %self.phase, "ignoring stale transcription");
            return None;
        }
        let text = outcome.unwrap_or_else(|failure| failure.as_answer_text());
        let active = self.active.as_mut()?;
        active.answer_draft = Some(text.clone());
        Some(text)
    }

    pub fn answer_draft(&self) -> Option<&str> {
        self.active.as_ref()?.answer_draft.as_deref()
    }

    pub fn state(&self) -> Option<SessionState> {
        let active = self.active.as_ref()?;
        Some(SessionState {
            subject: active.subject.clone(),
            current_question: active.question.clone()?,
            questions_answered: self.tally.questions_answered,
            correct_answers: self.tally.correct_answers,
            progress_fraction: self.progress_fraction,
        })
    }

    pub fn view(&self) -> SessionView {
        let progress = self.subject_progress();
        let active = self.active.as_ref();
        let question = active.and_then(|a| a.question.as_ref());
        SessionView {
            phase: self.phase,
            subject: active.map(|a| a.subject.clone()),
            prompt: question.map(|q| q.prompt.clone()),
            media_ref: question.and_then(|q| q.media_ref.clone()),
            progress_fraction: self.progress_fraction,
            level: progress.level,
            xp: progress.xp,
            feedback: active.and_then(|a| a.feedback.clone()),
            answer_draft: active.and_then(|a| a.answer_draft.clone()),
            is_listening: self.speech.is_listening(),
        }
    }
}
