//! Speech capture plumbing
//!
//! Recording and recognition belong to an external collaborator. The core
//! only hands out one completion sink at a time and picks up the result
//! later from its own thread.

use std::fmt;
use std::thread::JoinHandle;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};

/// Why a capture produced no text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionFailure {
    NoSpeechDetected,
    UnintelligibleAudio,
    ServiceError(String),
    Generic(String),
}

impl TranscriptionFailure {
    /// Text shown in the answer box in place of a transcript.
    pub fn as_answer_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TranscriptionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptionFailure::NoSpeechDetected => write!(f, "No speech detected"),
            TranscriptionFailure::UnintelligibleAudio => write!(f, "Could not understand audio"),
            TranscriptionFailure::ServiceError(detail) => write!(
                f,
                "Could not request results from speech recognition service: {detail}"
            ),
            TranscriptionFailure::Generic(detail) => write!(f, "Error: {detail}"),
        }
    }
}

pub type TranscriptionOutcome = std::result::Result<String, TranscriptionFailure>;

/// Blocking capture-and-transcribe, supplied by the speech collaborator.
pub trait Transcriber: Send + 'static {
    fn transcribe(&mut self) -> TranscriptionOutcome;
}

impl<F> Transcriber for F
where
    F: FnMut() -> TranscriptionOutcome + Send + 'static,
{
    fn transcribe(&mut self) -> TranscriptionOutcome {
        self()
    }
}

/// Single-use handle for delivering one transcription result.
#[derive(Debug)]
pub struct TranscriptionSink {
    tx: oneshot::Sender<TranscriptionOutcome>,
}

impl TranscriptionSink {
    /// Deliver the result. Returns `false` if the core no longer waits for it.
    pub fn complete(self, outcome: TranscriptionOutcome) -> bool {
        self.tx.send(outcome).is_ok()
    }
}

#[derive(Debug)]
struct PendingCapture {
    rx: oneshot::Receiver<TranscriptionOutcome>,
    cycle: u64,
}

/// Tracks the single outstanding transcription request.
#[derive(Debug, Default)]
pub struct SpeechCapture {
    pending: Option<PendingCapture>,
}

impl SpeechCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_listening(&self) -> bool {
        self.pending.is_some()
    }

    /// Open a request tagged with the answer cycle it belongs to.
    pub fn begin(&mut self, cycle: u64) -> Result<TranscriptionSink> {
        if self.pending.is_some() {
            return Err(CoreError::CaptureInProgress);
        }
        let (tx, rx) = oneshot::channel();
        self.pending = Some(PendingCapture { rx, cycle });
        info!(cycle, "listening for speech");
        Ok(TranscriptionSink { tx })
    }

    /// Take the result if it has arrived. A sink dropped without a result
    /// counts as a generic failure.
    pub fn poll(&mut self) -> Option<(u64, TranscriptionOutcome)> {
        let pending = self.pending.as_mut()?;
        let outcome = match pending.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => {
                warn!("speech capture ended without a result");
                Err(TranscriptionFailure::Generic(
                    "capture ended without a result".to_string(),
                ))
            }
        };
        let cycle = pending.cycle;
        self.pending = None;
        match &outcome {
            Ok(text) => debug!(cycle, chars = text.len(), "speech recognized"),
            Err(failure) => warn!(cycle, %failure, "speech capture failed"),
        }
        Some((cycle, outcome))
    }
}

/// Run a blocking transcriber on a background thread and deliver its
/// result through `sink`.
pub fn spawn_transcription<T: Transcriber>(mut transcriber: T, sink: TranscriptionSink) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let outcome = transcriber.transcribe();
        if !sink.complete(outcome) {
            debug!("transcription result dropped; request no longer pending");
        }
    })
}
