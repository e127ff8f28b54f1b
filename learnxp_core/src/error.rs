//! Error taxonomy for the learning core.
//!
//! Only persistence and configuration failures are meant to reach a caller
//! as errors. Evaluation and question selection degrade to a fallback and
//! log instead.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the learning core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An empty or whitespace-only answer was submitted.
    #[error("please provide an answer before submitting")]
    EmptyAnswer,

    /// An operation was attempted in a session phase that does not allow it.
    #[error("cannot {operation} while session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },

    /// A transcription was requested while another one is still outstanding.
    #[error("a speech capture is already in progress")]
    CaptureInProgress,

    /// A linguistic resource or capture device is missing.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Reading or writing a file failed.
    #[error("failed to access {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The question bank violates a construction invariant.
    #[error("invalid question bank: {0}")]
    InvalidQuestionBank(String),

    /// A question file could not be imported.
    #[error("import failed: {0}")]
    Import(String),

    /// The configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A literal answer rule is malformed.
    #[error("invalid answer rule: {0}")]
    InvalidRule(String),
}

impl CoreError {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CoreError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the caller can simply re-prompt the user.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::EmptyAnswer | CoreError::InvalidState { .. } | CoreError::CaptureInProgress
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
