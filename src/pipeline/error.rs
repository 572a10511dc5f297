//! Error types and reporting for pipeline stages.

use crate::error::HardsubError;
use std::fmt;

/// Errors that can occur while a stage processes an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// The item is skipped; the worker keeps processing.
    Recoverable(String),
    /// The worker stops; its pool still drains and closes normally.
    Fatal(String),
    /// An internal or upstream invariant was violated. The worker stops and
    /// the run is reported as failed.
    Invariant(String),
}

impl StageError {
    /// Returns true if the worker must stop after this error.
    pub fn stops_worker(&self) -> bool {
        !matches!(self, StageError::Recoverable(_))
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageError::Recoverable(msg) => write!(f, "Recoverable error: {}", msg),
            StageError::Fatal(msg) => write!(f, "Fatal error: {}", msg),
            StageError::Invariant(msg) => write!(f, "Invariant violation: {}", msg),
        }
    }
}

impl std::error::Error for StageError {}

impl From<HardsubError> for StageError {
    fn from(error: HardsubError) -> Self {
        match error {
            HardsubError::ClosedQueue { .. } | HardsubError::BufferInconsistency { .. } => {
                StageError::Invariant(error.to_string())
            }
            HardsubError::ExternalTool { .. }
            | HardsubError::ToolNotFound { .. }
            | HardsubError::Io(_)
            | HardsubError::Json(_) => StageError::Fatal(error.to_string()),
            other => StageError::Recoverable(other.to_string()),
        }
    }
}

/// A stage error together with where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: &'static str,
    pub worker_id: usize,
    pub error: StageError,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}#{}] {}", self.stage, self.worker_id, self.error)
    }
}

/// Trait for reporting stage errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from a stage worker.
    fn report(&self, stage: &str, worker_id: usize, error: &StageError);
}

/// Error reporter that forwards to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, stage: &str, worker_id: usize, error: &StageError) {
        match error {
            StageError::Recoverable(_) => log::warn!("[{}#{}] {}", stage, worker_id, error),
            _ => log::error!("[{}#{}] {}", stage, worker_id, error),
        }
    }
}
