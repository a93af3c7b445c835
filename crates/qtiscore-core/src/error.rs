//! Scoring error types.
//!
//! Only caller contract violations cross the engine boundary as errors.
//! Everything that goes wrong inside a rule tree is reported through the
//! [`ScoreLogger`](crate::logging::ScoreLogger) sink instead.

use thiserror::Error;

/// Errors returned by the batch entry points of the scoring engine.
#[derive(Debug, Error)]
pub enum ScoringError {
    /// Response processing was requested without any item definitions.
    #[error("assessment items cannot be empty when calling response processing")]
    MissingItems,

    /// Outcome processing was requested without a test definition.
    #[error("assessment test cannot be missing when calling outcome processing")]
    MissingTest,

    /// A worker processing one result panicked or was cancelled.
    #[error("scoring worker failed: {0}")]
    Worker(String),
}

impl ScoringError {
    /// Returns `true` if the error is a caller contract violation rather than
    /// a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ScoringError::MissingItems | ScoringError::MissingTest)
    }
}
