//! Error taxonomy for the sentence pipeline.
//!
//! Only [`PipelineError::Aborted`] is ever surfaced to callers of the
//! orchestrator; every other variant is recovered locally into an outcome
//! entry or a no-op step, and exists so that logs and reports can name
//! what happened.

use crate::detector::IgnoreReason;
use crate::registry::AnalysisKind;
use thiserror::Error;

/// Errors and no-op signals produced while turning edits into analyses.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The event did not constitute a boundary.
    #[error("not a sentence boundary: {0}")]
    BoundaryIgnored(IgnoreReason),

    /// The normalized sentence was already processed in this session.
    #[error("sentence already processed: {key:?}")]
    DuplicateRejected { key: String },

    /// One analysis kind did not answer within its per-call budget.
    #[error("{kind} analysis timed out after {elapsed_ms}ms")]
    AnalysisTimeout { kind: AnalysisKind, elapsed_ms: u64 },

    /// One analysis kind failed after exhausting its retries.
    #[error("{kind} analysis failed after {attempts} attempt(s): {message}")]
    AnalysisFailure {
        kind: AnalysisKind,
        message: String,
        attempts: u32,
    },

    /// One analysis kind answered below the confidence gate.
    #[error("{kind} analysis confidence {confidence:.2} is below the quality gate")]
    LowConfidence { kind: AnalysisKind, confidence: f64 },

    /// The error budget for a sentence was exceeded.
    #[error("analysis aborted: {failed} kind(s) failed, at most {max_errors} tolerated")]
    Aborted { failed: usize, max_errors: usize },
}

/// Invalid registry or detector configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("retry max_attempts must be at least 1")]
    NoAttempts,

    #[error("min_confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f64),

    #[error("terminal punctuation set must not be empty")]
    NoTerminalChars,

    #[error("endpoint for {kind} is empty")]
    EmptyEndpoint { kind: AnalysisKind },

    #[error("base URL must start with http:// or https://, got {0:?}")]
    InvalidBaseUrl(String),

    #[error("unknown analysis kind: {0}")]
    UnknownKind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PipelineError::AnalysisTimeout {
            kind: AnalysisKind::Topic,
            elapsed_ms: 5000,
        };
        assert_eq!(err.to_string(), "topic analysis timed out after 5000ms");

        let err = PipelineError::Aborted {
            failed: 3,
            max_errors: 2,
        };
        assert!(err.to_string().contains("3 kind(s) failed"));

        let err = PipelineError::BoundaryIgnored(IgnoreReason::CursorNotAtEnd);
        assert!(err.to_string().starts_with("not a sentence boundary"));
    }
}
