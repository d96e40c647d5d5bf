//! Data models for the sentence pipeline.
//!
//! This module contains the core data structures that flow through the
//! pipeline: edit events from the editing surface, candidate sentences,
//! analysis requests and the aggregated results handed to a sink.

use crate::error::PipelineError;
use crate::registry::AnalysisKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Modifier keys held while a key was pressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    /// No modifier held.
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Shift only.
    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ctrl: false,
        alt: false,
        meta: false,
    };

    /// Returns true if any modifier is held.
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }

    /// Returns true if a shortcut modifier (ctrl, alt or meta) is held.
    ///
    /// Shortcut chords never insert text.
    pub fn is_shortcut(&self) -> bool {
        self.ctrl || self.alt || self.meta
    }
}

/// A key reported by the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
}

/// What kind of edit happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditKind {
    /// A single key press.
    KeyPress(Key),
    /// Text pasted by the user.
    Paste(String),
    /// Text inserted by the application itself.
    ProgrammaticInsert(String),
}

/// A single edit event produced by the editing surface.
///
/// Events are transient: each one is consumed exactly once by the
/// boundary detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEvent {
    pub kind: EditKind,
    /// Cursor position in the document (in characters) before the edit.
    pub cursor: usize,
    pub modifiers: Modifiers,
    pub timestamp: DateTime<Utc>,
}

impl EditEvent {
    /// Creates a key press event at the given cursor, stamped now.
    pub fn key(key: Key, cursor: usize) -> Self {
        Self {
            kind: EditKind::KeyPress(key),
            cursor,
            modifiers: Modifiers::NONE,
            timestamp: Utc::now(),
        }
    }

    /// Creates a character key press.
    pub fn char(c: char, cursor: usize) -> Self {
        Self::key(Key::Char(c), cursor)
    }

    /// Creates an Enter key press.
    pub fn enter(cursor: usize) -> Self {
        Self::key(Key::Enter, cursor)
    }

    /// Creates a paste event.
    pub fn paste(text: impl Into<String>, cursor: usize) -> Self {
        Self {
            kind: EditKind::Paste(text.into()),
            cursor,
            modifiers: Modifiers::NONE,
            timestamp: Utc::now(),
        }
    }

    /// Creates a programmatic insert.
    pub fn insert(text: impl Into<String>, cursor: usize) -> Self {
        Self {
            kind: EditKind::ProgrammaticInsert(text.into()),
            cursor,
            modifiers: Modifiers::NONE,
            timestamp: Utc::now(),
        }
    }

    /// Returns the event with the given modifiers.
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Returns the event with shift held.
    pub fn with_shift(self) -> Self {
        self.with_modifiers(Modifiers::SHIFT)
    }

    /// Returns the event stamped at the given time.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Why a candidate sentence was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerReason {
    /// A terminal punctuation key was typed.
    Punctuation,
    /// Enter at the end of the segment, or an idle pause.
    Pause,
    /// The application asked for the segment to be closed.
    Manual,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::Punctuation => write!(f, "punctuation"),
            TriggerReason::Pause => write!(f, "pause"),
            TriggerReason::Manual => write!(f, "manual"),
        }
    }
}

/// Half-open range of document positions, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionRange {
    pub start: usize,
    pub end: usize,
}

impl PositionRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A span of text considered complete enough to analyze.
///
/// Immutable once emitted by the boundary detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSentence {
    raw_text: String,
    trigger_reason: TriggerReason,
    source_range: PositionRange,
}

impl CandidateSentence {
    pub fn new(
        raw_text: impl Into<String>,
        trigger_reason: TriggerReason,
        source_range: PositionRange,
    ) -> Self {
        Self {
            raw_text: raw_text.into(),
            trigger_reason,
            source_range,
        }
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn trigger_reason(&self) -> TriggerReason {
        self.trigger_reason
    }

    pub fn source_range(&self) -> PositionRange {
        self.source_range
    }
}

/// Context supplied by the surrounding application for one orchestration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentenceContext {
    pub full_text: String,
    /// Earlier sentences, oldest first.
    pub preceding_sentences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative_goal: Option<String>,
}

/// The read-only payload shared by every analysis call of one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub sentence: CandidateSentence,
    pub context: SentenceContext,
}

impl AnalysisRequest {
    pub fn new(sentence: CandidateSentence, context: SentenceContext) -> Self {
        Self { sentence, context }
    }
}

/// Structured payload returned by an analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    /// Confidence reported by the endpoint, in `[0, 1]`.
    pub confidence: f64,
    /// The full response body.
    pub data: serde_json::Value,
}

/// Why an analysis ended in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The remote call kept failing until retries ran out.
    Remote,
    /// The call succeeded but its confidence was under the quality gate.
    LowConfidence,
    /// The task ended without reporting an outcome.
    Lost,
}

/// Details of a failed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
    pub attempts: u32,
    /// Payload kept for inspection (low-confidence results only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<AnalysisPayload>,
}

/// Outcome of one analysis kind for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AnalysisOutcome {
    Success {
        payload: AnalysisPayload,
        latency_ms: u64,
        attempts: u32,
    },
    Timeout {
        elapsed_ms: u64,
        attempts: u32,
    },
    Failure(FailureDetail),
}

impl AnalysisOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalysisOutcome::Success { .. })
    }

    /// Returns the payload, including one retained on a low-confidence failure.
    pub fn payload(&self) -> Option<&AnalysisPayload> {
        match self {
            AnalysisOutcome::Success { payload, .. } => Some(payload),
            AnalysisOutcome::Failure(detail) => detail.payload.as_ref(),
            AnalysisOutcome::Timeout { .. } => None,
        }
    }

    /// Short label used in logs and reports.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisOutcome::Success { .. } => "success",
            AnalysisOutcome::Timeout { .. } => "timeout",
            AnalysisOutcome::Failure(detail) => match detail.kind {
                FailureKind::LowConfidence => "low confidence",
                FailureKind::Remote | FailureKind::Lost => "failure",
            },
        }
    }

    /// Maps a non-successful outcome onto the pipeline error taxonomy.
    pub fn to_error(&self, kind: AnalysisKind) -> Option<PipelineError> {
        match self {
            AnalysisOutcome::Success { .. } => None,
            AnalysisOutcome::Timeout { elapsed_ms, .. } => Some(PipelineError::AnalysisTimeout {
                kind,
                elapsed_ms: *elapsed_ms,
            }),
            AnalysisOutcome::Failure(detail) => match (&detail.kind, &detail.payload) {
                (FailureKind::LowConfidence, Some(payload)) => Some(PipelineError::LowConfidence {
                    kind,
                    confidence: payload.confidence,
                }),
                _ => Some(PipelineError::AnalysisFailure {
                    kind,
                    message: detail.message.clone(),
                    attempts: detail.attempts,
                }),
            },
        }
    }
}

/// Overall status of an aggregated result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Every enabled kind succeeded.
    Complete,
    /// Some kinds failed, within the error budget.
    Partial,
    /// The error budget was exceeded; treat the result as unreliable.
    Aborted,
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverallStatus::Complete => write!(f, "Complete"),
            OverallStatus::Partial => write!(f, "Partial"),
            OverallStatus::Aborted => write!(f, "Aborted"),
        }
    }
}

impl OverallStatus {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            OverallStatus::Complete => "🟢",
            OverallStatus::Partial => "🟡",
            OverallStatus::Aborted => "🔴",
        }
    }
}

/// The result of orchestrating every enabled analysis for one sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    pub sentence: CandidateSentence,
    pub per_kind_outcome: BTreeMap<AnalysisKind, AnalysisOutcome>,
    pub overall_status: OverallStatus,
    /// Error budget the status was computed against.
    pub max_errors: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl AggregatedResult {
    /// Returns the outcome for a kind, if it was enabled.
    pub fn outcome(&self, kind: AnalysisKind) -> Option<&AnalysisOutcome> {
        self.per_kind_outcome.get(&kind)
    }

    /// Number of kinds that did not succeed.
    pub fn error_count(&self) -> usize {
        self.per_kind_outcome
            .values()
            .filter(|o| !o.is_success())
            .count()
    }

    /// Kinds that did not succeed, in kind order.
    pub fn failed_kinds(&self) -> Vec<AnalysisKind> {
        self.per_kind_outcome
            .iter()
            .filter(|(_, o)| !o.is_success())
            .map(|(k, _)| *k)
            .collect()
    }

    /// Per-kind errors mapped onto the pipeline taxonomy.
    pub fn errors(&self) -> Vec<PipelineError> {
        self.per_kind_outcome
            .iter()
            .filter_map(|(kind, outcome)| outcome.to_error(*kind))
            .collect()
    }

    pub fn is_reliable(&self) -> bool {
        self.overall_status != OverallStatus::Aborted
    }

    /// Returns `Err(Aborted)` when the error budget was exceeded.
    pub fn ensure_reliable(&self) -> Result<(), PipelineError> {
        if self.is_reliable() {
            Ok(())
        } else {
            Err(PipelineError::Aborted {
                failed: self.error_count(),
                max_errors: self.max_errors,
            })
        }
    }
}
