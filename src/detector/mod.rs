//! Sentence boundary detection.
//!
//! The detector tracks the segment currently being written and decides,
//! event by event, when that segment has become a candidate sentence.
//! [`apply_event`] is the pure core: it takes an edit event and the current
//! segment and returns either a candidate or the reason nothing happened.
//! [`BoundaryDetector`] wraps it with idle tracking and manual flushes.

pub mod pause;

use crate::error::{ConfigError, PipelineError};
use crate::models::{CandidateSentence, EditEvent, EditKind, Key, PositionRange, TriggerReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, trace};

pub use pause::{is_word_complete, PauseVerdict};

/// Why an event did not close a sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Ordinary text entry.
    Typing,
    /// A modifier key was held.
    Modifier,
    /// Enter was pressed somewhere other than the end of the segment.
    CursorNotAtEnd,
    /// The edit happened outside the open segment.
    OutsideSegment,
    /// Nothing but whitespace or punctuation to close.
    EmptySegment,
    WaitingForPause,
    TooShort,
    IncompleteWord,
    DanglingConnective,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IgnoreReason::Typing => "typing",
            IgnoreReason::Modifier => "modifier held",
            IgnoreReason::CursorNotAtEnd => "cursor not at end of segment",
            IgnoreReason::OutsideSegment => "edit outside the open segment",
            IgnoreReason::EmptySegment => "empty segment",
            IgnoreReason::WaitingForPause => "waiting for pause",
            IgnoreReason::TooShort => "too short",
            IgnoreReason::IncompleteWord => "incomplete word",
            IgnoreReason::DanglingConnective => "dangling connective",
        };
        f.write_str(s)
    }
}

/// Outcome of feeding one event to the detector.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    Boundary(CandidateSentence),
    Ignored(IgnoreReason),
}

impl Detection {
    pub fn into_candidate(self) -> Option<CandidateSentence> {
        match self {
            Detection::Boundary(candidate) => Some(candidate),
            Detection::Ignored(_) => None,
        }
    }

    pub fn into_result(self) -> Result<CandidateSentence, PipelineError> {
        match self {
            Detection::Boundary(candidate) => Ok(candidate),
            Detection::Ignored(reason) => Err(PipelineError::BoundaryIgnored(reason)),
        }
    }
}

/// Detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Characters that close a segment when typed without a modifier.
    #[serde(default = "default_terminal_chars")]
    pub terminal_chars: Vec<char>,

    /// Idle time before a pause may close the segment.
    #[serde(default = "default_pause_threshold_ms")]
    pub pause_threshold_ms: u64,

    /// Minimum words for a pause to close the segment.
    #[serde(default = "default_min_pause_words")]
    pub min_pause_words: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            terminal_chars: default_terminal_chars(),
            pause_threshold_ms: default_pause_threshold_ms(),
            min_pause_words: default_min_pause_words(),
        }
    }
}

fn default_terminal_chars() -> Vec<char> {
    vec!['.', ',', ';']
}

fn default_pause_threshold_ms() -> u64 {
    2000
}

fn default_min_pause_words() -> usize {
    4
}

impl DetectorConfig {
    pub fn is_terminal(&self, c: char) -> bool {
        self.terminal_chars.contains(&c)
    }

    pub fn pause_threshold(&self) -> Duration {
        Duration::from_millis(self.pause_threshold_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.terminal_chars.is_empty() {
            return Err(ConfigError::NoTerminalChars);
        }
        Ok(())
    }
}

/// The span of text written since the last boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    start: usize,
    text: String,
}

impl Segment {
    pub fn new(start: usize) -> Self {
        Self {
            start,
            text: String::new(),
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Document position just past the last character of the segment.
    pub fn end(&self) -> usize {
        self.start + self.text.chars().count()
    }

    fn contains(&self, cursor: usize) -> bool {
        (self.start..=self.end()).contains(&cursor)
    }

    fn byte_offset(&self, cursor: usize) -> usize {
        let index = cursor - self.start;
        self.text
            .char_indices()
            .nth(index)
            .map(|(offset, _)| offset)
            .unwrap_or(self.text.len())
    }

    fn insert(&mut self, cursor: usize, s: &str) -> bool {
        if !self.contains(cursor) {
            return false;
        }
        let offset = self.byte_offset(cursor);
        self.text.insert_str(offset, s);
        true
    }

    fn delete_before(&mut self, cursor: usize) -> bool {
        if cursor <= self.start || !self.contains(cursor) {
            return false;
        }
        let offset = self.byte_offset(cursor - 1);
        self.text.remove(offset);
        true
    }
}

/// Applies one edit event to the open segment.
///
/// Terminal punctuation typed without modifiers closes the segment with
/// trigger `punctuation`. Enter without modifiers closes it with trigger
/// `pause`, but only when the cursor sits at the end of the segment.
pub fn apply_event(segment: &mut Segment, event: &EditEvent, config: &DetectorConfig) -> Detection {
    let cursor = event.cursor;
    let modifiers = event.modifiers;

    match &event.kind {
        EditKind::Paste(text) | EditKind::ProgrammaticInsert(text) => {
            if segment.insert(cursor, text) {
                Detection::Ignored(IgnoreReason::Typing)
            } else {
                Detection::Ignored(IgnoreReason::OutsideSegment)
            }
        }
        EditKind::KeyPress(_) if modifiers.is_shortcut() => {
            Detection::Ignored(IgnoreReason::Modifier)
        }
        EditKind::KeyPress(Key::Backspace) => {
            segment.delete_before(cursor);
            Detection::Ignored(IgnoreReason::Typing)
        }
        EditKind::KeyPress(Key::Char(c)) => {
            let mut buf = [0u8; 4];
            if !segment.insert(cursor, c.encode_utf8(&mut buf)) {
                return Detection::Ignored(IgnoreReason::OutsideSegment);
            }
            if !config.is_terminal(*c) {
                Detection::Ignored(IgnoreReason::Typing)
            } else if modifiers.shift {
                Detection::Ignored(IgnoreReason::Modifier)
            } else {
                close_segment(segment, TriggerReason::Punctuation, config)
            }
        }
        EditKind::KeyPress(Key::Enter) => {
            if modifiers.shift {
                segment.insert(cursor, "\n");
                return Detection::Ignored(IgnoreReason::Modifier);
            }
            if cursor != segment.end() {
                return Detection::Ignored(IgnoreReason::CursorNotAtEnd);
            }
            close_segment(segment, TriggerReason::Pause, config)
        }
    }
}

/// Closes the segment and starts a new one right after it.
///
/// Pause and manual closes synthesize a period when the segment does not
/// already end in terminal punctuation.
fn close_segment(
    segment: &mut Segment,
    trigger: TriggerReason,
    config: &DetectorConfig,
) -> Detection {
    let next_start = segment.end();
    let closed = std::mem::replace(segment, Segment::new(next_start));
    let mut text = closed.text.trim().to_string();

    let body = text.trim_end_matches(|c: char| config.is_terminal(c)).trim();
    if body.is_empty() {
        return Detection::Ignored(IgnoreReason::EmptySegment);
    }

    let mut end = closed.end();
    let ends_terminal = text
        .chars()
        .last()
        .map(|c| config.is_terminal(c))
        .unwrap_or(false);
    if trigger != TriggerReason::Punctuation && !ends_terminal {
        text.push('.');
        end += 1;
        *segment = Segment::new(end);
    }

    Detection::Boundary(CandidateSentence::new(
        text,
        trigger,
        PositionRange::new(closed.start, end),
    ))
}

/// Stateful boundary detector for one editing session.
#[derive(Debug, Clone)]
pub struct BoundaryDetector {
    config: DetectorConfig,
    segment: Segment,
    last_edit: Option<DateTime<Utc>>,
}

impl BoundaryDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            segment: Segment::new(0),
            last_edit: None,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The open segment.
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Feeds one edit event.
    pub fn on_event(&mut self, event: &EditEvent) -> Detection {
        self.last_edit = Some(event.timestamp);
        let detection = apply_event(&mut self.segment, event, &self.config);

        match &detection {
            Detection::Boundary(candidate) => debug!(
                "Boundary ({}) closed: {:?}",
                candidate.trigger_reason(),
                candidate.raw_text()
            ),
            Detection::Ignored(reason) => trace!("Event ignored: {}", reason),
        }

        detection
    }

    /// Reports that the writer has been idle until `now`.
    pub fn on_idle(&mut self, now: DateTime<Utc>) -> Detection {
        let idle = self
            .last_edit
            .and_then(|last| (now - last).to_std().ok())
            .unwrap_or(Duration::ZERO);

        match pause::evaluate(
            self.segment.text(),
            idle,
            self.config.pause_threshold(),
            self.config.min_pause_words,
        ) {
            PauseVerdict::Close => {
                debug!("Idle for {}ms, closing segment", idle.as_millis());
                close_segment(&mut self.segment, TriggerReason::Pause, &self.config)
            }
            PauseVerdict::Hold(reason) => Detection::Ignored(reason),
        }
    }

    /// Closes the open segment on request.
    pub fn flush(&mut self) -> Detection {
        close_segment(&mut self.segment, TriggerReason::Manual, &self.config)
    }

    /// Drops the open segment and starts over at the top of the document.
    pub fn reset(&mut self) {
        self.segment = Segment::new(0);
        self.last_edit = None;
    }
}

impl Default for BoundaryDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
