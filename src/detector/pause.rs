//! Idle-pause heuristics.
//!
//! When the writer stops typing, the open segment may still be a finished
//! thought. These checks decide whether an idle period is long enough and
//! the segment looks complete enough to close it.

use super::IgnoreReason;
use std::time::Duration;

/// Connectives that leave a clause hanging when they end a segment.
const DANGLING_CONNECTIVES: &[&str] = &[
    "and",
    "but",
    "or",
    "nor",
    "so",
    "yet",
    "because",
    "since",
    "although",
    "though",
    "while",
    "whereas",
    "however",
    "therefore",
    "moreover",
    "furthermore",
    "meanwhile",
    "unless",
    "if",
    "then",
    "also",
];

/// Result of evaluating a segment after an idle period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseVerdict {
    Close,
    Hold(IgnoreReason),
}

/// Returns true if the last word of `text` looks finished.
///
/// A word is finished when the text ends in whitespace or punctuation, or
/// when the last word has at least two characters.
pub fn is_word_complete(text: &str) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    match text.chars().last() {
        Some(c) if c.is_whitespace() => return true,
        Some(c) if c.is_ascii_punctuation() => return true,
        _ => {}
    }

    text.split_whitespace()
        .last()
        .map(|word| word.chars().count() >= 2)
        .unwrap_or(false)
}

/// Returns true if the segment ends with a connective that expects more text.
pub fn ends_with_connective(text: &str) -> bool {
    text.split_whitespace()
        .last()
        .map(|word| {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            DANGLING_CONNECTIVES.contains(&word.as_str())
        })
        .unwrap_or(false)
}

/// Decides whether an idle segment should be closed.
pub fn evaluate(text: &str, idle: Duration, threshold: Duration, min_words: usize) -> PauseVerdict {
    if text.trim().is_empty() {
        return PauseVerdict::Hold(IgnoreReason::EmptySegment);
    }
    if idle < threshold {
        return PauseVerdict::Hold(IgnoreReason::WaitingForPause);
    }
    if text.split_whitespace().count() < min_words {
        return PauseVerdict::Hold(IgnoreReason::TooShort);
    }
    if !is_word_complete(text) {
        return PauseVerdict::Hold(IgnoreReason::IncompleteWord);
    }
    if ends_with_connective(text) {
        return PauseVerdict::Hold(IgnoreReason::DanglingConnective);
    }
    PauseVerdict::Close
}

#[cfg(test)]
mod tests {
    use super::*;

    const THRESHOLD: Duration = Duration::from_millis(2000);

    #[test]
    fn test_word_completion() {
        assert!(is_word_complete("I think this "));
        assert!(is_word_complete("I think this,"));
        assert!(is_word_complete("I think this is interes"));
        assert!(!is_word_complete("I think this is a"));
        assert!(!is_word_complete("   "));
    }

    #[test]
    fn test_connectives() {
        assert!(ends_with_connective("Prices went up and"));
        assert!(ends_with_connective("It rained, however,"));
        assert!(!ends_with_connective("Prices went up sharply"));
    }

    #[test]
    fn test_waits_for_pause() {
        let verdict = evaluate(
            "The council approved the new budget",
            Duration::from_millis(500),
            THRESHOLD,
            4,
        );
        assert_eq!(verdict, PauseVerdict::Hold(IgnoreReason::WaitingForPause));
    }

    #[test]
    fn test_closes_after_pause() {
        let verdict = evaluate(
            "The council approved the new budget",
            Duration::from_millis(3000),
            THRESHOLD,
            4,
        );
        assert_eq!(verdict, PauseVerdict::Close);
    }

    #[test]
    fn test_holds_short_or_dangling_segments() {
        let idle = Duration::from_millis(3000);
        assert_eq!(
            evaluate("Crime rose", idle, THRESHOLD, 4),
            PauseVerdict::Hold(IgnoreReason::TooShort)
        );
        assert_eq!(
            evaluate("Crime rose in the city because", idle, THRESHOLD, 4),
            PauseVerdict::Hold(IgnoreReason::DanglingConnective)
        );
        assert_eq!(
            evaluate("Crime rose in the city a", idle, THRESHOLD, 4),
            PauseVerdict::Hold(IgnoreReason::IncompleteWord)
        );
    }
}
