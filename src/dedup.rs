//! Sentence deduplication.
//!
//! A candidate sentence is reduced to a normalized key before it may be
//! analyzed. Keys are remembered in a per-session [`ProcessedSet`], so the
//! same content is admitted at most once no matter how often, or by which
//! trigger, it is detected.
//!
//! # Normalization
//!
//! 1. Append a period if the text lacks terminal punctuation
//! 2. Convert to lowercase
//! 3. Strip the trailing run of terminal punctuation
//! 4. Collapse whitespace runs to single spaces and trim

use crate::detector::IgnoreReason;
use crate::error::PipelineError;
use crate::models::CandidateSentence;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Terminal marks recognized when keying, in addition to the detector's set.
pub const DEFAULT_KEY_TERMINALS: &[char] = &['.', ',', ';', '!', '?'];

/// Canonical form of a sentence, used only for set membership.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NormalizedKey({:?})", self.0)
    }
}

/// Returns the text as it will be keyed: trimmed, and ending in exactly one
/// terminal mark when it had none.
pub fn finalize_text(raw: &str, terminals: &[char]) -> String {
    let mut text = raw.trim().to_string();
    let ends_terminal = text
        .chars()
        .last()
        .map(|c| terminals.contains(&c))
        .unwrap_or(false);
    if !text.is_empty() && !ends_terminal {
        text.push('.');
    }
    text
}

/// Normalizes finalized text into a key.
pub fn normalize(text: &str, terminals: &[char]) -> NormalizedKey {
    let lowered = text.to_lowercase();
    let stripped = lowered
        .trim_end()
        .trim_end_matches(|c: char| terminals.contains(&c));
    NormalizedKey(stripped.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Keys processed during one editing session.
///
/// Grows monotonically until [`ProcessedSet::clear`] is called on an
/// explicit session reset. Check-and-insert is atomic.
#[derive(Debug, Default)]
pub struct ProcessedSet {
    keys: Mutex<HashSet<NormalizedKey>>,
}

impl ProcessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the key, returning false if it was already present.
    pub fn insert_if_absent(&self, key: &NormalizedKey) -> bool {
        // A poisoned set still holds whole keys; keep using it.
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if keys.contains(key) {
            false
        } else {
            keys.insert(key.clone());
            true
        }
    }

    pub fn contains(&self, key: &NormalizedKey) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A candidate that passed deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittedSentence {
    pub candidate: CandidateSentence,
    pub finalized_text: String,
    pub key: NormalizedKey,
}

/// Admits each distinct sentence exactly once per session.
///
/// Clones share the same [`ProcessedSet`].
#[derive(Debug, Clone)]
pub struct Deduplicator {
    processed: Arc<ProcessedSet>,
    terminals: Vec<char>,
}

impl Deduplicator {
    pub fn new(processed: Arc<ProcessedSet>) -> Self {
        Self {
            processed,
            terminals: DEFAULT_KEY_TERMINALS.to_vec(),
        }
    }

    /// Adds terminal marks (typically the detector's set) to the keying set.
    pub fn with_terminals(mut self, terminals: &[char]) -> Self {
        for c in terminals {
            if !self.terminals.contains(c) {
                self.terminals.push(*c);
            }
        }
        self
    }

    pub fn processed(&self) -> &Arc<ProcessedSet> {
        &self.processed
    }

    /// Computes the key a raw text would be admitted under.
    pub fn key_for(&self, raw: &str) -> NormalizedKey {
        normalize(&finalize_text(raw, &self.terminals), &self.terminals)
    }

    /// Admits the candidate if its key has not been processed yet.
    pub fn admit(&self, candidate: CandidateSentence) -> Result<AdmittedSentence, PipelineError> {
        let finalized_text = finalize_text(candidate.raw_text(), &self.terminals);
        let key = normalize(&finalized_text, &self.terminals);

        if key.is_empty() {
            return Err(PipelineError::BoundaryIgnored(IgnoreReason::EmptySegment));
        }

        if !self.processed.insert_if_absent(&key) {
            debug!("Duplicate sentence rejected: {:?}", key);
            return Err(PipelineError::DuplicateRejected {
                key: key.as_str().to_string(),
            });
        }

        debug!("Sentence admitted: {:?}", key);
        Ok(AdmittedSentence {
            candidate,
            finalized_text,
            key,
        })
    }

    /// Forgets every processed key.
    pub fn reset(&self) {
        self.processed.clear();
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(Arc::new(ProcessedSet::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PositionRange, TriggerReason};

    fn candidate(text: &str, trigger: TriggerReason) -> CandidateSentence {
        CandidateSentence::new(text, trigger, PositionRange::new(0, text.chars().count()))
    }

    #[test]
    fn test_normalize() {
        let key = normalize("  I   am    EXCITED...  ", DEFAULT_KEY_TERMINALS);
        assert_eq!(key.as_str(), "i am excited");

        let key = normalize("Wait, what?!", DEFAULT_KEY_TERMINALS);
        assert_eq!(key.as_str(), "wait, what");
    }

    #[test]
    fn test_finalize_appends_exactly_one_mark() {
        for raw in ["I am excited", "  I am excited  ", "Numbers like 3"] {
            let finalized = finalize_text(raw, DEFAULT_KEY_TERMINALS);
            let trailing = finalized
                .chars()
                .rev()
                .take_while(|c| DEFAULT_KEY_TERMINALS.contains(c))
                .count();
            assert_eq!(trailing, 1, "{:?}", finalized);
        }
        assert_eq!(finalize_text("Done;", DEFAULT_KEY_TERMINALS), "Done;");
        assert_eq!(finalize_text("   ", DEFAULT_KEY_TERMINALS), "");
    }

    #[test]
    fn test_whitespace_and_punctuation_variants_collapse() {
        let dedup = Deduplicator::default();

        assert!(dedup
            .admit(candidate("I am excited", TriggerReason::Pause))
            .is_ok());
        assert!(matches!(
            dedup.admit(candidate("I   am    excited.", TriggerReason::Punctuation)),
            Err(PipelineError::DuplicateRejected { .. })
        ));
        assert_eq!(dedup.processed().len(), 1);
    }

    #[test]
    fn test_same_text_twice_admits_then_rejects() {
        let dedup = Deduplicator::default();
        let first = dedup.admit(candidate("Crime is rising.", TriggerReason::Punctuation));
        let second = dedup.admit(candidate("Crime is rising.", TriggerReason::Punctuation));

        let admitted = first.unwrap();
        assert_eq!(admitted.finalized_text, "Crime is rising.");
        assert_eq!(admitted.key.as_str(), "crime is rising");
        assert_eq!(
            second,
            Err(PipelineError::DuplicateRejected {
                key: "crime is rising".to_string()
            })
        );
    }

    #[test]
    fn test_punctuation_only_is_not_admitted() {
        let dedup = Deduplicator::default();
        assert_eq!(
            dedup.admit(candidate(";", TriggerReason::Punctuation)),
            Err(PipelineError::BoundaryIgnored(IgnoreReason::EmptySegment))
        );
        assert!(dedup.processed().is_empty());
    }

    #[test]
    fn test_reset_clears_session() {
        let dedup = Deduplicator::default();
        dedup.admit(candidate("Hello.", TriggerReason::Manual)).unwrap();
        dedup.reset();
        assert!(dedup.admit(candidate("Hello.", TriggerReason::Manual)).is_ok());
    }

    #[test]
    fn test_clones_share_the_session_set() {
        let dedup = Deduplicator::default().with_terminals(&[':']);
        let other = dedup.clone();

        dedup.admit(candidate("Note:", TriggerReason::Punctuation)).unwrap();
        assert!(other.admit(candidate("note", TriggerReason::Pause)).is_err());
        assert!(other.processed().contains(&dedup.key_for("NOTE")));
    }

    #[test]
    fn test_concurrent_admission_is_exactly_once() {
        let dedup = Deduplicator::default();

        let admitted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let dedup = dedup.clone();
                    scope.spawn(move || {
                        let text = if i % 2 == 0 { "Same words" } else { "same   WORDS." };
                        dedup.admit(candidate(text, TriggerReason::Pause)).is_ok() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(admitted, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_admission_across_tasks() {
        let dedup = Deduplicator::default();

        let tasks = (0..32).map(|_| {
            let dedup = dedup.clone();
            tokio::spawn(async move {
                dedup
                    .admit(candidate("Rents are rising", TriggerReason::Pause))
                    .is_ok()
            })
        });

        let results = futures::future::join_all(tasks).await;
        let admitted = results.into_iter().filter(|r| matches!(r, Ok(true))).count();
        assert_eq!(admitted, 1);
    }
}
