//! Editing session pipeline.
//!
//! A [`Session`] wires the stages together for one document: edit events go
//! through the boundary detector, candidates through the deduplicator, and
//! admitted sentences through the orchestrator. Every aggregated result is
//! handed to the session's sink and kept for the session report.

use crate::dedup::{AdmittedSentence, Deduplicator};
use crate::detector::{BoundaryDetector, Detection, DetectorConfig, IgnoreReason};
use crate::error::PipelineError;
use crate::models::{
    AggregatedResult, AnalysisRequest, CandidateSentence, EditEvent, Key, OverallStatus,
    SentenceContext,
};
use crate::orchestrator::Orchestrator;
use crate::registry::KindSelection;
use crate::report::SessionReport;
use crate::sink::ResultSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Number of earlier sentences sent as context.
pub const DEFAULT_CONTEXT_WINDOW: usize = 3;

/// Maps text to the key presses that type it. Newlines become Enter.
pub fn keys_for_text(text: &str) -> impl Iterator<Item = Key> + '_ {
    text.chars().filter(|c| *c != '\r').map(|c| match c {
        '\n' => Key::Enter,
        other => Key::Char(other),
    })
}

/// Per-session options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub selection: KindSelection,
    pub target_audience: Option<String>,
    pub narrative_goal: Option<String>,
    pub context_window: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            selection: KindSelection::default(),
            target_audience: None,
            narrative_goal: None,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

/// What one input did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    /// No boundary; nothing was analyzed.
    Ignored(IgnoreReason),
    /// The sentence had already been analyzed this session.
    Duplicate { key: String },
    /// The sentence was analyzed.
    Analyzed(AggregatedResult),
}

impl SessionStep {
    pub fn result(&self) -> Option<&AggregatedResult> {
        match self {
            SessionStep::Analyzed(result) => Some(result),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<AggregatedResult> {
        match self {
            SessionStep::Analyzed(result) => Some(result),
            _ => None,
        }
    }
}

/// Running counters for a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub events: usize,
    pub candidates: usize,
    pub admitted: usize,
    pub duplicates: usize,
    pub complete: usize,
    pub partial: usize,
    pub aborted: usize,
    pub sink_errors: usize,
    pub resets: usize,
}

impl SessionStats {
    fn record_status(&mut self, status: OverallStatus) {
        match status {
            OverallStatus::Complete => self.complete += 1,
            OverallStatus::Partial => self.partial += 1,
            OverallStatus::Aborted => self.aborted += 1,
        }
    }
}

/// One editing session.
pub struct Session {
    id: Uuid,
    started_at: DateTime<Utc>,
    detector: BoundaryDetector,
    dedup: Deduplicator,
    orchestrator: Orchestrator,
    sink: Arc<dyn ResultSink>,
    options: SessionOptions,
    history: Vec<String>,
    results: Vec<AggregatedResult>,
    stats: SessionStats,
}

impl Session {
    pub fn new(
        detector_config: DetectorConfig,
        orchestrator: Orchestrator,
        sink: Arc<dyn ResultSink>,
        options: SessionOptions,
    ) -> Self {
        let dedup = Deduplicator::default().with_terminals(&detector_config.terminal_chars);
        let id = Uuid::new_v4();
        info!("Starting session {}", id);

        Self {
            id,
            started_at: Utc::now(),
            detector: BoundaryDetector::new(detector_config),
            dedup,
            orchestrator,
            sink,
            options,
            history: Vec::new(),
            results: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn detector(&self) -> &BoundaryDetector {
        &self.detector
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Admitted sentences in order, as they were keyed.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn results(&self) -> &[AggregatedResult] {
        &self.results
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Document position where the next typed character lands.
    pub fn cursor(&self) -> usize {
        self.detector.segment().end()
    }

    /// Feeds one edit event through the pipeline.
    pub async fn handle_event(&mut self, event: &EditEvent) -> SessionStep {
        self.stats.events += 1;
        let detection = self.detector.on_event(event);
        self.process(detection).await
    }

    /// Reports that the writer has been idle until `now`.
    pub async fn handle_idle(&mut self, now: DateTime<Utc>) -> SessionStep {
        let detection = self.detector.on_idle(now);
        self.process(detection).await
    }

    /// Closes and analyzes the open segment on request.
    pub async fn flush(&mut self) -> SessionStep {
        let detection = self.detector.flush();
        self.process(detection).await
    }

    /// Types `text` at the end of the document, then flushes what is left.
    ///
    /// `on_step` sees every step, in order.
    pub async fn replay(&mut self, text: &str, mut on_step: impl FnMut(&SessionStep)) {
        for key in keys_for_text(text) {
            let event = EditEvent::key(key, self.cursor());
            let step = self.handle_event(&event).await;
            on_step(&step);
        }
        let step = self.flush().await;
        on_step(&step);
    }

    /// Forgets processed sentences, history and the open segment.
    ///
    /// Results already produced stay in the session report.
    pub fn reset(&mut self) {
        info!("Resetting session {}", self.id);
        self.dedup.reset();
        self.detector.reset();
        self.history.clear();
        self.stats.resets += 1;
    }

    /// Builds the report for everything analyzed so far.
    pub fn report(&self) -> SessionReport {
        SessionReport::new(
            self.id,
            self.orchestrator.registry().profile(),
            self.started_at,
            self.stats.clone(),
            self.results.clone(),
        )
    }

    async fn process(&mut self, detection: Detection) -> SessionStep {
        match self.admit(detection) {
            Ok(admitted) => SessionStep::Analyzed(self.analyze(admitted).await),
            Err(PipelineError::BoundaryIgnored(reason)) => SessionStep::Ignored(reason),
            Err(PipelineError::DuplicateRejected { key }) => SessionStep::Duplicate { key },
            Err(other) => {
                // Detection and deduplication produce no other errors.
                warn!("Unexpected admission error: {}", other);
                SessionStep::Ignored(IgnoreReason::EmptySegment)
            }
        }
    }

    fn admit(&mut self, detection: Detection) -> Result<AdmittedSentence, PipelineError> {
        let candidate = detection.into_result()?;
        self.stats.candidates += 1;

        match self.dedup.admit(candidate) {
            Ok(admitted) => {
                self.stats.admitted += 1;
                Ok(admitted)
            }
            Err(e) => {
                if let PipelineError::DuplicateRejected { .. } = e {
                    self.stats.duplicates += 1;
                }
                Err(e)
            }
        }
    }

    async fn analyze(&mut self, admitted: AdmittedSentence) -> AggregatedResult {
        let context = self.context_for(&admitted);
        self.history.push(admitted.finalized_text.clone());

        let sentence = CandidateSentence::new(
            admitted.finalized_text,
            admitted.candidate.trigger_reason(),
            admitted.candidate.source_range(),
        );
        let request = AnalysisRequest::new(sentence, context);

        debug!("Analyzing sentence {}", self.history.len());
        let result = self
            .orchestrator
            .run_selection(request, &self.options.selection)
            .await;

        self.stats.record_status(result.overall_status);
        if let Err(e) = self.sink.deliver(&result) {
            self.stats.sink_errors += 1;
            warn!("Failed to deliver result: {:#}", e);
        }
        self.results.push(result.clone());

        result
    }

    fn context_for(&self, admitted: &AdmittedSentence) -> SentenceContext {
        let window = self.options.context_window;
        let preceding = self.history[self.history.len().saturating_sub(window)..].to_vec();

        let mut parts: Vec<&str> = self.history.iter().map(String::as_str).collect();
        parts.push(&admitted.finalized_text);
        let open = self.detector.segment().text().trim();
        if !open.is_empty() {
            parts.push(open);
        }

        SentenceContext {
            full_text: parts.join(" "),
            preceding_sentences: preceding,
            target_audience: self.options.target_audience.clone(),
            narrative_goal: self.options.narrative_goal.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ScriptedClient, ScriptedResponse};
    use crate::registry::{AnalysisKind, AnalysisPreset, AnalysisRegistry, Profile};
    use crate::sink::MemorySink;

    fn session_with(client: Arc<ScriptedClient>, sink: Arc<MemorySink>) -> Session {
        let registry = Arc::new(AnalysisRegistry::preset(Profile::Testing));
        let orchestrator = Orchestrator::new(registry, client);
        Session::new(
            DetectorConfig::default(),
            orchestrator,
            sink,
            SessionOptions {
                target_audience: Some("residents".to_string()),
                ..SessionOptions::default()
            },
        )
    }

    async fn type_text(session: &mut Session, text: &str) -> Vec<SessionStep> {
        let mut steps = Vec::new();
        for c in text.chars() {
            let event = EditEvent::char(c, session.cursor());
            steps.push(session.handle_event(&event).await);
        }
        steps
    }

    #[tokio::test]
    async fn test_typed_sentence_is_analyzed_once() {
        let client = Arc::new(ScriptedClient::new());
        let sink = Arc::new(MemorySink::new());
        let mut session = session_with(Arc::clone(&client), Arc::clone(&sink));

        let steps = type_text(&mut session, "Crime is rising.").await;
        let analyzed: Vec<_> = steps.iter().filter_map(SessionStep::result).collect();

        assert_eq!(analyzed.len(), 1);
        assert_eq!(analyzed[0].sentence.raw_text(), "Crime is rising.");
        assert_eq!(analyzed[0].per_kind_outcome.len(), 2);
        assert_eq!(sink.len(), 1);
        assert_eq!(session.stats().admitted, 1);
    }

    #[tokio::test]
    async fn test_duplicate_sentence_is_rejected() {
        let client = Arc::new(ScriptedClient::new());
        let sink = Arc::new(MemorySink::new());
        let mut session = session_with(Arc::clone(&client), sink);

        type_text(&mut session, "Crime is rising.").await;
        let steps = type_text(&mut session, " crime   is rising.").await;

        assert!(matches!(steps.last(), Some(SessionStep::Duplicate { .. })));
        assert_eq!(session.stats().duplicates, 1);
        assert_eq!(client.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_context_carries_history() {
        let client = Arc::new(ScriptedClient::new());
        let sink = Arc::new(MemorySink::new());
        let mut session = session_with(client, Arc::clone(&sink));

        for sentence in ["One two.", " Three four.", " Five six.", " Seven eight.", " Nine ten."] {
            type_text(&mut session, sentence).await;
        }

        let result = sink.results().pop().unwrap();
        assert_eq!(result.sentence.raw_text(), "Nine ten.");
        assert_eq!(session.history().len(), 5);

        let context = session.context_for(&session.dedup_probe("Eleven."));
        assert_eq!(
            context.preceding_sentences,
            vec!["Five six.", "Seven eight.", "Nine ten."]
        );
        assert!(context.full_text.starts_with("One two. Three four."));
        assert_eq!(context.target_audience.as_deref(), Some("residents"));
    }

    #[test]
    fn test_keys_for_text() {
        let keys: Vec<Key> = keys_for_text("Hi.\r\n").collect();
        assert_eq!(
            keys,
            vec![Key::Char('H'), Key::Char('i'), Key::Char('.'), Key::Enter]
        );
    }

    #[tokio::test]
    async fn test_replay_paragraphs() {
        let client = Arc::new(ScriptedClient::new());
        let sink = Arc::new(MemorySink::new());
        let mut session = session_with(client, Arc::clone(&sink));

        let mut analyzed = 0;
        session
            .replay("Hello world\nThe council met today; it voted", |step| {
                if step.result().is_some() {
                    analyzed += 1;
                }
            })
            .await;

        let texts: Vec<String> = sink
            .results()
            .iter()
            .map(|r| r.sentence.raw_text().to_string())
            .collect();
        assert_eq!(analyzed, 3);
        assert_eq!(
            texts,
            vec!["Hello world.", "The council met today;", "it voted."]
        );
    }

    #[tokio::test]
    async fn test_flush_and_reset() {
        let client = Arc::new(ScriptedClient::new());
        let sink = Arc::new(MemorySink::new());
        let mut session = session_with(client, sink);

        type_text(&mut session, "Hello world").await;
        let step = session.flush().await;
        let result = step.into_result().unwrap();
        assert_eq!(result.sentence.raw_text(), "Hello world.");

        assert!(matches!(session.flush().await, SessionStep::Ignored(_)));

        session.reset();
        type_text(&mut session, "Hello world.").await;
        assert_eq!(session.stats().admitted, 2);
        assert_eq!(session.stats().resets, 1);
        assert_eq!(session.history(), ["Hello world."]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aborted_results_are_counted() {
        let client = Arc::new(
            ScriptedClient::new().script(AnalysisKind::Topic, vec![ScriptedResponse::Hang]),
        );
        let registry = AnalysisRegistry::preset(Profile::Testing).with_quality_gate(
            crate::registry::QualityGate {
                min_confidence: 0.6,
                max_errors: 0,
            },
        );
        let orchestrator = Orchestrator::new(Arc::new(registry), client);
        let mut session = Session::new(
            DetectorConfig::default(),
            orchestrator,
            Arc::new(MemorySink::new()),
            SessionOptions {
                selection: KindSelection::preset(AnalysisPreset::Profile),
                ..SessionOptions::default()
            },
        );

        type_text(&mut session, "Crime is rising in Westminster.").await;

        assert_eq!(session.stats().aborted, 1);
        let report = session.report();
        assert_eq!(report.results.len(), 1);
    }

    impl Session {
        fn dedup_probe(&self, text: &str) -> AdmittedSentence {
            AdmittedSentence {
                candidate: CandidateSentence::new(
                    text,
                    crate::models::TriggerReason::Manual,
                    crate::models::PositionRange::new(0, text.len()),
                ),
                finalized_text: text.to_string(),
                key: self.dedup.key_for(text),
            }
        }
    }
}
