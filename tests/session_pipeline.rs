use chrono::{Duration as ChronoDuration, Utc};
use narralyze::client::{CallError, ScriptedClient, ScriptedResponse};
use narralyze::detector::{DetectorConfig, IgnoreReason};
use narralyze::models::{AnalysisOutcome, EditEvent, Modifiers, TriggerReason};
use narralyze::registry::{AnalysisPreset, KindSelection, QualityGate, TimeoutPolicy};
use narralyze::report::{generate_json_report, generate_markdown_report};
use narralyze::session::{Session, SessionOptions, SessionStep};
use narralyze::sink::{JsonLinesSink, MemorySink};
use narralyze::{AnalysisKind, AnalysisRegistry, Orchestrator, OverallStatus, Profile};
use std::sync::Arc;
use tempfile::TempDir;

fn registry(max_errors: usize) -> AnalysisRegistry {
    AnalysisRegistry::preset(Profile::Testing)
        .with_timeouts(TimeoutPolicy::from_millis(5_000, 10_000))
        .with_quality_gate(QualityGate {
            min_confidence: 0.6,
            max_errors,
        })
}

fn session(client: Arc<ScriptedClient>, sink: Arc<MemorySink>, max_errors: usize) -> Session {
    let orchestrator = Orchestrator::new(Arc::new(registry(max_errors)), client);
    Session::new(
        DetectorConfig::default(),
        orchestrator,
        sink,
        SessionOptions::default(),
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

#[tokio::test(start_paused = true)]
async fn test_partial_result_when_topic_times_out() {
    let client = Arc::new(
        ScriptedClient::new()
            .script(AnalysisKind::Sentiment, vec![ScriptedResponse::ok(0.9)])
            .script(AnalysisKind::Topic, vec![ScriptedResponse::Hang]),
    );
    let sink = Arc::new(MemorySink::new());
    let mut session = session(client, Arc::clone(&sink), 2);

    type_text(&mut session, "Crime is rising in Westminster").await;
    let step = session.flush().await;

    let result = step.into_result().expect("sentence should be analyzed");
    assert_eq!(result.sentence.raw_text(), "Crime is rising in Westminster.");
    assert_eq!(result.overall_status, OverallStatus::Partial);
    assert!(result.outcome(AnalysisKind::Sentiment).unwrap().is_success());
    assert!(matches!(
        result.outcome(AnalysisKind::Topic),
        Some(AnalysisOutcome::Timeout { .. })
    ));
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_aborted_result_with_zero_error_budget() {
    let client = Arc::new(
        ScriptedClient::new()
            .script(AnalysisKind::Sentiment, vec![ScriptedResponse::ok(0.9)])
            .script(AnalysisKind::Topic, vec![ScriptedResponse::Hang]),
    );
    let sink = Arc::new(MemorySink::new());
    let mut session = session(client, Arc::clone(&sink), 0);

    type_text(&mut session, "Crime is rising in Westminster").await;
    let result = session.flush().await.into_result().unwrap();

    assert_eq!(result.overall_status, OverallStatus::Aborted);
    assert!(result.ensure_reliable().is_err());
    assert!(session.report().has_aborted());
}

#[tokio::test]
async fn test_enter_at_segment_end_synthesizes_period() {
    let client = Arc::new(ScriptedClient::new());
    let sink = Arc::new(MemorySink::new());
    let mut session = session(Arc::clone(&client), sink, 2);

    type_text(&mut session, "Hello world").await;
    let step = session
        .handle_event(&EditEvent::enter(session.cursor()))
        .await;

    let result = step.into_result().unwrap();
    assert_eq!(result.sentence.raw_text(), "Hello world.");
    assert_eq!(result.sentence.trigger_reason(), TriggerReason::Pause);
    assert_eq!(client.sentences()[0], "Hello world.");
}

#[tokio::test]
async fn test_pause_then_punctuation_is_analyzed_once() {
    let client = Arc::new(ScriptedClient::new());
    let sink = Arc::new(MemorySink::new());
    let mut session = session(Arc::clone(&client), Arc::clone(&sink), 2);

    let start = Utc::now();
    let text = "The council approved the budget";
    for (i, c) in text.chars().enumerate() {
        let typed_at = start + ChronoDuration::milliseconds(i as i64);
        let event = EditEvent::char(c, session.cursor()).at(typed_at);
        session.handle_event(&event).await;
    }

    let early = session
        .handle_idle(start + ChronoDuration::milliseconds(500))
        .await;
    assert_eq!(early, SessionStep::Ignored(IgnoreReason::WaitingForPause));

    let idle = session.handle_idle(start + ChronoDuration::seconds(5)).await;
    assert!(matches!(idle, SessionStep::Analyzed(_)));

    // The writer adds the period the pause already implied.
    let steps = type_text(&mut session, " the council approved the budget.").await;
    assert!(matches!(steps.last(), Some(SessionStep::Duplicate { .. })));

    assert_eq!(sink.len(), 1);
    assert_eq!(session.stats().duplicates, 1);
}

#[tokio::test]
async fn test_shift_and_shortcuts_do_not_trigger() {
    let client = Arc::new(ScriptedClient::new());
    let sink = Arc::new(MemorySink::new());
    let mut session = session(client, Arc::clone(&sink), 2);

    type_text(&mut session, "Wait").await;
    let shifted = session
        .handle_event(&EditEvent::char('.', session.cursor()).with_shift())
        .await;
    assert_eq!(shifted, SessionStep::Ignored(IgnoreReason::Modifier));

    let ctrl = Modifiers {
        ctrl: true,
        ..Modifiers::NONE
    };
    let shortcut = session
        .handle_event(&EditEvent::char(';', session.cursor()).with_modifiers(ctrl))
        .await;
    assert_eq!(shortcut, SessionStep::Ignored(IgnoreReason::Modifier));

    let pasted = session
        .handle_event(&EditEvent::paste(" and see.", session.cursor()))
        .await;
    assert_eq!(pasted, SessionStep::Ignored(IgnoreReason::Typing));
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_report_and_results_file() {
    let dir = TempDir::new().unwrap();
    let results_path = dir.path().join("results.jsonl");

    let client = Arc::new(ScriptedClient::new().script(
        AnalysisKind::Topic,
        vec![
            ScriptedResponse::fail(CallError::Status {
                status: 503,
                body: "busy".to_string(),
            }),
            ScriptedResponse::ok(0.8),
        ],
    ));
    let orchestrator = Orchestrator::new(Arc::new(registry(2)), client);
    let sink = Arc::new(JsonLinesSink::open(&results_path).unwrap());
    let mut session = Session::new(
        DetectorConfig::default(),
        orchestrator,
        sink,
        SessionOptions {
            selection: KindSelection::preset(AnalysisPreset::Quick),
            ..SessionOptions::default()
        },
    );

    session
        .replay("Rents are rising. Wages are not.\nSomething must change", |_| {})
        .await;

    let report = session.report();
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.complete, 3);
    assert_eq!(report.results[0].per_kind_outcome.len(), 4);

    let markdown = generate_markdown_report(&report);
    assert!(markdown.contains("Something must change."));
    let json = generate_json_report(&report).unwrap();
    assert!(json.contains("\"complete\": 3"));

    let lines = std::fs::read_to_string(&results_path).unwrap();
    assert_eq!(lines.lines().count(), 3);
}
