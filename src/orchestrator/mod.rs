//! Concurrent analysis fan-out.
//!
//! The orchestrator runs every enabled analysis kind for one admitted
//! sentence as its own task, bounds each call and the whole fan-out, and
//! folds the outcomes into a single [`AggregatedResult`].
//!
//! Per-kind failures never escape: a kind that errors, times out, or loses
//! its task still gets exactly one outcome entry.

pub mod aggregate;

use crate::client::{AnalysisClient, CallError};
use crate::models::{
    AggregatedResult, AnalysisOutcome, AnalysisPayload, AnalysisRequest, FailureDetail,
    FailureKind, OverallStatus,
};
use crate::registry::{AnalysisKind, AnalysisRegistry, KindSelection, RetryPolicy};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use aggregate::{apply_confidence_gate, classify_status, generate_summary_text};

/// Everything one per-kind task needs.
struct KindCall {
    kind: AnalysisKind,
    endpoint: String,
    per_call: Duration,
    retry: RetryPolicy,
    attempts: Arc<AtomicU32>,
}

/// Runs enabled analyses concurrently and aggregates their outcomes.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<AnalysisRegistry>,
    client: Arc<dyn AnalysisClient>,
}

impl Orchestrator {
    pub fn new(registry: Arc<AnalysisRegistry>, client: Arc<dyn AnalysisClient>) -> Self {
        Self { registry, client }
    }

    pub fn registry(&self) -> &AnalysisRegistry {
        &self.registry
    }

    /// Runs the kinds a selection resolves to.
    pub async fn run_selection(
        &self,
        request: AnalysisRequest,
        selection: &KindSelection,
    ) -> AggregatedResult {
        let kinds = selection.resolve(&self.registry);
        self.run(request, &kinds).await
    }

    /// Runs every kind in `kinds` against the shared request.
    ///
    /// Always returns one outcome per kind. The result is `Aborted` when more
    /// kinds failed than the registry's error budget allows.
    pub async fn run(
        &self,
        request: AnalysisRequest,
        kinds: &BTreeSet<AnalysisKind>,
    ) -> AggregatedResult {
        let started_at = Utc::now();
        let started = Instant::now();
        let timeouts = self.registry.timeouts();
        let quality = self.registry.quality();
        let deadline = started + timeouts.total;

        debug!(
            "Fanning out {} analyses for {:?}",
            kinds.len(),
            request.sentence.raw_text()
        );

        let request = Arc::new(request);
        let mut attempts: BTreeMap<AnalysisKind, Arc<AtomicU32>> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for kind in kinds {
            let call = KindCall {
                kind: *kind,
                endpoint: self.registry.endpoint_url(*kind),
                per_call: timeouts.per_call,
                retry: self.registry.retry(),
                attempts: Arc::new(AtomicU32::new(0)),
            };
            attempts.insert(*kind, Arc::clone(&call.attempts));

            let client = Arc::clone(&self.client);
            let request = Arc::clone(&request);
            tasks.spawn(async move {
                let kind = call.kind;
                (kind, run_kind(client, request, call).await)
            });
        }

        let mut outcomes: BTreeMap<AnalysisKind, AnalysisOutcome> = BTreeMap::new();
        let mut deadline_hit = false;

        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((kind, outcome)))) => {
                    outcomes.insert(kind, apply_confidence_gate(outcome, quality.min_confidence));
                }
                Ok(Some(Err(e))) => {
                    warn!("Analysis task ended without an outcome: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    deadline_hit = true;
                    tasks.abort_all();
                    break;
                }
            }
        }

        if deadline_hit {
            warn!(
                "Total timeout of {}ms reached with {} analyses outstanding",
                timeouts.total.as_millis(),
                kinds.len() - outcomes.len()
            );
        }

        for kind in kinds {
            if outcomes.contains_key(kind) {
                continue;
            }
            let attempts_made = attempts
                .get(kind)
                .map(|a| a.load(Ordering::SeqCst))
                .unwrap_or(0);

            let outcome = if deadline_hit {
                AnalysisOutcome::Timeout {
                    elapsed_ms: millis(started.elapsed()),
                    attempts: attempts_made,
                }
            } else {
                AnalysisOutcome::Failure(FailureDetail {
                    kind: FailureKind::Lost,
                    message: "analysis task ended without reporting".to_string(),
                    attempts: attempts_made,
                    payload: None,
                })
            };
            outcomes.insert(*kind, outcome);
        }

        for (kind, outcome) in &outcomes {
            if !outcome.is_success() {
                warn!("{} analysis: {}", kind, outcome.label());
            }
        }

        let overall_status = classify_status(&outcomes, quality.max_errors);
        let result = AggregatedResult {
            sentence: request.sentence.clone(),
            per_kind_outcome: outcomes,
            overall_status,
            max_errors: quality.max_errors,
            started_at,
            duration_ms: millis(started.elapsed()),
        };

        if overall_status == OverallStatus::Aborted {
            warn!(
                "Error budget exceeded: {} of {} analyses failed (max {})",
                result.error_count(),
                result.per_kind_outcome.len(),
                quality.max_errors
            );
        }
        info!("{}", generate_summary_text(&result));

        result
    }
}

/// Runs one kind under its per-call bound.
async fn run_kind(
    client: Arc<dyn AnalysisClient>,
    request: Arc<AnalysisRequest>,
    call: KindCall,
) -> AnalysisOutcome {
    let started = Instant::now();

    // An expired budget never makes a call.
    if call.per_call.is_zero() {
        return AnalysisOutcome::Timeout {
            elapsed_ms: 0,
            attempts: 0,
        };
    }

    let result = tokio::time::timeout(
        call.per_call,
        call_with_retry(client.as_ref(), &request, &call),
    )
    .await;
    let attempts = call.attempts.load(Ordering::SeqCst);

    match result {
        Ok(Ok(payload)) => AnalysisOutcome::Success {
            payload,
            latency_ms: millis(started.elapsed()),
            attempts,
        },
        Ok(Err(e)) => AnalysisOutcome::Failure(FailureDetail {
            kind: FailureKind::Remote,
            message: e.to_string(),
            attempts,
            payload: None,
        }),
        Err(_) => AnalysisOutcome::Timeout {
            elapsed_ms: millis(started.elapsed()),
            attempts,
        },
    }
}

/// Calls the endpoint, retrying transient errors with a fixed delay.
async fn call_with_retry(
    client: &dyn AnalysisClient,
    request: &AnalysisRequest,
    call: &KindCall,
) -> Result<AnalysisPayload, CallError> {
    loop {
        let attempt = call.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match client.analyze(call.kind, &call.endpoint, request).await {
            Ok(payload) => return Ok(payload),
            Err(e) if e.is_transient() && attempt < call.retry.max_attempts => {
                debug!(
                    "{} attempt {}/{} failed: {}, retrying in {}ms",
                    call.kind,
                    attempt,
                    call.retry.max_attempts,
                    e,
                    call.retry.delay.as_millis()
                );
                tokio::time::sleep(call.retry.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
