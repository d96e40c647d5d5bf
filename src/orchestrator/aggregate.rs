//! Outcome aggregation and statistics.
//!
//! Helpers that turn raw per-kind outcomes into an aggregated verdict, and
//! that summarize results for logs and reports.

use crate::models::{AggregatedResult, AnalysisOutcome, FailureDetail, FailureKind, OverallStatus};
use crate::registry::AnalysisKind;
use std::collections::{BTreeMap, HashMap};

/// Downgrades a success whose confidence is under the gate.
///
/// The payload is kept on the resulting failure.
pub fn apply_confidence_gate(outcome: AnalysisOutcome, min_confidence: f64) -> AnalysisOutcome {
    match outcome {
        AnalysisOutcome::Success {
            payload, attempts, ..
        } if payload.confidence < min_confidence => AnalysisOutcome::Failure(FailureDetail {
            kind: FailureKind::LowConfidence,
            message: format!(
                "confidence {:.2} below minimum {:.2}",
                payload.confidence, min_confidence
            ),
            attempts,
            payload: Some(payload),
        }),
        other => other,
    }
}

/// Computes the overall status from per-kind outcomes and the error budget.
pub fn classify_status(
    outcomes: &BTreeMap<AnalysisKind, AnalysisOutcome>,
    max_errors: usize,
) -> OverallStatus {
    let failed = outcomes.values().filter(|o| !o.is_success()).count();

    if failed > max_errors {
        OverallStatus::Aborted
    } else if failed == 0 {
        OverallStatus::Complete
    } else {
        OverallStatus::Partial
    }
}

/// Count of results per overall status.
pub fn count_by_status(results: &[AggregatedResult]) -> HashMap<OverallStatus, usize> {
    let mut counts: HashMap<OverallStatus, usize> = HashMap::new();

    for result in results {
        *counts.entry(result.overall_status).or_default() += 1;
    }

    counts
}

/// Count of non-successful outcomes per kind across results.
pub fn failures_by_kind(results: &[AggregatedResult]) -> BTreeMap<AnalysisKind, usize> {
    let mut failures: BTreeMap<AnalysisKind, usize> = BTreeMap::new();

    for result in results {
        for kind in result.failed_kinds() {
            *failures.entry(kind).or_default() += 1;
        }
    }

    failures
}

/// Mean latency of successful calls per kind, in milliseconds.
pub fn mean_latency_by_kind(results: &[AggregatedResult]) -> BTreeMap<AnalysisKind, f64> {
    let mut totals: BTreeMap<AnalysisKind, (u64, u64)> = BTreeMap::new();

    for result in results {
        for (kind, outcome) in &result.per_kind_outcome {
            if let AnalysisOutcome::Success { latency_ms, .. } = outcome {
                let entry = totals.entry(*kind).or_default();
                entry.0 += latency_ms;
                entry.1 += 1;
            }
        }
    }

    totals
        .into_iter()
        .map(|(kind, (sum, n))| (kind, sum as f64 / n as f64))
        .collect()
}

/// Failure counts ranked most first. Ties keep kind order.
pub fn rank_failures(failures: &BTreeMap<AnalysisKind, usize>) -> Vec<(AnalysisKind, usize)> {
    let mut ranked: Vec<_> = failures.iter().map(|(kind, n)| (*kind, *n)).collect();
    ranked.sort_by_key(|(_, count)| std::cmp::Reverse(*count));
    ranked
}

/// One-line summary of an aggregated result, for logs.
pub fn generate_summary_text(result: &AggregatedResult) -> String {
    let mut parts = Vec::new();

    for (kind, outcome) in &result.per_kind_outcome {
        parts.push(format!("{}={}", kind, outcome.label()));
    }

    format!(
        "{} {} ({}/{} failed, budget {}) [{}] in {}ms",
        result.overall_status.emoji(),
        result.overall_status,
        result.error_count(),
        result.per_kind_outcome.len(),
        result.max_errors,
        parts.join(", "),
        result.duration_ms
    )
}
