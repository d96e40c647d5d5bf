//! Session reports.
//!
//! A [`SessionReport`] summarizes everything analyzed during one session.
//! The generator renders it as Markdown or JSON.

pub mod generator;

use crate::models::{AggregatedResult, OverallStatus};
use crate::orchestrator::aggregate::{count_by_status, failures_by_kind, mean_latency_by_kind};
use crate::registry::{AnalysisKind, Profile};
use crate::session::SessionStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub use generator::{generate_json_report, generate_markdown_report, write_report};

/// Session-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub session_id: Uuid,
    pub profile: Profile,
    pub started_at: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub sentences_analyzed: usize,
}

/// Breakdown of results by status and kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub complete: usize,
    pub partial: usize,
    pub aborted: usize,
    pub failures_by_kind: BTreeMap<AnalysisKind, usize>,
    pub mean_latency_ms: BTreeMap<AnalysisKind, f64>,
}

impl StatusSummary {
    pub fn from_results(results: &[AggregatedResult]) -> Self {
        let counts = count_by_status(results);
        let count = |status: OverallStatus| counts.get(&status).copied().unwrap_or(0);

        Self {
            total: results.len(),
            complete: count(OverallStatus::Complete),
            partial: count(OverallStatus::Partial),
            aborted: count(OverallStatus::Aborted),
            failures_by_kind: failures_by_kind(results),
            mean_latency_ms: mean_latency_by_kind(results),
        }
    }
}

/// Complete report for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub metadata: ReportMetadata,
    pub summary: StatusSummary,
    pub stats: SessionStats,
    pub results: Vec<AggregatedResult>,
}

impl SessionReport {
    pub fn new(
        session_id: Uuid,
        profile: Profile,
        started_at: DateTime<Utc>,
        stats: SessionStats,
        results: Vec<AggregatedResult>,
    ) -> Self {
        let generated_at = Utc::now();
        let duration_seconds = (generated_at - started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Self {
            metadata: ReportMetadata {
                session_id,
                profile,
                started_at,
                generated_at,
                duration_seconds,
                sentences_analyzed: results.len(),
            },
            summary: StatusSummary::from_results(&results),
            stats,
            results,
        }
    }

    /// Returns true if any sentence exceeded its error budget.
    pub fn has_aborted(&self) -> bool {
        self.summary.aborted > 0
    }
}
