//! Markdown report generation.
//!
//! This module renders session reports as Markdown or JSON.

use super::{ReportMetadata, SessionReport, StatusSummary};
use crate::models::{AggregatedResult, AnalysisOutcome, FailureKind, OverallStatus};
use crate::orchestrator::aggregate::rank_failures;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &SessionReport) -> String {
    let mut output = String::new();

    output.push_str("# Narralyze Session Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_summary_section(&report.summary));
    output.push_str(&generate_sentences_section(&report.results));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Session:** `{}`\n", metadata.session_id));
    section.push_str(&format!("- **Profile:** {}\n", metadata.profile));
    section.push_str(&format!(
        "- **Started:** {}\n",
        metadata.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Sentences Analyzed:** {}\n",
        metadata.sentences_analyzed
    ));
    section.push_str(&format!(
        "- **Session Duration:** {:.1}s\n",
        metadata.duration_seconds
    ));
    section.push('\n');

    section
}

/// Generate the summary section.
fn generate_summary_section(summary: &StatusSummary) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");
    section.push_str(&format!(
        "| {} Complete | {} Partial | {} Aborted | **Total** |\n",
        OverallStatus::Complete.emoji(),
        OverallStatus::Partial.emoji(),
        OverallStatus::Aborted.emoji(),
    ));
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        summary.complete, summary.partial, summary.aborted, summary.total
    ));

    if !summary.mean_latency_ms.is_empty() {
        section.push_str("### Mean Latency by Analysis\n\n");
        section.push_str("| Analysis | Latency |\n");
        section.push_str("|:---|:---:|\n");
        for (kind, latency) in &summary.mean_latency_ms {
            section.push_str(&format!("| {} | {:.0}ms |\n", kind.label(), latency));
        }
        section.push('\n');
    }

    if !summary.failures_by_kind.is_empty() {
        section.push_str("### Failures by Analysis\n\n");
        section.push_str("| Analysis | Failures |\n");
        section.push_str("|:---|:---:|\n");
        for (kind, count) in rank_failures(&summary.failures_by_kind) {
            section.push_str(&format!("| {} | {} |\n", kind.label(), count));
        }
        section.push('\n');
    }

    section
}

/// Generate one block per analyzed sentence.
fn generate_sentences_section(results: &[AggregatedResult]) -> String {
    let mut section = String::new();

    section.push_str("## Sentences\n\n");

    if results.is_empty() {
        section.push_str("No sentences were analyzed.\n\n");
        return section;
    }

    for (i, result) in results.iter().enumerate() {
        section.push_str(&generate_sentence_block(i + 1, result));
    }

    section
}

/// Generate a single sentence block.
fn generate_sentence_block(index: usize, result: &AggregatedResult) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "### {}. {} {}\n\n",
        index,
        result.overall_status.emoji(),
        result.sentence.raw_text()
    ));
    block.push_str(&format!(
        "*Trigger: {} | Status: {} | Failed: {}/{} (budget {}) | {}ms*\n\n",
        result.sentence.trigger_reason(),
        result.overall_status,
        result.error_count(),
        result.per_kind_outcome.len(),
        result.max_errors,
        result.duration_ms
    ));

    if result.per_kind_outcome.is_empty() {
        block.push_str("No analyses were enabled.\n\n---\n\n");
        return block;
    }

    block.push_str("| Analysis | Outcome | Confidence | Attempts | Detail |\n");
    block.push_str("|:---|:---|:---:|:---:|:---|\n");

    for (kind, outcome) in &result.per_kind_outcome {
        let confidence = outcome
            .payload()
            .map(|p| format!("{:.2}", p.confidence))
            .unwrap_or_else(|| "-".to_string());

        let (attempts, detail) = match outcome {
            AnalysisOutcome::Success {
                latency_ms,
                attempts,
                ..
            } => (*attempts, format!("{}ms", latency_ms)),
            AnalysisOutcome::Timeout {
                elapsed_ms,
                attempts,
            } => (*attempts, format!("gave up after {}ms", elapsed_ms)),
            AnalysisOutcome::Failure(detail) => {
                let prefix = match detail.kind {
                    FailureKind::LowConfidence => "",
                    FailureKind::Remote => "remote: ",
                    FailureKind::Lost => "lost: ",
                };
                (detail.attempts, format!("{}{}", prefix, detail.message))
            }
        };

        block.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            kind.label(),
            outcome.label(),
            confidence,
            attempts,
            detail.replace('|', "\\|")
        ));
    }

    block.push_str("\n---\n\n");

    block
}

/// Generate the report footer.
fn generate_footer() -> String {
    "*Report generated by narralyze*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &SessionReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Write already-rendered report content to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report file: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write report: {}", path.display()))?;

    Ok(())
}
