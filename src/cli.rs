//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::registry::{AnalysisKind, AnalysisPreset, KindSelection};
use clap::Parser;
use std::path::PathBuf;

/// Narralyze - live sentence analysis for narrative writing
///
/// Replays a text as typing, detects sentence boundaries, and runs every
/// enabled analysis for each new sentence concurrently.
///
/// Examples:
///   narralyze --input draft.txt
///   narralyze --input draft.txt --profile production --preset deep
///   cat draft.txt | narralyze --enable factCheck --disable coherence
///   narralyze --input draft.txt --dry-run
///   narralyze --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Text file to analyze (reads stdin when omitted or "-")
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Named profile: default, development, production, testing
    #[arg(short, long, value_name = "NAME", env = "NARRALYZE_PROFILE")]
    pub profile: Option<String>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .narralyze.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the analysis endpoints
    #[arg(short, long, value_name = "URL", env = "NARRALYZE_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Starting set of analyses
    #[arg(long, default_value = "profile", value_name = "PRESET")]
    pub preset: AnalysisPreset,

    /// Analyses to add (comma-separated)
    ///
    /// Example: --enable factCheck,clarity
    #[arg(long, value_name = "KINDS", value_delimiter = ',')]
    pub enable: Vec<AnalysisKind>,

    /// Analyses to remove (comma-separated)
    #[arg(long, value_name = "KINDS", value_delimiter = ',')]
    pub disable: Vec<AnalysisKind>,

    /// Per-call timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Timeout for all analyses of one sentence, in milliseconds
    #[arg(long, value_name = "MS")]
    pub total_timeout: Option<u64>,

    /// Attempts per call, including the first
    #[arg(long, value_name = "NUM")]
    pub max_attempts: Option<u32>,

    /// Failed analyses tolerated before a sentence is aborted
    #[arg(long, value_name = "NUM")]
    pub max_errors: Option<usize>,

    /// Minimum confidence for a result to count as a success (0.0 - 1.0)
    #[arg(long, value_name = "SCORE")]
    pub min_confidence: Option<f64>,

    /// Intended audience, forwarded to the analyses
    #[arg(long, value_name = "TEXT")]
    pub audience: Option<String>,

    /// Narrative goal, forwarded to the analyses
    #[arg(long, value_name = "TEXT")]
    pub goal: Option<String>,

    /// Output file path for the session report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Append every aggregated result to this file as JSON lines
    #[arg(long, value_name = "FILE")]
    pub results: Option<PathBuf>,

    /// Dry run: detect and deduplicate sentences without calling any analysis
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 if any sentence exceeded its error budget
    #[arg(long)]
    pub fail_on_abort: bool,

    /// Generate a default .narralyze.toml configuration file
    #[arg(long)]
    pub init_config: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the input path, or `None` for stdin.
    pub fn input_path(&self) -> Option<&PathBuf> {
        self.input.as_ref().filter(|p| p.as_os_str() != "-")
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref endpoint) = self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err("Endpoint URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(kind) = self.enable.iter().find(|k| self.disable.contains(k)) {
            return Err(format!("Analysis '{}' is both enabled and disabled", kind));
        }

        if let Some(min_confidence) = self.min_confidence {
            if !(0.0..=1.0).contains(&min_confidence) {
                return Err("Minimum confidence must be between 0.0 and 1.0".to_string());
            }
        }

        if self.max_attempts == Some(0) {
            return Err("Max attempts must be at least 1".to_string());
        }

        if let Some(input) = self.input_path() {
            if !input.is_file() {
                return Err(format!("Input file does not exist: {}", input.display()));
            }
        }

        Ok(())
    }

    /// Returns the kind selection for this invocation.
    pub fn selection(&self) -> KindSelection {
        let mut selection = KindSelection::preset(self.preset);
        for kind in &self.enable {
            selection = selection.enable(*kind);
        }
        for kind in &self.disable {
            selection = selection.disable(*kind);
        }
        selection
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
