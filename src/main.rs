//! Narralyze - live sentence analysis for narrative writing
//!
//! A CLI that replays a text as typing, detects sentence boundaries, and
//! runs the enabled analyses for each new sentence concurrently.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (configuration, input, report writing, etc.)
//!   2 - A sentence exceeded its error budget and --fail-on-abort was set

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use narralyze::cli::{Args, OutputFormat};
use narralyze::client::HttpAnalysisClient;
use narralyze::config::{Config, DEFAULT_CONFIG_FILE};
use narralyze::dedup::Deduplicator;
use narralyze::detector::{BoundaryDetector, DetectorConfig};
use narralyze::models::EditEvent;
use narralyze::report;
use narralyze::session::{keys_for_text, Session, SessionOptions, SessionStep};
use narralyze::sink::{FanoutSink, JsonLinesSink, TracingSink};
use narralyze::{Orchestrator, PipelineError};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args)?;

    info!("Narralyze v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Session failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .narralyze.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with development settings.", DEFAULT_CONFIG_FILE);
    println!("   Edit it to customize endpoints, analyses, timeouts, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) -> Result<()> {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

/// Run one session over the input text. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let profile = config.resolve_profile(args.profile.as_deref());
    let registry = config.registry(profile)?;
    config
        .detector
        .validate()
        .context("Invalid [detector] configuration")?;

    let text = read_input(&args)?;

    if args.dry_run {
        return handle_dry_run(&text, &config.detector);
    }

    let selection = args.selection();
    let kinds = selection.resolve(&registry);
    let timeouts = registry.timeouts();

    println!("🧭 Profile: {}", profile);
    println!(
        "   Analyses: {}",
        kinds
            .iter()
            .map(|k| k.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!(
        "   Timeouts: {}ms per call, {}ms total",
        timeouts.per_call.as_millis(),
        timeouts.total.as_millis()
    );

    // The orchestrator enforces the real bounds; the transport only needs
    // to outlast them.
    let transport_timeout = timeouts
        .total
        .max(timeouts.per_call)
        .max(Duration::from_secs(1));
    let client = Arc::new(HttpAnalysisClient::new(transport_timeout)?);
    let orchestrator = Orchestrator::new(Arc::new(registry), client);

    let mut sink = FanoutSink::new().with(TracingSink);
    if let Some(ref path) = args.results {
        sink.push(Box::new(JsonLinesSink::open(path)?));
        info!("Appending results to {}", path.display());
    }

    let options = SessionOptions {
        selection,
        target_audience: config.general.target_audience.clone(),
        narrative_goal: config.general.narrative_goal.clone(),
        ..SessionOptions::default()
    };
    let mut session = Session::new(
        config.detector.clone(),
        orchestrator,
        Arc::new(sink),
        options,
    );

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    };

    println!("\n🔬 Analyzing sentences...");
    let mut analyzed = 0usize;
    session
        .replay(&text, |step| {
            if let SessionStep::Analyzed(result) = step {
                analyzed += 1;
                progress.set_message(format!(
                    "{} sentence(s) analyzed, last: {} {}",
                    analyzed,
                    result.overall_status.emoji(),
                    result.overall_status
                ));
            }
        })
        .await;
    progress.finish_and_clear();

    let session_report = session.report();
    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&session_report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&session_report),
    };

    let output_path = PathBuf::from(&config.general.output);
    report::write_report(&output, &output_path)?;

    let summary = &session_report.summary;
    let stats = session.stats();
    println!("\n📊 Session Summary:");
    println!(
        "   Sentences: {} analyzed, {} duplicate(s) skipped",
        summary.total, stats.duplicates
    );
    println!(
        "   - 🟢 Complete: {} | 🟡 Partial: {} | 🔴 Aborted: {}",
        summary.complete, summary.partial, summary.aborted
    );
    if stats.sink_errors > 0 {
        warn!("{} result(s) could not be delivered", stats.sink_errors);
    }
    println!(
        "\n✅ Session complete! Report saved to: {}",
        output_path.display()
    );

    if args.fail_on_abort && session_report.has_aborted() {
        eprintln!(
            "\n⛔ {} sentence(s) exceeded the error budget. Failing (exit code 2).",
            summary.aborted
        );
        return Ok(2);
    }

    Ok(0)
}

/// Handle --dry-run: detect and deduplicate, print what would be analyzed.
fn handle_dry_run(text: &str, detector_config: &DetectorConfig) -> Result<i32> {
    println!("\n🔍 Dry run: detecting sentences (no analysis calls)...\n");

    let mut detector = BoundaryDetector::new(detector_config.clone());
    let dedup = Deduplicator::default().with_terminals(&detector_config.terminal_chars);

    let mut detections = Vec::new();
    for key in keys_for_text(text) {
        let event = EditEvent::key(key, detector.segment().end());
        detections.push(detector.on_event(&event));
    }
    detections.push(detector.flush());

    let mut admitted = 0usize;
    let mut duplicates = 0usize;
    for detection in detections {
        match detection.into_result().and_then(|c| dedup.admit(c)) {
            Ok(sentence) => {
                admitted += 1;
                println!(
                    "     📝 [{}] {}",
                    sentence.candidate.trigger_reason(),
                    sentence.finalized_text
                );
            }
            Err(PipelineError::DuplicateRejected { key }) => {
                duplicates += 1;
                println!("     ♻️  duplicate skipped: {}", key);
            }
            Err(_) => {}
        }
    }

    println!(
        "\n   Total: {} sentence(s) would be analyzed, {} duplicate(s)",
        admitted, duplicates
    );
    println!("\n✅ Dry run complete. No analysis calls were made.");
    Ok(0)
}

/// Read the narrative text from --input or stdin.
fn read_input(args: &Args) -> Result<String> {
    match args.input_path() {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read input from stdin")?;
            Ok(text)
        }
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {:#}", e);
            Ok(Config::default())
        }
    }
}
