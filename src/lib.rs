//! Narralyze - live sentence analysis for narrative writing.
//!
//! Turns a stream of edit events into sentences, admits each distinct
//! sentence once per session, and fans every admitted sentence out to a set
//! of remote analyses under per-call and total time bounds.
//!
//! The pipeline, stage by stage:
//!
//! 1. [`detector`] decides when the open segment has become a candidate
//!    sentence (terminal punctuation, Enter at the end, an idle pause, or a
//!    manual flush).
//! 2. [`dedup`] normalizes the candidate and admits it at most once.
//! 3. [`orchestrator`] runs every enabled [`registry::AnalysisKind`]
//!    concurrently through a [`client::AnalysisClient`] and aggregates the
//!    outcomes against the error budget.
//! 4. [`sink`] receives each [`models::AggregatedResult`].
//!
//! [`session::Session`] wires the stages together for one document.

pub mod cli;
pub mod client;
pub mod config;
pub mod dedup;
pub mod detector;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod session;
pub mod sink;

pub use error::{ConfigError, PipelineError};
pub use models::{AggregatedResult, AnalysisOutcome, OverallStatus};
pub use orchestrator::Orchestrator;
pub use registry::{AnalysisKind, AnalysisRegistry, Profile};
pub use session::{Session, SessionStep};
