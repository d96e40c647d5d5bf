//! Result sinks.
//!
//! A sink receives every [`AggregatedResult`] a session produces, for
//! logging or storage. Delivery failures are reported to the caller, which
//! logs them; they never affect the result itself.

use crate::models::{AggregatedResult, OverallStatus};
use crate::orchestrator::generate_summary_text;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// Receives aggregated results.
pub trait ResultSink: Send + Sync {
    fn deliver(&self, result: &AggregatedResult) -> Result<()>;
}

impl<T: ResultSink + ?Sized> ResultSink for Arc<T> {
    fn deliver(&self, result: &AggregatedResult) -> Result<()> {
        (**self).deliver(result)
    }
}

/// Logs a one-line summary of each result.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn deliver(&self, result: &AggregatedResult) -> Result<()> {
        let summary = generate_summary_text(result);
        if result.overall_status == OverallStatus::Aborted {
            warn!("{:?}: {}", result.sentence.raw_text(), summary);
        } else {
            info!("{:?}: {}", result.sentence.raw_text(), summary);
        }
        Ok(())
    }
}

/// Appends each result as one JSON line to a file.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultSink for JsonLinesSink {
    fn deliver(&self, result: &AggregatedResult) -> Result<()> {
        let line = serde_json::to_string(result).context("Failed to serialize result")?;
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)
            .and_then(|_| writer.flush())
            .with_context(|| format!("Failed to write to {}", self.path.display()))
    }
}

/// Keeps every result in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<AggregatedResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<AggregatedResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for MemorySink {
    fn deliver(&self, result: &AggregatedResult) -> Result<()> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result.clone());
        Ok(())
    }
}

/// Delivers to several sinks in order.
///
/// Every sink is tried; the first error is returned.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn ResultSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn ResultSink>) {
        self.sinks.push(sink);
    }
}

impl ResultSink for FanoutSink {
    fn deliver(&self, result: &AggregatedResult) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(result) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
