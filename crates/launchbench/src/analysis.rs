//! Trace analysis.
//!
//! Parsing the kernel event log is left to an external analyzer that prints
//! event counts for the benchmarked executable as JSON. This module turns
//! those counts into named metrics.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;

use crate::error::{BenchError, Result};

/// One named metric value produced for an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    /// Trace name of the metric, e.g. `HardPageFaults`.
    pub name: String,
    /// The value.
    pub value: f64,
    /// Units, empty for plain counts.
    pub units: String,
}

impl Metric {
    /// Metric `name` with `value` in `units`.
    pub fn new(name: impl Into<String>, value: f64, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            units: units.into(),
        }
    }
}

/// Events attributed to the benchmarked executable in one trace.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventCounts {
    /// Page faults that needed disk I/O.
    pub hard_faults: u64,
    /// Page faults served from memory.
    pub soft_faults: u64,
    /// Start times, in seconds, of each process launched from the
    /// executable, in launch order.
    #[serde(default)]
    pub process_launches: Vec<f64>,
}

impl EventCounts {
    /// Reduce the counts to metrics.
    ///
    /// `RendererLaunchTime` is the delay between the first (browser) and the
    /// second (first renderer) process launch, and is only reported when at
    /// least two launches were seen.
    pub fn metrics(&self) -> Vec<Metric> {
        let mut metrics = vec![
            Metric::new("HardPageFaults", self.hard_faults as f64, ""),
            Metric::new("SoftPageFaults", self.soft_faults as f64, ""),
        ];
        if let [browser, renderer, ..] = self.process_launches.as_slice() {
            metrics.push(Metric::new("RendererLaunchTime", renderer - browser, "s"));
        }
        metrics
    }
}

/// Turns a captured kernel trace into metrics.
pub trait TraceAnalyzer {
    /// Analyze `kernel_file` for events of `exe`.
    fn analyze(&mut self, kernel_file: &Path, exe: &Path) -> Result<Vec<Metric>>;
}

/// Analyzer delegating to an external command.
///
/// The command is run as `<command> --kernel-file=<path> --exe=<path>` and
/// must print an [`EventCounts`] JSON object on stdout.
#[derive(Debug, Clone)]
pub struct ExternalAnalyzer {
    command: PathBuf,
}

impl ExternalAnalyzer {
    /// Analyzer running `command`.
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl TraceAnalyzer for ExternalAnalyzer {
    fn analyze(&mut self, kernel_file: &Path, exe: &Path) -> Result<Vec<Metric>> {
        tracing::debug!(
            "Analyzing {} with {}",
            kernel_file.display(),
            self.command.display()
        );
        let output = Command::new(&self.command)
            .arg(format!("--kernel-file={}", kernel_file.display()))
            .arg(format!("--exe={}", exe.display()))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| BenchError::Analysis {
                reason: format!("cannot run {}: {e}", self.command.display()),
            })?;

        if !output.status.success() {
            return Err(BenchError::Analysis {
                reason: format!(
                    "{} exited with {}: {}",
                    self.command.display(),
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let counts: EventCounts =
            serde_json::from_slice(&output.stdout).map_err(|e| BenchError::Analysis {
                reason: format!("malformed analyzer output: {e}"),
            })?;
        tracing::debug!("Event counts: {:?}", counts);
        Ok(counts.metrics())
    }
}

/// Analyzer that reports nothing, for runs without an analyzer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnalysis;

impl TraceAnalyzer for NoAnalysis {
    fn analyze(&mut self, _kernel_file: &Path, _exe: &Path) -> Result<Vec<Metric>> {
        Ok(Vec::new())
    }
}
