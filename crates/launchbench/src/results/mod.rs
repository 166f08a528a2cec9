//! Result aggregation and reporting.
//!
//! Samples are collected per `(graph, trace)` key by [`ResultAggregator`] and
//! rendered as graphing-log `RESULT` lines:
//!
//! ```text
//! RESULT chrome.exe: RendererLaunchTime= [0.1, 0.2, 0.3] s
//! ```
//!
//! The same samples feed the terminal summary ([`printer`]) and the optional
//! JSON report ([`export_json`]).

pub mod printer;
pub mod progress;
pub mod stats;

pub use printer::print_summary;
pub use progress::IterationProgress;
pub use stats::{compute_stats, SampleStats};

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::RunnerConfig;
use crate::error::{BenchError, Result};

/// Units and ordered samples of one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSeries {
    /// Units recorded with the first sample; may be empty.
    pub units: String,
    /// Samples in the order they were added.
    pub samples: Vec<f64>,
}

/// Accumulates named samples across iterations.
///
/// Keys are kept sorted so rendering is deterministic.
#[derive(Debug, Default, Clone)]
pub struct ResultAggregator {
    entries: BTreeMap<(String, String), ResultSeries>,
}

impl ResultAggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `sample` to the series for `(graph, trace)`.
    ///
    /// The first sample fixes the series' units. A later sample with
    /// different, non-empty units is rejected with
    /// [`BenchError::UnitsConflict`] and not recorded.
    pub fn add_result(&mut self, graph: &str, trace: &str, sample: f64, units: &str) -> Result<()> {
        tracing::info!("Adding result {}, {}, {}, {}", graph, trace, sample, units);

        let series = self
            .entries
            .entry((graph.to_string(), trace.to_string()))
            .or_insert_with(|| ResultSeries {
                units: units.to_string(),
                samples: Vec::new(),
            });

        if !units.is_empty() && series.units != units {
            return Err(BenchError::UnitsConflict {
                graph: graph.to_string(),
                trace: trace.to_string(),
                existing: series.units.clone(),
                requested: units.to_string(),
            });
        }

        series.samples.push(sample);
        Ok(())
    }

    /// The series recorded for `(graph, trace)`, if any.
    pub fn get(&self, graph: &str, trace: &str) -> Option<&ResultSeries> {
        self.entries.get(&(graph.to_string(), trace.to_string()))
    }

    /// Iterate over `((graph, trace), series)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &ResultSeries)> {
        self.entries.iter()
    }

    /// Number of distinct metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no sample was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One `RESULT <graph>: <trace>= [<s1>, <s2>, ...] <units>` line per key.
    pub fn render(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|((graph, trace), series)| {
                let samples = series
                    .samples
                    .iter()
                    .map(f64::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("RESULT {graph}: {trace}= [{samples}] {}", series.units)
            })
            .collect()
    }
}

/// JSON-serializable run report.
#[derive(Debug, Clone, Serialize)]
pub struct RunReportJson {
    pub metadata: ReportMetadata,
    pub results: Vec<MetricJson>,
}

/// Report metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    pub timestamp: String,
    pub platform: String,
    pub launchbench_version: String,
    pub executable: String,
    pub profile_dir: String,
    pub iterations: usize,
    pub completed_iterations: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_iteration: Option<usize>,
    pub cold_start: bool,
    pub prefetch: bool,
    pub preload: bool,
}

/// One metric with its raw samples and summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricJson {
    pub graph: String,
    pub trace: String,
    pub units: String,
    pub samples: Vec<f64>,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

/// Write the aggregated results of a run to `path` as pretty JSON.
pub fn export_json(
    results: &ResultAggregator,
    config: &RunnerConfig,
    completed_iterations: usize,
    failed_iteration: Option<usize>,
    path: &Path,
) -> anyhow::Result<()> {
    let metrics = results
        .iter()
        .map(|((graph, trace), series)| {
            let stats = compute_stats(&series.samples);
            MetricJson {
                graph: graph.clone(),
                trace: trace.clone(),
                units: series.units.clone(),
                samples: series.samples.clone(),
                mean: stats.mean,
                std_dev: stats.std_dev,
                min: stats.min,
                max: stats.max,
            }
        })
        .collect();

    let report = RunReportJson {
        metadata: ReportMetadata {
            timestamp: chrono::Utc::now().to_rfc3339(),
            platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            launchbench_version: env!("CARGO_PKG_VERSION").to_string(),
            executable: config.exe.display().to_string(),
            profile_dir: config.profile_dir.display().to_string(),
            iterations: config.iterations,
            completed_iterations,
            failed_iteration,
            cold_start: config.cold_start,
            prefetch: config.prefetch,
            preload: config.preload.enabled,
        },
        results: metrics,
    };

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)?;

    Ok(())
}
