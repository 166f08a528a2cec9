//! Error types for benchmark runs.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use launchbench_os::{OsError, ProcessId, ShutdownError, WindowQuery};

/// Errors raised while setting up, iterating or tearing down a benchmark run.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// No window identifying the application instance was found.
    #[error("no running application instance found (looked for a window of {query})")]
    TargetNotFound {
        /// The window query that matched nothing.
        query: WindowQuery,
    },

    /// The application did not exit within the shutdown timeout.
    #[error("application process {pid} did not exit within {timeout:?}")]
    ShutdownTimeout {
        /// Process that kept running.
        pid: ProcessId,
        /// The bound that elapsed.
        timeout: Duration,
    },

    /// The application never reported itself running after launch.
    #[error("application was not running after {attempts} polls")]
    LaunchTimeout {
        /// Number of polls made.
        attempts: u32,
    },

    /// The application family cannot provide a requested feature.
    #[error("{feature} is not supported for {target}")]
    UnsupportedFeature {
        /// Feature that was requested.
        feature: &'static str,
        /// Application family or platform lacking it.
        target: String,
    },

    /// The trace-capture control process failed to start a session.
    #[error("failed to start trace capture: {reason}")]
    LoggingStartFailure {
        /// What went wrong.
        reason: String,
    },

    /// The trace-capture control process failed to stop a session.
    #[error("failed to stop trace capture: {reason}")]
    LoggingStopFailure {
        /// What went wrong.
        reason: String,
    },

    /// A sample was added with units differing from earlier samples of the
    /// same metric.
    #[error("units conflict for {graph}/{trace}: recorded as {existing:?}, got {requested:?}")]
    UnitsConflict {
        /// Graph name of the metric.
        graph: String,
        /// Trace name of the metric.
        trace: String,
        /// Units recorded with the first sample.
        existing: String,
        /// Units supplied by the rejected sample.
        requested: String,
    },

    /// No snapshot helper exists for this host OS version.
    #[error("unrecognized platform for cold start (Windows major version {major:?})")]
    UnrecognizedPlatform {
        /// Major version of the host, `None` when not Windows.
        major: Option<u32>,
    },

    /// The executable path cannot be used the way the run requires.
    #[error("cannot use executable {path}: {reason}")]
    InvalidExecutablePath {
        /// The offending path.
        path: PathBuf,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// The run was interrupted (Ctrl+C).
    #[error("interrupted")]
    Interrupted,

    /// Trace analysis failed.
    #[error("trace analysis failed: {reason}")]
    Analysis {
        /// What went wrong.
        reason: String,
    },

    /// Filesystem or process I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// A window or process primitive failed.
    #[error(transparent)]
    Os(#[from] OsError),
}

impl From<ShutdownError> for BenchError {
    fn from(err: ShutdownError) -> Self {
        match err {
            ShutdownError::TargetNotFound { query } => Self::TargetNotFound { query },
            ShutdownError::Timeout { pid, timeout } => Self::ShutdownTimeout { pid, timeout },
            ShutdownError::Os(e) => Self::Os(e),
        }
    }
}

/// Result type for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_errors_map_to_bench_kinds() {
        let not_found: BenchError = ShutdownError::TargetNotFound {
            query: WindowQuery::class("FirefoxMessageWindow"),
        }
        .into();
        assert!(matches!(not_found, BenchError::TargetNotFound { .. }));

        let timeout: BenchError = ShutdownError::Timeout {
            pid: ProcessId(12),
            timeout: Duration::from_secs(3),
        }
        .into();
        match timeout {
            BenchError::ShutdownTimeout { pid, timeout } => {
                assert_eq!(pid, ProcessId(12));
                assert_eq!(timeout, Duration::from_secs(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_messages() {
        let err = BenchError::UnitsConflict {
            graph: "chrome.exe".to_string(),
            trace: "RendererLaunchTime".to_string(),
            existing: "s".to_string(),
            requested: "ms".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "units conflict for chrome.exe/RendererLaunchTime: recorded as \"s\", got \"ms\""
        );
        assert_eq!(
            BenchError::LaunchTimeout { attempts: 300 }.to_string(),
            "application was not running after 300 polls"
        );
    }
}
