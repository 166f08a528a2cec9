//! Trace-capture sessions.
//!
//! A session records kernel and application events while one iteration runs.
//! The capture itself is done by an external control tool that is started
//! with `start` and the output files, and stopped with `stop`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{BenchError, Result};

/// File name of the kernel event log inside the output directory.
pub const KERNEL_FILE: &str = "kernel.etl";

/// File name of the application event log inside the output directory.
pub const CALL_TRACE_FILE: &str = "call_trace.etl";

/// Files a started session writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFiles {
    /// Kernel events (page faults, process starts).
    pub kernel: PathBuf,
    /// Application call-trace events.
    pub call_trace: PathBuf,
}

impl TraceFiles {
    /// The standard file names under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            kernel: dir.join(KERNEL_FILE),
            call_trace: dir.join(CALL_TRACE_FILE),
        }
    }
}

/// A trace capture that can be bracketed around an iteration.
pub trait TraceSession {
    /// Start capturing into `output_dir`.
    ///
    /// Returns the files being written, or `None` when this session produces
    /// no files to analyze.
    fn start(&mut self, output_dir: &Path) -> Result<Option<TraceFiles>>;

    /// Stop the capture.
    fn stop(&mut self) -> Result<()>;
}

/// Session driven by an external control executable.
#[derive(Debug, Clone)]
pub struct ControlTraceSession {
    control: PathBuf,
}

impl ControlTraceSession {
    /// Session using the control tool at `control`.
    pub fn new(control: impl Into<PathBuf>) -> Self {
        Self {
            control: control.into(),
        }
    }

    fn run(&self, args: &[String]) -> std::io::Result<std::process::ExitStatus> {
        Command::new(&self.control)
            .args(args)
            .stdin(Stdio::null())
            .status()
    }
}

impl TraceSession for ControlTraceSession {
    fn start(&mut self, output_dir: &Path) -> Result<Option<TraceFiles>> {
        // A session left over from an interrupted run would make start fail.
        match self.run(&["stop".to_string()]) {
            Ok(status) => tracing::debug!("Pre-start stop exited with {}", status),
            Err(e) => tracing::debug!("Pre-start stop failed: {}", e),
        }

        let output_dir = std::path::absolute(output_dir)?;
        let files = TraceFiles::in_dir(&output_dir);
        tracing::info!(
            "Starting trace capture to \"{}\" and \"{}\"",
            files.kernel.display(),
            files.call_trace.display()
        );

        let status = self
            .run(&[
                "start".to_string(),
                format!("--kernel-file={}", files.kernel.display()),
                format!("--call-trace-file={}", files.call_trace.display()),
            ])
            .map_err(|e| BenchError::LoggingStartFailure {
                reason: format!("cannot run {}: {e}", self.control.display()),
            })?;

        if !status.success() {
            return Err(BenchError::LoggingStartFailure {
                reason: format!("{} start exited with {status}", self.control.display()),
            });
        }
        Ok(Some(files))
    }

    fn stop(&mut self) -> Result<()> {
        tracing::info!("Stopping trace capture");
        let status = self
            .run(&["stop".to_string()])
            .map_err(|e| BenchError::LoggingStopFailure {
                reason: format!("cannot run {}: {e}", self.control.display()),
            })?;

        if !status.success() {
            return Err(BenchError::LoggingStopFailure {
                reason: format!("{} stop exited with {status}", self.control.display()),
            });
        }
        Ok(())
    }
}

/// Session that captures nothing, for runs without tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl TraceSession for NoTrace {
    fn start(&mut self, _output_dir: &Path) -> Result<Option<TraceFiles>> {
        Ok(None)
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
