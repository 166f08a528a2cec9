//! Command-line interface for the benchmark runner.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use launchbench_os::HostPlatform;

use crate::config::{self, RunnerConfig};
use crate::controller::PreloadState;
use crate::snapshot::split_drive;

/// File name of the trace-control tool in the tools directory.
const TRACE_CONTROL_NAME: &str = "call_trace_control";

/// Browser startup benchmark runner.
///
/// Launches the browser repeatedly on one profile, captures a kernel trace
/// around every launch, shuts the browser down gracefully and prints one
/// `RESULT <graph>: <trace>= [samples] <units>` line per metric.
#[derive(Parser, Debug)]
#[command(name = "launchbench")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Browser executable to benchmark (Chromium or Mozilla family).
    #[arg(value_name = "EXE", env = "LAUNCHBENCH_EXE")]
    pub exe: PathBuf,

    /// Profile directory the browser runs on.
    #[arg(value_name = "PROFILE_DIR", env = "LAUNCHBENCH_PROFILE_DIR")]
    pub profile_dir: PathBuf,

    /// Number of launches to measure.
    #[arg(short = 'n', long, default_value_t = config::DEFAULT_ITERATIONS, env = "LAUNCHBENCH_ITERATIONS")]
    pub iterations: usize,

    /// Enable DLL preloading for the run (Chromium on Windows only).
    #[arg(long)]
    pub preload: bool,

    /// Preload read size in bytes.
    #[arg(long, value_name = "BYTES", requires = "preload")]
    pub preload_size: Option<u32>,

    /// Preload stride in bytes.
    #[arg(long, value_name = "BYTES", requires = "preload")]
    pub preload_stride: Option<u32>,

    /// Launch from a fresh volume snapshot so the file cache stays cold.
    #[arg(long)]
    pub cold_start: bool,

    /// Purge the executable's prefetch entries around each launch.
    #[arg(long)]
    pub no_prefetch: bool,

    /// Keep the temporary artifacts directory after the run.
    #[arg(long, env = "LAUNCHBENCH_KEEP_TEMP_DIRS")]
    pub keep_temp_dirs: bool,

    /// Reuse the existing profile instead of recreating it.
    #[arg(long)]
    pub no_initialize_profile: bool,

    /// Seconds the browser runs before it is shut down.
    #[arg(long, value_name = "SECS", default_value_t = config::DEFAULT_SETTLE.as_secs_f64())]
    pub settle_secs: f64,

    /// Bound on each shutdown wait in seconds (default: wait indefinitely).
    #[arg(long, value_name = "SECS")]
    pub shutdown_timeout_secs: Option<f64>,

    /// One-second polls before a launch is considered failed.
    #[arg(
        long,
        value_name = "N",
        default_value_t = config::DEFAULT_LAUNCH_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub launch_attempts: u32,

    /// Directory holding the trace-control tool and snapshot helpers.
    ///
    /// Defaults to the directory of the running executable.
    #[arg(long, value_name = "DIR", env = "LAUNCHBENCH_TOOLS_DIR")]
    pub tools_dir: Option<PathBuf>,

    /// OS prefetch directory (default: %WINDIR%\Prefetch).
    #[arg(long, value_name = "DIR")]
    pub prefetch_dir: Option<PathBuf>,

    /// Drive letter snapshots are mounted at.
    #[arg(long, value_name = "DRIVE", default_value = config::DEFAULT_SNAPSHOT_DRIVE)]
    pub snapshot_drive: String,

    /// External trace analyzer command.
    ///
    /// Invoked as `<CMD> --kernel-file=<path> --exe=<path>`; must print the
    /// event counts as JSON on stdout.
    #[arg(long, value_name = "CMD", env = "LAUNCHBENCH_ANALYZER")]
    pub analyzer: Option<PathBuf>,

    /// Trace-control tool (default: call_trace_control in the tools dir).
    #[arg(long, value_name = "PATH", conflicts_with = "no_trace")]
    pub trace_control: Option<PathBuf>,

    /// Run without trace capture.
    #[arg(long)]
    pub no_trace: bool,

    /// Export results to JSON file.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,

    /// Verbose output.
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    /// Convert CLI arguments to a runner configuration.
    ///
    /// Environment lookups and host detection happen here and nowhere
    /// below.
    pub fn into_config(self) -> Result<RunnerConfig> {
        if !self.exe.is_file() {
            bail!("Executable does not exist: {}", self.exe.display());
        }
        if self.cold_start && self.exe.to_str().and_then(split_drive).is_none() {
            bail!(
                "--cold-start needs a drive-qualified executable path: {}",
                self.exe.display()
            );
        }

        let settle = secs("--settle-secs", self.settle_secs)?;
        let shutdown_timeout = self
            .shutdown_timeout_secs
            .map(|s| secs("--shutdown-timeout-secs", s))
            .transpose()?;

        let tools_dir = match self.tools_dir {
            Some(dir) => dir,
            None => default_tools_dir()?,
        };
        let trace_control = if self.no_trace {
            None
        } else {
            Some(self.trace_control.unwrap_or_else(|| {
                tools_dir.join(format!(
                    "{TRACE_CONTROL_NAME}{}",
                    std::env::consts::EXE_SUFFIX
                ))
            }))
        };
        let prefetch_dir = self.prefetch_dir.unwrap_or_else(default_prefetch_dir);

        let mut config = RunnerConfig::new(self.exe, self.profile_dir);
        config.iterations = self.iterations;
        config.preload = PreloadState {
            enabled: self.preload,
            size: self.preload_size,
            stride: self.preload_stride,
        };
        config.cold_start = self.cold_start;
        config.prefetch = !self.no_prefetch;
        config.keep_temp_dirs = self.keep_temp_dirs;
        config.initialize_profile = !self.no_initialize_profile;
        config.settle = settle;
        config.shutdown_timeout = shutdown_timeout;
        config.launch_attempts = self.launch_attempts;
        config.tools_dir = tools_dir;
        config.prefetch_dir = prefetch_dir;
        config.snapshot_drive = self.snapshot_drive;
        config.analyzer = self.analyzer;
        config.trace_control = trace_control;
        config.json = self.json;
        config.color = !self.no_color && supports_color();
        config.verbose = self.verbose;
        config.host = HostPlatform::detect();

        Ok(config)
    }
}

fn secs(flag: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).with_context(|| format!("Invalid {flag}: {value}"))
}

fn default_tools_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Failed to locate the running executable")?;
    Ok(exe
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf))
}

fn default_prefetch_dir() -> PathBuf {
    let windir = std::env::var_os("WINDIR").unwrap_or_else(|| r"C:\Windows".into());
    PathBuf::from(windir).join("Prefetch")
}

/// Check if the terminal supports colors.
fn supports_color() -> bool {
    // https://no-color.org/
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    std::io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("launchbench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["chrome.exe", "profile"]);
        assert_eq!(cli.iterations, 10);
        assert!((cli.settle_secs - 10.0).abs() < f64::EPSILON);
        assert_eq!(cli.launch_attempts, 300);
        assert_eq!(cli.snapshot_drive, "M:");
        assert!(cli.shutdown_timeout_secs.is_none());
    }

    #[test]
    fn test_preload_size_requires_preload() {
        let result = Cli::try_parse_from([
            "launchbench",
            "chrome.exe",
            "profile",
            "--preload-size",
            "4096",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_launch_attempts_rejected() {
        let result = Cli::try_parse_from([
            "launchbench",
            "chrome.exe",
            "profile",
            "--launch-attempts",
            "0",
        ]);
        assert!(result.is_err());
        assert_eq!(
            parse(&["chrome.exe", "profile", "--launch-attempts", "1"]).launch_attempts,
            1
        );
    }

    #[test]
    fn test_no_trace_conflicts_with_trace_control() {
        let result = Cli::try_parse_from([
            "launchbench",
            "chrome.exe",
            "profile",
            "--no-trace",
            "--trace-control",
            "ctl",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_into_config() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("chrome");
        std::fs::write(&exe, b"").unwrap();
        let exe_arg = exe.to_str().unwrap();

        let config = parse(&[
            exe_arg,
            "profile",
            "-n",
            "3",
            "--preload",
            "--preload-size",
            "4096",
            "--no-prefetch",
            "--settle-secs",
            "0.5",
            "--shutdown-timeout-secs",
            "30",
            "--tools-dir",
            "/opt/tools",
            "--prefetch-dir",
            "/tmp/pf",
            "--no-color",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.iterations, 3);
        assert!(config.preload.enabled);
        assert_eq!(config.preload.size, Some(4096));
        assert_eq!(config.preload.stride, None);
        assert!(!config.prefetch);
        assert_eq!(config.settle, Duration::from_millis(500));
        assert_eq!(config.shutdown_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.prefetch_dir, PathBuf::from("/tmp/pf"));
        assert_eq!(
            config.trace_control,
            Some(PathBuf::from("/opt/tools").join(format!(
                "call_trace_control{}",
                std::env::consts::EXE_SUFFIX
            )))
        );
        assert!(!config.color);
    }

    #[test]
    fn test_no_trace_disables_capture() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("firefox");
        std::fs::write(&exe, b"").unwrap();

        let config = parse(&[exe.to_str().unwrap(), "profile", "--no-trace"])
            .into_config()
            .unwrap();
        assert!(config.trace_control.is_none());
    }

    #[test]
    fn test_missing_executable_rejected() {
        let err = parse(&["/nonexistent/chrome.exe", "profile"])
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_negative_settle_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("chrome");
        std::fs::write(&exe, b"").unwrap();

        let err = parse(&[exe.to_str().unwrap(), "profile", "--settle-secs=-1"])
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("--settle-secs"));
    }

    #[test]
    #[cfg(unix)]
    fn test_cold_start_needs_drive_letter() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("chrome");
        std::fs::write(&exe, b"").unwrap();

        let err = parse(&[exe.to_str().unwrap(), "profile", "--cold-start"])
            .into_config()
            .unwrap_err();
        assert!(err.to_string().contains("drive-qualified"));
    }
}
