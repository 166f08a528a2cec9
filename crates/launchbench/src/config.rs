//! Configuration types for the benchmark runner.

use std::path::PathBuf;
use std::time::Duration;

use launchbench_os::HostPlatform;

use crate::controller::PreloadState;

/// Default number of iterations.
pub const DEFAULT_ITERATIONS: usize = 10;

/// Default settle interval between launch and shutdown.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(10);

/// Default number of one-second polls while waiting for a launch.
pub const DEFAULT_LAUNCH_ATTEMPTS: u32 = 300;

/// Default drive the snapshot helper mounts snapshots at.
pub const DEFAULT_SNAPSHOT_DRIVE: &str = "M:";

/// Complete runner configuration.
///
/// Built once from the command line; nothing below `main` reads the
/// environment.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// The application executable.
    pub exe: PathBuf,
    /// Profile directory the application runs on.
    pub profile_dir: PathBuf,
    /// Number of iterations.
    pub iterations: usize,
    /// Preload setting applied for the run.
    pub preload: PreloadState,
    /// Launch from a volume snapshot.
    pub cold_start: bool,
    /// Leave OS prefetching alone. When false, prefetch entries for the
    /// executable are purged around each iteration.
    pub prefetch: bool,
    /// Keep the artifacts directory after the run.
    pub keep_temp_dirs: bool,
    /// Erase and recreate the profile before the first iteration.
    pub initialize_profile: bool,
    /// How long the application runs before it is shut down.
    pub settle: Duration,
    /// Bound on each shutdown wait, `None` for no bound.
    pub shutdown_timeout: Option<Duration>,
    /// One-second polls before a launch is given up on.
    pub launch_attempts: u32,
    /// Directory holding the trace-control tool and snapshot helpers.
    pub tools_dir: PathBuf,
    /// OS prefetch directory.
    pub prefetch_dir: PathBuf,
    /// Drive the snapshot helper mounts snapshots at.
    pub snapshot_drive: String,
    /// External trace analyzer command.
    pub analyzer: Option<PathBuf>,
    /// Trace-control tool, `None` to run without trace capture.
    pub trace_control: Option<PathBuf>,
    /// Export results to this JSON file.
    pub json: Option<PathBuf>,
    /// Enable colored output.
    pub color: bool,
    /// Verbose output.
    pub verbose: bool,
    /// The host the runner executes on.
    pub host: HostPlatform,
}

impl RunnerConfig {
    /// Create a new configuration with defaults.
    pub fn new(exe: impl Into<PathBuf>, profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            profile_dir: profile_dir.into(),
            iterations: DEFAULT_ITERATIONS,
            preload: PreloadState::disabled(),
            cold_start: false,
            prefetch: true,
            keep_temp_dirs: false,
            initialize_profile: true,
            settle: DEFAULT_SETTLE,
            shutdown_timeout: None,
            launch_attempts: DEFAULT_LAUNCH_ATTEMPTS,
            tools_dir: PathBuf::from("."),
            prefetch_dir: PathBuf::from(r"C:\Windows\Prefetch"),
            snapshot_drive: DEFAULT_SNAPSHOT_DRIVE.to_string(),
            analyzer: None,
            trace_control: None,
            json: None,
            color: true,
            verbose: false,
            host: HostPlatform::default(),
        }
    }

    /// Name of the executable, for display.
    pub fn exe_name(&self) -> String {
        self.exe
            .file_name()
            .map_or_else(|| self.exe.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::new("/opt/chromium/chrome", "/tmp/profile");
        assert_eq!(config.iterations, 10);
        assert_eq!(config.settle, Duration::from_secs(10));
        assert_eq!(config.launch_attempts, 300);
        assert!(config.shutdown_timeout.is_none());
        assert!(config.prefetch);
        assert!(config.initialize_profile);
        assert!(!config.preload.enabled);
        assert_eq!(config.exe_name(), "chrome");
    }
}
