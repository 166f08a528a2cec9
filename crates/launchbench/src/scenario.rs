//! The startup benchmark.
//!
//! [`BenchmarkScenario`] supplies the [`IterationHooks`] for measuring
//! browser startup: each iteration is bracketed by a trace capture, the
//! browser is launched (optionally cold, from a volume snapshot), left to
//! settle and shut down gracefully, and the captured kernel trace is reduced
//! to metrics that accumulate across iterations.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use launchbench_os::signal;
use tempfile::TempDir;

use crate::analysis::{NoAnalysis, TraceAnalyzer};
use crate::config::RunnerConfig;
use crate::controller::{ApplicationController, PreloadState, ProfileInit};
use crate::error::{BenchError, Result};
use crate::launch::{LaunchCommand, Launcher, ProcessLauncher};
use crate::orchestrator::{wait_till_running, IterationHooks, LaunchPolicy};
use crate::prefetch::purge_prefetch;
use crate::results::ResultAggregator;
use crate::snapshot::ColdStart;
use crate::trace::{NoTrace, TraceSession};

/// Prefix of the per-run artifacts directory.
pub const TEMP_DIR_PREFIX: &str = "launchbench-";

/// What a [`BenchmarkScenario`] measures and how.
#[derive(Debug, Clone)]
pub struct ScenarioSettings {
    /// The application executable.
    pub exe: PathBuf,
    /// Profile directory the application runs on.
    pub profile_dir: PathBuf,
    /// Preload setting applied for the run.
    pub preload: PreloadState,
    /// Launch from a volume snapshot when set.
    pub cold_start: Option<ColdStart>,
    /// Prefetch directory to purge around each iteration, `None` to leave
    /// prefetching alone.
    pub prefetch_purge: Option<PathBuf>,
    /// Keep the artifacts directory after the run.
    pub keep_temp_dirs: bool,
    /// Erase and recreate the profile during setup.
    pub initialize_profile: bool,
    /// How long the application runs before it is shut down.
    pub settle: Duration,
    /// Bound on each shutdown wait, `None` for no bound.
    pub shutdown_timeout: Option<Duration>,
    /// Wait for the application started during profile initialization.
    pub launch: LaunchPolicy,
}

impl ScenarioSettings {
    /// Settings for `exe` on `profile_dir` with the defaults of the CLI.
    pub fn new(exe: impl Into<PathBuf>, profile_dir: impl Into<PathBuf>) -> Self {
        Self {
            exe: exe.into(),
            profile_dir: profile_dir.into(),
            preload: PreloadState::disabled(),
            cold_start: None,
            prefetch_purge: None,
            keep_temp_dirs: false,
            initialize_profile: true,
            settle: Duration::from_secs(10),
            shutdown_timeout: None,
            launch: LaunchPolicy::default(),
        }
    }

    /// Settings described by `config`. Fails when a cold start is requested
    /// on a host without a snapshot helper.
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let cold_start = if config.cold_start {
            Some(ColdStart::for_host(
                config.host,
                &config.tools_dir,
                &config.snapshot_drive,
            )?)
        } else {
            None
        };

        Ok(Self {
            exe: config.exe.clone(),
            profile_dir: config.profile_dir.clone(),
            preload: config.preload,
            cold_start,
            prefetch_purge: (!config.prefetch).then(|| config.prefetch_dir.clone()),
            keep_temp_dirs: config.keep_temp_dirs,
            initialize_profile: config.initialize_profile,
            settle: config.settle,
            shutdown_timeout: config.shutdown_timeout,
            launch: LaunchPolicy {
                attempts: config.launch_attempts,
                ..LaunchPolicy::default()
            },
        })
    }
}

/// Startup benchmark hooks.
pub struct BenchmarkScenario {
    settings: ScenarioSettings,
    controller: ApplicationController,
    launcher: Box<dyn Launcher>,
    trace: Box<dyn TraceSession>,
    analyzer: Box<dyn TraceAnalyzer>,
    settle: Box<dyn FnMut(Duration) -> bool>,
    output: Box<dyn Write>,
    results: ResultAggregator,
    graph_name: String,

    // What has been acquired, for teardown.
    saved_preload: Option<PreloadState>,
    temp_dir: Option<TempDir>,
    trace_active: bool,
    app_launched: bool,
    kernel_file: Option<PathBuf>,
}

impl BenchmarkScenario {
    /// Scenario for `settings` driven through `controller`.
    ///
    /// Defaults: real process launches, no trace capture, no analysis, a
    /// settle wait that ends early on Ctrl+C, and `RESULT` lines on stdout.
    pub fn new(settings: ScenarioSettings, controller: ApplicationController) -> Self {
        let graph_name = settings
            .exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            settings,
            controller,
            launcher: Box::new(ProcessLauncher),
            trace: Box::new(NoTrace),
            analyzer: Box::new(NoAnalysis),
            settle: Box::new(signal::wait_for_interrupt_timeout),
            output: Box::new(std::io::stdout()),
            results: ResultAggregator::new(),
            graph_name,
            saved_preload: None,
            temp_dir: None,
            trace_active: false,
            app_launched: false,
            kernel_file: None,
        }
    }

    /// Start processes with `launcher`.
    #[must_use]
    pub fn with_launcher(mut self, launcher: impl Launcher + 'static) -> Self {
        self.launcher = Box::new(launcher);
        self
    }

    /// Capture each iteration with `trace`.
    #[must_use]
    pub fn with_trace_session(mut self, trace: impl TraceSession + 'static) -> Self {
        self.trace = Box::new(trace);
        self
    }

    /// Reduce captured traces with `analyzer`.
    #[must_use]
    pub fn with_analyzer(mut self, analyzer: impl TraceAnalyzer + 'static) -> Self {
        self.analyzer = Box::new(analyzer);
        self
    }

    /// Use `settle` for the settle interval. It receives the interval and
    /// returns `true` if the wait was interrupted.
    #[must_use]
    pub fn with_settle(mut self, settle: impl FnMut(Duration) -> bool + 'static) -> Self {
        self.settle = Box::new(settle);
        self
    }

    /// Write `RESULT` lines to `output`.
    #[must_use]
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    /// Samples collected so far.
    pub fn results(&self) -> &ResultAggregator {
        &self.results
    }

    /// The controller driving the application.
    pub fn controller(&self) -> &ApplicationController {
        &self.controller
    }

    /// The artifacts directory, while it exists.
    pub fn temp_dir(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    fn profile(&self) -> &Path {
        &self.settings.profile_dir
    }

    fn shut_down_stale_instance(&self) -> Result<()> {
        if !self.controller.is_profile_running(self.profile()) {
            return Ok(());
        }
        tracing::warn!(
            "{} already running in profile \"{}\", shutting it down",
            self.controller.family(),
            self.profile().display()
        );
        match self
            .controller
            .shut_down(self.profile(), self.settings.shutdown_timeout)
        {
            Ok(status) => {
                tracing::info!("Stale instance exited with status {:?}", status);
                Ok(())
            }
            // Gone between the check and the shutdown.
            Err(BenchError::TargetNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn initialize_profile_dir(&mut self) -> Result<()> {
        tracing::info!("Initializing profile dir \"{}\"", self.profile().display());
        let exe = self.settings.exe.clone();
        match self.controller.profile_init(self.profile()) {
            ProfileInit::LaunchAndShutDown(extra) => {
                let args = self.controller.launch_args(self.profile(), &extra);
                self.launcher.launch(&LaunchCommand::new(exe, args))?;
                self.app_launched = true;
                wait_till_running(
                    self.settings.launch,
                    || self.controller.is_profile_running(self.profile()),
                    signal::interrupt_requested,
                )?;
                self.controller
                    .shut_down(self.profile(), self.settings.shutdown_timeout)?;
                self.app_launched = false;
            }
            ProfileInit::RunToCompletion(extra) => {
                let args = self.controller.launch_args(self.profile(), &extra);
                let status = self.launcher.run_to_completion(&LaunchCommand::new(exe, args))?;
                tracing::debug!("Profile creation exited with {:?}", status);
            }
        }
        Ok(())
    }

    fn purge_prefetch(&self) -> Result<()> {
        if let Some(dir) = &self.settings.prefetch_purge {
            purge_prefetch(dir, &self.graph_name)?;
        }
        Ok(())
    }

    fn process_logs(&mut self) -> Result<()> {
        // The trace file itself is removed with the artifacts directory.
        let Some(kernel_file) = self.kernel_file.take() else {
            return Ok(());
        };
        let metrics = self.analyzer.analyze(&kernel_file, &self.settings.exe)?;
        for metric in metrics {
            self.results
                .add_result(&self.graph_name, &metric.name, metric.value, &metric.units)?;
        }
        Ok(())
    }
}

impl IterationHooks for BenchmarkScenario {
    fn set_up(&mut self) -> Result<()> {
        self.shut_down_stale_instance()?;

        if self.settings.initialize_profile {
            match std::fs::remove_dir_all(self.profile()) {
                Ok(()) => tracing::debug!("Erased profile dir \"{}\"", self.profile().display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Failed to erase profile dir \"{}\": {}",
                    self.profile().display(),
                    e
                ),
            }
        }
        if !self.profile().is_dir() {
            self.initialize_profile_dir()?;
        }

        let original = self.controller.preload_state()?;
        tracing::debug!("Saved preload state {:?}", original);
        self.saved_preload = Some(original);
        self.controller.set_preload_state(&self.settings.preload)?;

        let temp_dir = tempfile::Builder::new().prefix(TEMP_DIR_PREFIX).tempdir()?;
        tracing::info!("Created temporary directory \"{}\"", temp_dir.path().display());
        self.temp_dir = Some(temp_dir);
        Ok(())
    }

    fn pre_iteration(&mut self, _iteration: usize) -> Result<()> {
        let dir = self
            .temp_dir
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .ok_or_else(|| std::io::Error::other("artifacts directory missing"))?;
        let files = self.trace.start(&dir)?;
        self.trace_active = true;
        self.kernel_file = files.map(|f| f.kernel);
        self.purge_prefetch()
    }

    fn launch_application(&mut self) -> Result<()> {
        let args = self.controller.launch_args(self.profile(), &[]);
        let command = match &self.settings.cold_start {
            Some(cold) => cold.command(&self.settings.exe, args)?,
            None => LaunchCommand::new(&self.settings.exe, args),
        };
        self.launcher.launch(&command)?;
        self.app_launched = true;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.controller.is_profile_running(self.profile())
    }

    fn do_iteration(&mut self, _iteration: usize) -> Result<()> {
        tracing::debug!("Settling for {:?}", self.settings.settle);
        if (self.settle)(self.settings.settle) {
            return Err(BenchError::Interrupted);
        }
        Ok(())
    }

    fn shut_down(&mut self) -> Result<()> {
        tracing::info!("Shutting down profile \"{}\"", self.profile().display());
        self.controller
            .shut_down(self.profile(), self.settings.shutdown_timeout)?;
        self.app_launched = false;
        Ok(())
    }

    fn post_iteration(&mut self, _iteration: usize) -> Result<()> {
        self.trace_active = false;
        self.trace.stop()?;
        self.process_logs()?;
        self.purge_prefetch()
    }

    fn process_results(&mut self) -> Result<()> {
        for line in self.results.render() {
            writeln!(self.output, "{line}")?;
        }
        self.output.flush()?;
        Ok(())
    }

    fn tear_down(&mut self) {
        if self.trace_active {
            self.trace_active = false;
            if let Err(e) = self.trace.stop() {
                tracing::warn!("{}", e);
            }
        }

        if self.app_launched && self.is_running() {
            tracing::warn!("Application still running, shutting it down");
            if let Err(e) = self
                .controller
                .shut_down(self.profile(), self.settings.shutdown_timeout)
            {
                tracing::warn!("Failed to shut down application: {}", e);
            }
        }
        self.app_launched = false;

        if let Some(original) = self.saved_preload.take() {
            match self.controller.set_preload_state(&original) {
                Ok(()) => tracing::debug!("Restored preload state {:?}", original),
                Err(e) => tracing::error!("Failed to restore preload state {:?}: {}", original, e),
            }
        }

        if let Some(temp_dir) = self.temp_dir.take() {
            if self.settings.keep_temp_dirs {
                let path = temp_dir.keep();
                tracing::info!("Keeping temporary directory \"{}\"", path.display());
            } else {
                tracing::info!("Deleting temporary directory \"{}\"", temp_dir.path().display());
                if let Err(e) = temp_dir.close() {
                    tracing::warn!("Failed to delete temporary directory: {}", e);
                }
            }
        }
    }
}
