//! Starting the benchmarked application.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;

use launchbench_os::spawn_detached;

use crate::error::Result;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Program to run.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<OsString>,
}

impl LaunchCommand {
    /// Command running `program` with `args`.
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

impl fmt::Display for LaunchCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Starts processes on behalf of the benchmark.
pub trait Launcher {
    /// Start `command` and return without waiting for it.
    fn launch(&mut self, command: &LaunchCommand) -> Result<()>;

    /// Run `command` to completion and return its exit code.
    fn run_to_completion(&mut self, command: &LaunchCommand) -> Result<Option<i32>>;
}

/// Launcher spawning real OS processes.
#[derive(Debug, Default)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&mut self, command: &LaunchCommand) -> Result<()> {
        tracing::info!("Launching command line [{}]", command);
        let child = spawn_detached(&mut command.to_command())?;
        tracing::debug!("Launched pid {}", child.id());
        // The application is stopped through the shutdown protocol, not
        // through this handle; on Unix the desktop reaps it.
        drop(child);
        Ok(())
    }

    fn run_to_completion(&mut self, command: &LaunchCommand) -> Result<Option<i32>> {
        tracing::info!("Running command line [{}]", command);
        let status = command.to_command().status()?;
        tracing::debug!("Command exited with {}", status);
        Ok(status.code())
    }
}
