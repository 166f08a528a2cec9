//! Startup benchmark runner for desktop browsers.
//!
//! Runs a Chromium- or Mozilla-family browser through a fixed number of
//! launch iterations on one profile. Every iteration is bracketed by a
//! kernel trace capture; the browser is launched (optionally cold, from a
//! volume snapshot), left to settle, then asked to quit through the OS
//! window protocol. Metrics extracted from each trace accumulate per
//! `(graph, trace)` key and are printed once at the end:
//!
//! ```text
//! RESULT chrome.exe: HardPageFaults= [1201, 1187, 1194]
//! RESULT chrome.exe: RendererLaunchTime= [0.21, 0.19, 0.2] s
//! ```
//!
//! # Usage
//!
//! ```text
//! launchbench [OPTIONS] <EXE> <PROFILE_DIR>
//!
//! Options:
//!   -n, --iterations <N>             Launches to measure (default: 10)
//!       --preload                    Enable DLL preloading (Chromium on Windows)
//!       --cold-start                 Launch from a fresh volume snapshot
//!       --no-prefetch                Purge prefetch entries around each launch
//!       --settle-secs <SECS>         Run time before shutdown (default: 10)
//!       --shutdown-timeout-secs <S>  Bound on each shutdown wait
//!       --analyzer <CMD>             External trace analyzer
//!       --json <PATH>                Export results to JSON
//!   -v, --verbose                    Verbose output
//! ```
//!
//! The iteration engine ([`orchestrator`]) is generic over its hooks and
//! knows nothing about browsers; [`scenario`] supplies the startup
//! benchmark, and everything OS-specific lives in `launchbench_os`.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod launch;
pub mod orchestrator;
pub mod prefetch;
pub mod results;
pub mod scenario;
pub mod snapshot;
pub mod trace;

pub use cli::Cli;
pub use config::RunnerConfig;
pub use controller::{AppFamily, ApplicationController, PreloadState};
pub use error::{BenchError, Result};
pub use orchestrator::{IterationHooks, LaunchPolicy, Orchestrator, Phase, RunReport};
pub use results::ResultAggregator;
pub use scenario::{BenchmarkScenario, ScenarioSettings};
