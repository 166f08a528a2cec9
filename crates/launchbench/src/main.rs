//! launchbench - Browser startup benchmark runner.

use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use launchbench::{
    analysis::ExternalAnalyzer,
    cli::Cli,
    config::RunnerConfig,
    controller::ApplicationController,
    error::BenchError,
    orchestrator::{LaunchPolicy, Orchestrator},
    results::{export_json, print_summary, IterationProgress},
    scenario::{BenchmarkScenario, ScenarioSettings},
    trace::ControlTraceSession,
};
use launchbench_os::{native_desktop, signal};
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code for a run cut short by Ctrl+C.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Log messages appear above the progress bar without clobbering it
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info")
        } else {
            EnvFilter::new("warn")
        }
    });

    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(indicatif_layer.get_stderr_writer()),
        )
        .with(indicatif_layer)
        .with(filter)
        .init();

    signal::install_interrupt_handler().context("Failed to install Ctrl+C handler")?;

    let config = cli.into_config().context("Failed to create runner config")?;

    print_banner(&config);

    let settings = ScenarioSettings::from_config(&config)?;
    let controller = ApplicationController::for_executable(&config.exe, native_desktop());
    tracing::info!("Benchmarking {} ({})", config.exe.display(), controller.family());

    let mut scenario = BenchmarkScenario::new(settings, controller);
    match &config.trace_control {
        Some(control) => {
            scenario = scenario.with_trace_session(ControlTraceSession::new(control));
        }
        None => tracing::warn!("Trace capture disabled, no metrics will be recorded"),
    }
    match &config.analyzer {
        Some(analyzer) => scenario = scenario.with_analyzer(ExternalAnalyzer::new(analyzer)),
        None if config.trace_control.is_some() => {
            tracing::warn!("No --analyzer given, traces are captured but not analyzed");
        }
        None => {}
    }

    let progress = if std::io::stderr().is_terminal() {
        IterationProgress::new(config.iterations, config.color)
    } else {
        IterationProgress::hidden(config.iterations)
    };

    let mut orchestrator = Orchestrator::new(scenario, config.iterations)
        .with_launch_policy(LaunchPolicy {
            attempts: config.launch_attempts,
            ..LaunchPolicy::default()
        })
        .with_progress(progress);

    let report = orchestrator.run().context("Benchmark run failed")?;
    let results = orchestrator.hooks().results();

    if std::io::stderr().is_terminal() {
        print_summary(
            &mut std::io::stderr(),
            results,
            report.completed_iterations,
            config.color,
        )?;
    }

    if let Some(path) = &config.json {
        export_json(
            results,
            &config,
            report.completed_iterations,
            report.failed_iteration,
            path,
        )
        .context("Failed to export JSON")?;
        eprintln!("Results exported to: {}", path.display());
    }

    match report.error {
        None => Ok(ExitCode::SUCCESS),
        Some(BenchError::Interrupted) => {
            eprintln!(
                "Interrupted after {} of {} iterations",
                report.completed_iterations, config.iterations
            );
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        Some(e) => Err(anyhow::Error::new(e).context(format!(
            "Iteration {} failed",
            report.failed_iteration.unwrap_or(report.completed_iterations)
        ))),
    }
}

/// Print a compact one-line banner with configuration summary.
fn print_banner(config: &RunnerConfig) {
    use owo_colors::OwoColorize;

    let mut modes = Vec::new();
    if config.cold_start {
        modes.push("cold start");
    }
    if config.preload.enabled {
        modes.push("preload");
    }
    if !config.prefetch {
        modes.push("no prefetch");
    }
    let modes = if modes.is_empty() {
        String::new()
    } else {
        format!(" [{}]", modes.join(", "))
    };

    eprintln!();
    if config.color {
        eprintln!(
            "{}: {}{} - {} iterations",
            "launchbench".cyan().bold(),
            config.exe_name(),
            modes,
            config.iterations
        );
    } else {
        eprintln!(
            "launchbench: {}{} - {} iterations",
            config.exe_name(),
            modes,
            config.iterations
        );
    }
    eprintln!();
}
