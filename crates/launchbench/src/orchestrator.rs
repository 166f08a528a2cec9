//! Iteration lifecycle.
//!
//! A run is driven through a fixed sequence of phases:
//!
//! ```text
//! Created -> SetUp -> Iterating -> ProcessResults -> TornDown
//!              \__________\_________________________/
//!                  (on failure, straight to TornDown)
//! ```
//!
//! Each iteration runs `pre_iteration`, `launch_application`, a bounded
//! wait until the application reports running, `do_iteration`,
//! `shut_down` and `post_iteration`. The first failing iteration is logged
//! with its index and ends the loop; results are only processed when every
//! iteration succeeded. Teardown runs exactly once on every path, including
//! a failed setup and a panic unwinding through the orchestrator.

use std::time::Duration;

use launchbench_os::signal;

use crate::error::{BenchError, Result};
use crate::results::IterationProgress;

/// Strategy hooks supplying the work of each phase.
pub trait IterationHooks {
    /// Prepare the run. Called once.
    fn set_up(&mut self) -> Result<()>;

    /// Called before each iteration.
    fn pre_iteration(&mut self, _iteration: usize) -> Result<()> {
        Ok(())
    }

    /// Start the application for this iteration.
    fn launch_application(&mut self) -> Result<()>;

    /// Whether the launched application is up.
    fn is_running(&self) -> bool;

    /// The measured work, once the application is running.
    fn do_iteration(&mut self, _iteration: usize) -> Result<()> {
        Ok(())
    }

    /// Stop the application at the end of the iteration.
    fn shut_down(&mut self) -> Result<()>;

    /// Called after each successful iteration.
    fn post_iteration(&mut self, _iteration: usize) -> Result<()> {
        Ok(())
    }

    /// Called once after all iterations succeeded.
    fn process_results(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release everything acquired since `set_up` started. Must tolerate a
    /// partially completed setup. Called exactly once.
    fn tear_down(&mut self);
}

/// Lifecycle phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Created,
    /// Running `set_up`.
    SetUp,
    /// Inside the iteration loop.
    Iterating,
    /// Running `process_results`.
    ProcessResults,
    /// Teardown has run. Terminal.
    TornDown,
}

/// How long to wait for a launched application to report running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchPolicy {
    /// Number of checks before giving up.
    pub attempts: u32,
    /// Pause between checks.
    pub interval: Duration,
}

impl Default for LaunchPolicy {
    /// 300 one-second polls.
    fn default() -> Self {
        Self {
            attempts: 300,
            interval: Duration::from_secs(1),
        }
    }
}

/// Poll `is_running` until it reports true, at most `policy.attempts`
/// times and at least once. Gives up early with [`BenchError::Interrupted`] when
/// `interrupted` reports true.
pub fn wait_till_running(
    policy: LaunchPolicy,
    mut is_running: impl FnMut() -> bool,
    interrupted: impl Fn() -> bool,
) -> Result<()> {
    let attempts = policy.attempts.max(1);
    for attempt in 0..attempts {
        if is_running() {
            tracing::debug!("Application running after {} poll(s)", attempt + 1);
            return Ok(());
        }
        if interrupted() {
            return Err(BenchError::Interrupted);
        }
        std::thread::sleep(policy.interval);
    }
    Err(BenchError::LaunchTimeout { attempts })
}

/// Outcome of a run whose setup succeeded.
#[derive(Debug)]
pub struct RunReport {
    /// Iterations that finished without error.
    pub completed_iterations: usize,
    /// Index of the iteration that failed, if one did.
    pub failed_iteration: Option<usize>,
    /// The error that ended the loop early.
    pub error: Option<BenchError>,
    /// Phase at the end of the run, always [`Phase::TornDown`].
    pub phase: Phase,
}

impl RunReport {
    /// Whether every requested iteration completed.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Drives an [`IterationHooks`] implementation through a run.
pub struct Orchestrator<H: IterationHooks> {
    hooks: H,
    iterations: usize,
    launch: LaunchPolicy,
    phase: Phase,
    interrupted: Box<dyn Fn() -> bool>,
    progress: Option<IterationProgress>,
}

impl<H: IterationHooks> Orchestrator<H> {
    /// Orchestrate `iterations` iterations of `hooks`.
    pub fn new(hooks: H, iterations: usize) -> Self {
        Self {
            hooks,
            iterations,
            launch: LaunchPolicy::default(),
            phase: Phase::Created,
            interrupted: Box::new(signal::interrupt_requested),
            progress: None,
        }
    }

    /// Use `policy` when waiting for the application to start.
    #[must_use]
    pub fn with_launch_policy(mut self, policy: LaunchPolicy) -> Self {
        self.launch = policy;
        self
    }

    /// Check `interrupted` before each iteration and while waiting for the
    /// application, instead of the process-wide Ctrl+C flag.
    #[must_use]
    pub fn with_interrupt_check(mut self, interrupted: impl Fn() -> bool + 'static) -> Self {
        self.interrupted = Box::new(interrupted);
        self
    }

    /// Report progress on `progress`.
    #[must_use]
    pub fn with_progress(mut self, progress: IterationProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    /// The hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Execute the run.
    ///
    /// A failing setup or result processing is returned as `Err` after
    /// teardown. A failing iteration ends the loop and is reported in the
    /// [`RunReport`].
    pub fn run(&mut self) -> Result<RunReport> {
        self.phase = Phase::SetUp;
        if let Err(e) = self.hooks.set_up() {
            tracing::error!("Setup failed: {}", e);
            self.tear_down();
            return Err(e);
        }

        self.phase = Phase::Iterating;
        let mut completed = 0;
        let mut failure = None;
        for iteration in 0..self.iterations {
            if (self.interrupted)() {
                tracing::warn!("Interrupted before iteration {}", iteration);
                failure = Some((iteration, BenchError::Interrupted));
                break;
            }

            tracing::info!("Starting iteration {}", iteration);
            if let Err(e) = self.run_iteration(iteration) {
                tracing::error!(iteration, "Failure in iteration {}: {}", iteration, e);
                failure = Some((iteration, e));
                break;
            }
            completed += 1;
            if let Some(progress) = &self.progress {
                progress.iteration_done();
            }
        }

        if failure.is_none() {
            self.phase = Phase::ProcessResults;
            if let Err(e) = self.hooks.process_results() {
                tracing::error!("Processing results failed: {}", e);
                self.tear_down();
                return Err(e);
            }
        }

        self.tear_down();

        let (failed_iteration, error) = match failure {
            Some((iteration, error)) => (Some(iteration), Some(error)),
            None => (None, None),
        };
        Ok(RunReport {
            completed_iterations: completed,
            failed_iteration,
            error,
            phase: self.phase,
        })
    }

    fn stage(&self, iteration: usize, stage: &str) {
        if let Some(progress) = &self.progress {
            progress.set_stage(iteration, stage);
        }
    }

    fn run_iteration(&mut self, iteration: usize) -> Result<()> {
        self.stage(iteration, "starting trace");
        self.hooks.pre_iteration(iteration)?;

        self.stage(iteration, "launching");
        self.hooks.launch_application()?;
        let hooks = &self.hooks;
        wait_till_running(self.launch, || hooks.is_running(), &self.interrupted)?;

        self.stage(iteration, "settling");
        self.hooks.do_iteration(iteration)?;

        self.stage(iteration, "shutting down");
        self.hooks.shut_down()?;

        self.stage(iteration, "analyzing");
        self.hooks.post_iteration(iteration)
    }

    fn tear_down(&mut self) {
        if self.phase == Phase::TornDown {
            return;
        }
        if self.phase != Phase::Created {
            self.hooks.tear_down();
        }
        self.phase = Phase::TornDown;
        if let Some(progress) = &self.progress {
            progress.finish();
        }
    }
}

impl<H: IterationHooks> Drop for Orchestrator<H> {
    fn drop(&mut self) {
        // Covers a panic escaping a hook mid-run.
        self.tear_down();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counting {
        running_after: u32,
        polls: Cell<u32>,
        launched: usize,
        teardowns: usize,
        processed: bool,
    }

    impl IterationHooks for Counting {
        fn set_up(&mut self) -> Result<()> {
            Ok(())
        }
        fn launch_application(&mut self) -> Result<()> {
            self.launched += 1;
            self.polls.set(0);
            Ok(())
        }
        fn is_running(&self) -> bool {
            self.polls.set(self.polls.get() + 1);
            self.polls.get() > self.running_after
        }
        fn shut_down(&mut self) -> Result<()> {
            Ok(())
        }
        fn process_results(&mut self) -> Result<()> {
            self.processed = true;
            Ok(())
        }
        fn tear_down(&mut self) {
            self.teardowns += 1;
        }
    }

    fn fast(attempts: u32) -> LaunchPolicy {
        LaunchPolicy {
            attempts,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_default_launch_policy() {
        let policy = LaunchPolicy::default();
        assert_eq!(policy.attempts, 300);
        assert_eq!(policy.interval, Duration::from_secs(1));
    }

    #[test]
    fn test_zero_attempts_still_polls_once() {
        let mut polls = 0;
        wait_till_running(
            fast(0),
            || {
                polls += 1;
                true
            },
            || false,
        )
        .unwrap();
        assert_eq!(polls, 1);

        let err = wait_till_running(fast(0), || false, || false).unwrap_err();
        assert!(matches!(err, BenchError::LaunchTimeout { attempts: 1 }));
    }

    #[test]
    fn test_waits_for_slow_start() {
        let hooks = Counting {
            running_after: 4,
            ..Counting::default()
        };
        let mut orchestrator = Orchestrator::new(hooks, 2)
            .with_launch_policy(fast(5))
            .with_interrupt_check(|| false);
        let report = orchestrator.run().unwrap();
        assert!(report.is_success());
        assert_eq!(report.completed_iterations, 2);
        assert_eq!(report.phase, Phase::TornDown);
        assert!(orchestrator.hooks().processed);
        assert_eq!(orchestrator.hooks().teardowns, 1);
    }

    #[test]
    fn test_launch_timeout_aborts_run() {
        let hooks = Counting {
            running_after: 10,
            ..Counting::default()
        };
        let mut orchestrator = Orchestrator::new(hooks, 3)
            .with_launch_policy(fast(3))
            .with_interrupt_check(|| false);
        let report = orchestrator.run().unwrap();
        assert_eq!(report.failed_iteration, Some(0));
        assert!(matches!(
            report.error,
            Some(BenchError::LaunchTimeout { attempts: 3 })
        ));
        assert_eq!(orchestrator.hooks().launched, 1);
        assert!(!orchestrator.hooks().processed);
        assert_eq!(orchestrator.hooks().teardowns, 1);
    }

    #[test]
    fn test_interrupt_stops_before_next_iteration() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        // Interrupt once the first iteration has polled.
        let mut orchestrator = Orchestrator::new(Counting::default(), 5)
            .with_launch_policy(fast(1))
            .with_interrupt_check(move || {
                seen.set(seen.get() + 1);
                seen.get() > 1
            });
        let report = orchestrator.run().unwrap();
        assert_eq!(report.completed_iterations, 1);
        assert_eq!(report.failed_iteration, Some(1));
        assert!(matches!(report.error, Some(BenchError::Interrupted)));
        assert!(calls.get() >= 2);
        assert_eq!(orchestrator.hooks().teardowns, 1);
    }

    #[test]
    fn test_drop_tears_down_unfinished_run_once() {
        let teardowns = Rc::new(Cell::new(0));

        struct Panicky(Rc<Cell<usize>>);
        impl IterationHooks for Panicky {
            fn set_up(&mut self) -> Result<()> {
                Ok(())
            }
            fn launch_application(&mut self) -> Result<()> {
                panic!("launcher crashed");
            }
            fn is_running(&self) -> bool {
                true
            }
            fn shut_down(&mut self) -> Result<()> {
                Ok(())
            }
            fn tear_down(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let hooks = Panicky(Rc::clone(&teardowns));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let mut orchestrator =
                Orchestrator::new(hooks, 1).with_interrupt_check(|| false);
            let _ = orchestrator.run();
        }));
        assert!(result.is_err());
        assert_eq!(teardowns.get(), 1);
    }

    #[test]
    fn test_never_started_run_does_not_tear_down() {
        let orchestrator = Orchestrator::new(Counting::default(), 1);
        assert_eq!(orchestrator.phase(), Phase::Created);
        drop(orchestrator);
    }
}
