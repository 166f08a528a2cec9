//! Lifecycle properties of the iteration engine.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use launchbench::orchestrator::{IterationHooks, LaunchPolicy, Orchestrator, Phase};
use launchbench::{BenchError, Result};
use proptest::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    SetUp,
    Pre(usize),
    Launch,
    Do(usize),
    ShutDown,
    Post(usize),
    ProcessResults,
    TearDown,
}

/// Hooks that record every call and fail where told to.
struct Recording {
    events: Rc<RefCell<Vec<Event>>>,
    fail_setup: bool,
    fail_at: Option<usize>,
}

impl Recording {
    fn new(fail_setup: bool, fail_at: Option<usize>) -> (Self, Rc<RefCell<Vec<Event>>>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        (
            Self {
                events: Rc::clone(&events),
                fail_setup,
                fail_at,
            },
            events,
        )
    }

    fn record(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }
}

impl IterationHooks for Recording {
    fn set_up(&mut self) -> Result<()> {
        self.record(Event::SetUp);
        if self.fail_setup {
            return Err(BenchError::LoggingStartFailure {
                reason: "control tool missing".to_string(),
            });
        }
        Ok(())
    }

    fn pre_iteration(&mut self, iteration: usize) -> Result<()> {
        self.record(Event::Pre(iteration));
        Ok(())
    }

    fn launch_application(&mut self) -> Result<()> {
        self.record(Event::Launch);
        Ok(())
    }

    fn is_running(&self) -> bool {
        true
    }

    fn do_iteration(&mut self, iteration: usize) -> Result<()> {
        self.record(Event::Do(iteration));
        if self.fail_at == Some(iteration) {
            return Err(BenchError::Analysis {
                reason: format!("iteration {iteration} failed"),
            });
        }
        Ok(())
    }

    fn shut_down(&mut self) -> Result<()> {
        self.record(Event::ShutDown);
        Ok(())
    }

    fn post_iteration(&mut self, iteration: usize) -> Result<()> {
        self.record(Event::Post(iteration));
        Ok(())
    }

    fn process_results(&mut self) -> Result<()> {
        self.record(Event::ProcessResults);
        Ok(())
    }

    fn tear_down(&mut self) {
        self.record(Event::TearDown);
    }
}

fn orchestrator(hooks: Recording, iterations: usize) -> Orchestrator<Recording> {
    Orchestrator::new(hooks, iterations)
        .with_interrupt_check(|| false)
        .with_launch_policy(LaunchPolicy {
            attempts: 1,
            interval: Duration::ZERO,
        })
}

fn count(events: &[Event], wanted: &Event) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}

proptest! {
    /// Teardown runs exactly once and last; a failure in iteration k skips
    /// iterations after k and result processing.
    #[test]
    fn teardown_once_and_abort_after_failure(
        iterations in 0usize..8,
        fail_at in proptest::option::of(0usize..8),
    ) {
        let (hooks, events) = Recording::new(false, fail_at);
        let mut orchestrator = orchestrator(hooks, iterations);
        let report = orchestrator.run().unwrap();
        drop(orchestrator);

        let events = events.borrow();
        prop_assert_eq!(count(&events, &Event::TearDown), 1);
        prop_assert_eq!(events.last(), Some(&Event::TearDown));
        prop_assert_eq!(report.phase, Phase::TornDown);

        let failing = fail_at.filter(|&k| k < iterations);
        match failing {
            Some(k) => {
                prop_assert_eq!(report.completed_iterations, k);
                prop_assert_eq!(report.failed_iteration, Some(k));
                prop_assert_eq!(count(&events, &Event::ProcessResults), 0);
                prop_assert!(!events.contains(&Event::Pre(k + 1)));
                prop_assert!(!events.contains(&Event::Post(k)));
            }
            None => {
                prop_assert!(report.is_success());
                prop_assert_eq!(report.completed_iterations, iterations);
                prop_assert_eq!(count(&events, &Event::ProcessResults), 1);
                for i in 0..iterations {
                    prop_assert!(events.contains(&Event::Post(i)));
                }
            }
        }
    }
}

#[test]
fn test_iteration_order() {
    let (hooks, events) = Recording::new(false, None);
    orchestrator(hooks, 2).run().unwrap();

    assert_eq!(
        *events.borrow(),
        vec![
            Event::SetUp,
            Event::Pre(0),
            Event::Launch,
            Event::Do(0),
            Event::ShutDown,
            Event::Post(0),
            Event::Pre(1),
            Event::Launch,
            Event::Do(1),
            Event::ShutDown,
            Event::Post(1),
            Event::ProcessResults,
            Event::TearDown,
        ]
    );
}

#[test]
fn test_setup_failure_propagates_after_teardown() {
    let (hooks, events) = Recording::new(true, None);
    let mut orchestrator = orchestrator(hooks, 3);

    let err = orchestrator.run().unwrap_err();
    assert!(matches!(err, BenchError::LoggingStartFailure { .. }));
    assert_eq!(orchestrator.phase(), Phase::TornDown);
    drop(orchestrator);

    assert_eq!(*events.borrow(), vec![Event::SetUp, Event::TearDown]);
}
