//! Iteration progress bar.
//!
//! Example output:
//! ```text
//!   ⠋ Iteration 3/10: settling
//!   ████████░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░░  2/10  ETA 00:01:04
//! ```

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Progress display for a benchmark run, one tick per finished iteration.
pub struct IterationProgress {
    progress: ProgressBar,
    total: usize,
    color: bool,
    start_time: Instant,
}

impl IterationProgress {
    /// Create a visible progress bar for `total` iterations.
    pub fn new(total: usize, color: bool) -> Self {
        let template = if color {
            "  {spinner:.cyan} {msg}\n  {bar:40.cyan/dim}  {pos}/{len}  ETA {eta}"
        } else {
            "  {spinner} {msg}\n  {bar:40}  {pos}/{len}  ETA {eta}"
        };
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);

        let progress = ProgressBar::new(total as u64);
        progress.set_style(style);
        progress.set_message("Setting up...");
        progress.enable_steady_tick(Duration::from_millis(100));

        Self::with_bar(progress, total, color)
    }

    /// Create a reporter that draws nothing.
    pub fn hidden(total: usize) -> Self {
        Self::with_bar(ProgressBar::hidden(), total, false)
    }

    fn with_bar(progress: ProgressBar, total: usize, color: bool) -> Self {
        Self {
            progress,
            total,
            color,
            start_time: Instant::now(),
        }
    }

    /// Show which iteration is running and what it is doing.
    pub fn set_stage(&self, iteration: usize, stage: &str) {
        let counter = format!("{}/{}", iteration + 1, self.total);
        let message = if self.color {
            format!("Iteration {}: {}", counter.green(), stage)
        } else {
            format!("Iteration {counter}: {stage}")
        };
        self.progress.set_message(message);
    }

    /// Record a finished iteration.
    pub fn iteration_done(&self) {
        self.progress.inc(1);
    }

    /// Number of iterations recorded as finished.
    pub fn position(&self) -> u64 {
        self.progress.position()
    }

    /// Clear the display and return the elapsed time.
    pub fn finish(&self) -> Duration {
        self.progress.finish_and_clear();
        self.start_time.elapsed()
    }
}
