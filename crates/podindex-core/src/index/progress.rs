//! Progress reporting for long-running index population.
//!
//! Every virtual machine step SQLite runs while populating is counted, and
//! each full block of N steps advances a [`ProgressReporter`] by exactly N.
//! The expected total is only an estimate, so the reported position may run
//! past it.

use crate::config::{IndexConfig, IndexDefaults};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

/// Receives progress from the execution engine.
///
/// Called on SQLite's execution path: implementations must return quickly
/// and must not block. A panic aborts the running statement.
pub trait ProgressReporter: Send + Sync {
    /// Advance the indicator by `steps` units.
    fn advance(&self, steps: u64);

    /// Called once after the operation finished, successfully or not.
    fn finish(&self) {}
}

/// Expected work for one population run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEstimate {
    pub total_expected_steps: u64,
    pub steps_per_record: f64,
    pub update_granularity: u32,
}

impl ProgressEstimate {
    pub fn for_records(records: u64, config: &IndexConfig) -> Self {
        Self {
            total_expected_steps: (records as f64 * config.steps_per_record) as u64,
            steps_per_record: config.steps_per_record,
            update_granularity: config.progress_granularity,
        }
    }
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn advance(&self, _steps: u64) {}
}

/// Logs progress milestones through `tracing`.
#[derive(Debug)]
pub struct TracingProgress {
    label: String,
    total: u64,
    position: AtomicU64,
    /// Next percentage at which a line is logged.
    next_percent: Mutex<u64>,
    percent_step: u64,
}

impl TracingProgress {
    pub fn new(label: impl Into<String>, total: u64) -> Self {
        Self {
            label: label.into(),
            total,
            position: AtomicU64::new(0),
            next_percent: Mutex::new(IndexDefaults::PROGRESS_LOG_PERCENT),
            percent_step: IndexDefaults::PROGRESS_LOG_PERCENT,
        }
    }

    pub fn position(&self) -> u64 {
        self.position.load(Ordering::SeqCst)
    }

    fn percent(&self, position: u64) -> u64 {
        if self.total == 0 {
            100
        } else {
            position.saturating_mul(100) / self.total
        }
    }
}

impl ProgressReporter for TracingProgress {
    fn advance(&self, steps: u64) {
        let position = self.position.fetch_add(steps, Ordering::SeqCst) + steps;
        let percent = self.percent(position);

        // try_lock: never wait on the engine's path
        if let Ok(mut next) = self.next_percent.try_lock() {
            if percent >= *next && *next <= 100 {
                info!(
                    "{}: {}% ({}/{} estimated steps)",
                    self.label,
                    percent.min(100),
                    position,
                    self.total
                );
                while *next <= percent {
                    *next += self.percent_step;
                }
            }
        }
    }

    fn finish(&self) {
        info!("{}: done after {} steps", self.label, self.position());
    }
}

/// Counts every advance; handy for callers that want the raw total.
#[derive(Debug, Default)]
pub struct CountingProgress {
    steps: AtomicU64,
    calls: AtomicU64,
}

impl CountingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProgressReporter for CountingProgress {
    fn advance(&self, steps: u64) {
        self.steps.fetch_add(steps, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate() {
        let estimate = ProgressEstimate::for_records(1000, &IndexConfig::default());
        assert_eq!(estimate.total_expected_steps, 50_600);
        assert_eq!(estimate.update_granularity, 1000);

        let estimate = ProgressEstimate::for_records(0, &IndexConfig::default());
        assert_eq!(estimate.total_expected_steps, 0);
    }

    #[test]
    fn test_estimate_custom_calibration() {
        let config = IndexConfig::default()
            .with_steps_per_record(10.0)
            .with_progress_granularity(50);
        let estimate = ProgressEstimate::for_records(7, &config);
        assert_eq!(estimate.total_expected_steps, 70);
        assert_eq!(estimate.update_granularity, 50);
    }

    #[test]
    fn test_tracing_progress_position() {
        let progress = TracingProgress::new("populate", 10_000);
        for _ in 0..5 {
            progress.advance(1000);
        }
        assert_eq!(progress.position(), 5000);

        // Overshooting the estimate is allowed
        for _ in 0..10 {
            progress.advance(1000);
        }
        assert_eq!(progress.position(), 15_000);
        progress.finish();
    }

    #[test]
    fn test_tracing_progress_zero_total() {
        let progress = TracingProgress::new("populate", 0);
        progress.advance(1000);
        assert_eq!(progress.position(), 1000);
    }

    #[test]
    fn test_counting_progress() {
        let progress = CountingProgress::new();
        progress.advance(100);
        progress.advance(100);
        assert_eq!(progress.steps(), 200);
        assert_eq!(progress.calls(), 2);
    }
}
