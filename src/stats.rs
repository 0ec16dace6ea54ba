//! Timing statistics for benchmark drivers.

use core::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

/// Incremental mean and variance of a stream of samples
/// (Welford's method).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningMean {
    count: f64,
    mean: f64,
    /// Sum of squared deviations from the current mean.
    m2: f64,
}

/// Snapshot of a `RunningMean`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stats {
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    /// Sample standard deviation.
    pub sample_std_dev: f64,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds in one sample.
    pub fn update(&mut self, value: f64) {
        self.count += 1.0;
        let delta = value - self.mean;
        self.mean += delta / self.count;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    /// Number of samples folded in so far.
    pub fn count(&self) -> u64 {
        self.count as u64
    }

    /// Computes the statistics of the samples seen so far.
    ///
    /// Needs at least one sample, and two for a finite
    /// `sample_std_dev`; missing samples yield NaN.
    pub fn stats(&self) -> Stats {
        Stats {
            mean: if self.count == 0.0 { f64::NAN } else { self.mean },
            std_dev: (self.m2 / self.count).sqrt(),
            sample_std_dev: (self.m2 / (self.count - 1.0)).sqrt(),
        }
    }
}

/// Times repeated trials of one benchmark.
///
/// Each trial feeds its total time in milliseconds and its
/// time per item in nanoseconds into separate accumulators.
#[derive(Debug, Clone)]
pub struct Timer {
    started: Instant,
    total: RunningMean,
    per_item: RunningMean,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total: RunningMean::new(),
            per_item: RunningMean::new(),
        }
    }

    /// Starts a trial.
    pub fn start(&mut self) {
        self.started = Instant::now();
    }

    /// Ends the trial started last, which processed `items` items.
    ///
    /// Returns the trial's duration.
    pub fn end(&mut self, items: u64) -> Duration {
        let elapsed = self.started.elapsed();
        self.record(elapsed, items);
        elapsed
    }

    /// Records a trial measured elsewhere.
    pub fn record(&mut self, elapsed: Duration, items: u64) {
        let total_ms = elapsed.as_secs_f64() * 1e3;
        let per_item_ns = elapsed.as_secs_f64() * 1e9 / items.max(1) as f64;
        self.total.update(total_ms);
        self.per_item.update(per_item_ns);
        log::info!("    {:.2}ms ({:.2}ns)", total_ms, per_item_ns);
    }

    /// Number of trials recorded.
    pub fn trials(&self) -> u64 {
        self.total.count()
    }

    pub fn summary(&self) -> Summary {
        Summary {
            total: self.total.stats(),
            per_item: self.per_item.stats(),
        }
    }
}

/// Aggregated statistics of a `Timer`.
///
/// Displays as the mean followed by the population and sample
/// standard deviations, for the total and the per-item times.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    /// Milliseconds per trial.
    pub total: Stats,
    /// Nanoseconds per item.
    pub per_item: Stats,
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        writeln!(
            f,
            "  Total: {:.2}ms ({:.2}, {:.2})",
            self.total.mean, self.total.std_dev, self.total.sample_std_dev
        )?;
        write!(
            f,
            "  Iter:  {:.2}ns ({:.2}, {:.2})",
            self.per_item.mean, self.per_item.std_dev, self.per_item.sample_std_dev
        )
    }
}
