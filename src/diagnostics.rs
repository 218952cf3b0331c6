use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use chrono::Local;
use parking_lot::Mutex;

use crate::tick::Ticker;
use crate::time_provider::TimeProvider;

pub const LATENESS_BUCKETS_MS: [f64; 5] = [0.5, 1.0, 2.0, 5.0, 10.0];

/// Lateness statistics for a stream of ticks.
#[derive(Debug, Clone)]
pub struct TickStats {
    interval: Duration,
    total_ticks: u64,
    late_ticks: u64,
    total_lateness: Duration,
    max_lateness: Duration,
    lateness_histogram: [u64; 6],
}

impl TickStats {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            total_ticks: 0,
            late_ticks: 0,
            total_lateness: Duration::ZERO,
            max_lateness: Duration::ZERO,
            lateness_histogram: [0; 6],
        }
    }

    /// Records the gap between two consecutive ticks.
    pub fn record_gap(&mut self, gap: Duration) {
        self.total_ticks += 1;
        let lateness = gap.saturating_sub(self.interval);
        if lateness > self.tolerance() {
            self.late_ticks += 1;
        }
        self.total_lateness += lateness;
        self.max_lateness = self.max_lateness.max(lateness);
        self.update_histogram(lateness);
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn late_ticks(&self) -> u64 {
        self.late_ticks
    }

    pub fn mean_lateness(&self) -> Duration {
        if self.total_ticks == 0 {
            return Duration::ZERO;
        }
        self.total_lateness / u32::try_from(self.total_ticks).unwrap_or(u32::MAX)
    }

    pub fn max_lateness(&self) -> Duration {
        self.max_lateness
    }

    pub fn histogram(&self) -> [u64; 6] {
        self.lateness_histogram
    }

    fn tolerance(&self) -> Duration {
        (self.interval / 10).max(Duration::from_millis(1))
    }

    fn update_histogram(&mut self, lateness: Duration) {
        let ms = lateness.as_secs_f64() * 1_000.0;
        let bucket = LATENESS_BUCKETS_MS
            .iter()
            .position(|limit| ms <= *limit)
            .unwrap_or(LATENESS_BUCKETS_MS.len());
        self.lateness_histogram[bucket] += 1;
    }
}

pub fn run_diagnostics(
    clock: Arc<dyn TimeProvider>,
    interval: Duration,
    duration: Duration,
) -> Result<TickStats> {
    if interval.is_zero() {
        bail!("--interval-ms must be greater than zero");
    }

    println!("clocksuite tick diagnostics");
    println!("Timing source: {}", clock.label());
    println!("Tick interval: {} ms", interval.as_millis());
    println!("Running {:.1} second tick benchmark...", duration.as_secs_f64());

    let stats = Arc::new(Mutex::new(TickStats::new(interval)));
    let wall_start = Local::now();
    let bench_start = Instant::now();
    let sink = Arc::clone(&stats);
    let mut previous = bench_start;
    let mut ticker = Ticker::start("diagnostics", interval, Arc::clone(&clock), move |_now| {
        let current = Instant::now();
        sink.lock().record_gap(current.duration_since(previous));
        previous = current;
        ControlFlow::Continue(())
    })?;
    thread::sleep(duration);
    ticker.cancel();

    let monotonic = bench_start.elapsed();
    let wall_end = Local::now();
    let wall = (wall_end - wall_start).to_std().unwrap_or(Duration::ZERO);
    let provider_offset = clock.now() - wall_end;
    let stats = stats.lock().clone();

    println!("Tick summary:");
    println!("  Ticks: {}", stats.total_ticks());
    println!("  Late: {}", stats.late_ticks());
    println!(
        "  Mean lateness: {:.3} ms",
        stats.mean_lateness().as_secs_f64() * 1_000.0
    );
    println!(
        "  Max lateness: {:.3} ms",
        stats.max_lateness().as_secs_f64() * 1_000.0
    );
    println!(
        "  Wall vs monotonic drift: {:.3} ms",
        (wall.as_secs_f64() - monotonic.as_secs_f64()) * 1_000.0
    );
    println!(
        "  Provider vs system clock: {} ms",
        provider_offset.num_milliseconds()
    );
    println!("  Lateness histogram buckets (<=0.5, <=1, <=2, <=5, <=10, >10 ms):");
    println!("  {:?}", stats.histogram());
    Ok(stats)
}
