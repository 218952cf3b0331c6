use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::Mutex;
use tracing::debug;

/// Source of wall-clock instants handed to every tick callback.
pub trait TimeProvider: Send + Sync {
    fn now(&self) -> DateTime<Local>;
    fn label(&self) -> &'static str;
}

const SYNC_INTERVAL: Duration = Duration::from_millis(250);
const HARD_RESYNC_THRESHOLD_MS: i64 = 150;
const MAX_SLEW_MS_PER_SECOND: i64 = 4;

type WallSource = Box<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Wall time anchored to a monotonic counter and re-synced against the
/// system clock every 250ms.
///
/// Small errors are slewed at no more than 4ms per second; errors of 150ms
/// or more (suspend, clock step) are applied at once. Readings never go
/// backwards, so after a backward step the output holds until wall time
/// catches up.
pub struct SoftwareTimeProvider {
    wall_anchor: DateTime<Local>,
    monotonic_anchor: Instant,
    wall_source: WallSource,
    sync: Mutex<SyncState>,
}

struct SyncState {
    correction: TimeDelta,
    last_sync_elapsed: Duration,
    last_output: DateTime<Local>,
}

impl SoftwareTimeProvider {
    pub fn new() -> Self {
        Self::with_wall_source(Box::new(Local::now))
    }

    fn with_wall_source(wall_source: WallSource) -> Self {
        let wall_anchor = wall_source();
        Self {
            wall_anchor,
            monotonic_anchor: Instant::now(),
            wall_source,
            sync: Mutex::new(SyncState {
                correction: TimeDelta::zero(),
                last_sync_elapsed: Duration::ZERO,
                last_output: wall_anchor,
            }),
        }
    }

    /// Offset currently applied on top of the monotonic estimate.
    pub fn correction(&self) -> TimeDelta {
        self.sync.lock().correction
    }
}

impl SyncState {
    fn maybe_resync(
        &mut self,
        elapsed: Duration,
        estimated: DateTime<Local>,
        wall: impl FnOnce() -> DateTime<Local>,
    ) -> TimeDelta {
        let since_sync = elapsed.saturating_sub(self.last_sync_elapsed);
        if since_sync < SYNC_INTERVAL {
            return TimeDelta::zero();
        }
        self.last_sync_elapsed = elapsed;

        let error = wall() - estimated;
        let adjustment = if error.num_milliseconds().abs() >= HARD_RESYNC_THRESHOLD_MS {
            debug!(error_ms = error.num_milliseconds(), "wall clock hard resync");
            error
        } else {
            let since_sync_ms = i64::try_from(since_sync.as_millis()).unwrap_or(i64::MAX);
            let max_step = TimeDelta::milliseconds(
                since_sync_ms.saturating_mul(MAX_SLEW_MS_PER_SECOND) / 1_000,
            );
            let damped = error / 4;
            damped.clamp(-max_step, max_step)
        };
        self.correction += adjustment;
        adjustment
    }

    fn clamp_output_monotonic(&mut self, candidate: DateTime<Local>) -> DateTime<Local> {
        if candidate > self.last_output {
            self.last_output = candidate;
        }
        self.last_output
    }
}

impl Default for SoftwareTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for SoftwareTimeProvider {
    fn now(&self) -> DateTime<Local> {
        let elapsed = self.monotonic_anchor.elapsed();
        let delta = TimeDelta::from_std(elapsed).unwrap_or(TimeDelta::MAX);
        let mut sync = self.sync.lock();
        let estimated = self
            .wall_anchor
            .checked_add_signed(delta)
            .and_then(|at| at.checked_add_signed(sync.correction))
            .unwrap_or(self.wall_anchor);
        let adjustment = sync.maybe_resync(elapsed, estimated, &self.wall_source);
        let corrected = estimated.checked_add_signed(adjustment).unwrap_or(estimated);
        sync.clamp_output_monotonic(corrected)
    }

    fn label(&self) -> &'static str {
        "SW_MONOTONIC_SYNCED"
    }
}

/// Settable clock for driving engines deterministically.
pub struct ManualTimeProvider {
    current: Mutex<DateTime<Local>>,
}

impl ManualTimeProvider {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.current.lock() = now;
    }

    pub fn advance(&self, delta: TimeDelta) -> DateTime<Local> {
        let mut current = self.current.lock();
        *current += delta;
        *current
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> DateTime<Local> {
        *self.current.lock()
    }

    fn label(&self) -> &'static str {
        "MANUAL"
    }
}
