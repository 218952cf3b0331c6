use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::ClockResult;
use crate::format::format_stopwatch;
use crate::tick::{STOPWATCH_TICK, TickSlot};
use crate::time_provider::TimeProvider;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LapRecord {
    pub id: u32,
    pub absolute_ms: u64,
    pub delta_ms: u64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StopwatchState {
    pub accumulated_ms: u64,
    pub running: bool,
    pub laps: Vec<LapRecord>,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum StopwatchPhase {
    #[default]
    Stopped,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct LapBounds {
    pub best_delta_ms: u64,
    pub worst_delta_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct LapHighlight {
    pub best: bool,
    pub worst: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    accumulated_ms: u64,
    running_since: Option<DateTime<Local>>,
    phase: StopwatchPhase,
    displayed_ms: u64,
    // most recent first
    laps: Vec<LapRecord>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts or resumes. Returns false if already running.
    pub fn start(&mut self, now: DateTime<Local>) -> bool {
        if self.running_since.is_some() {
            return false;
        }
        self.running_since = Some(now);
        self.phase = StopwatchPhase::Running;
        debug!(accumulated_ms = self.accumulated_ms, "stopwatch running");
        true
    }

    pub fn resume(&mut self, now: DateTime<Local>) -> bool {
        self.start(now)
    }

    pub fn pause(&mut self, now: DateTime<Local>) {
        if self.running_since.is_none() {
            return;
        }
        self.accumulated_ms = self.elapsed_ms(now);
        self.displayed_ms = self.accumulated_ms;
        self.running_since = None;
        self.phase = StopwatchPhase::Paused;
        debug!(accumulated_ms = self.accumulated_ms, "stopwatch paused");
    }

    /// Clears elapsed time and laps. Refused while running.
    pub fn reset(&mut self) -> bool {
        if self.running_since.is_some() {
            debug!("stopwatch reset ignored while running");
            return false;
        }
        self.accumulated_ms = 0;
        self.displayed_ms = 0;
        self.laps.clear();
        self.phase = StopwatchPhase::Stopped;
        true
    }

    pub fn refresh(&mut self, now: DateTime<Local>) -> u64 {
        self.displayed_ms = self.elapsed_ms(now);
        self.displayed_ms
    }

    pub fn lap(&mut self, now: DateTime<Local>) -> Option<LapRecord> {
        self.running_since?;
        let absolute_ms = self.refresh(now);
        let previous_ms = self.laps.first().map(|lap| lap.absolute_ms).unwrap_or(0);
        let id = u32::try_from(self.laps.len() + 1).unwrap_or(u32::MAX);
        let lap = LapRecord {
            id,
            absolute_ms,
            delta_ms: absolute_ms.saturating_sub(previous_ms),
        };
        self.laps.insert(0, lap);
        Some(lap)
    }

    /// Elapsed time at `now`; never lower than what was last displayed.
    pub fn elapsed_ms(&self, now: DateTime<Local>) -> u64 {
        match self.running_since {
            Some(since) => {
                let span = (now - since).num_milliseconds().max(0) as u64;
                self.accumulated_ms
                    .saturating_add(span)
                    .max(self.displayed_ms)
            }
            None => self.accumulated_ms,
        }
    }

    pub fn displayed_ms(&self) -> u64 {
        self.displayed_ms
    }

    pub fn laps(&self) -> &[LapRecord] {
        &self.laps
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn phase(&self) -> StopwatchPhase {
        self.phase
    }

    pub fn state(&self) -> StopwatchState {
        StopwatchState {
            accumulated_ms: self.accumulated_ms,
            running: self.is_running(),
            laps: self.laps.clone(),
        }
    }

    pub fn lap_bounds(&self) -> Option<LapBounds> {
        if self.laps.len() < 2 {
            return None;
        }
        let deltas = self.laps.iter().map(|lap| lap.delta_ms);
        Some(LapBounds {
            best_delta_ms: deltas.clone().min()?,
            worst_delta_ms: deltas.max()?,
        })
    }

    pub fn highlight(&self, lap: &LapRecord) -> LapHighlight {
        match self.lap_bounds() {
            Some(bounds) => LapHighlight {
                best: lap.delta_ms == bounds.best_delta_ms,
                worst: lap.delta_ms == bounds.worst_delta_ms,
            },
            None => LapHighlight::default(),
        }
    }

    pub fn control_label(&self) -> &'static str {
        match self.phase() {
            StopwatchPhase::Running => "PAUSE",
            StopwatchPhase::Paused => "RESUME",
            StopwatchPhase::Stopped => "START",
        }
    }
}

/// Stopwatch engine refreshed by a 10ms ticker.
pub struct StopwatchRunner {
    shared: Arc<Mutex<Stopwatch>>,
    slot: TickSlot,
    clock: Arc<dyn TimeProvider>,
    refresh_interval: Duration,
}

impl StopwatchRunner {
    pub fn new(clock: Arc<dyn TimeProvider>) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Stopwatch::new())),
            slot: TickSlot::new(),
            clock,
            refresh_interval: STOPWATCH_TICK,
        }
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn start(&mut self) -> ClockResult<()> {
        self.slot.cancel();
        if !self.shared.lock().start(self.clock.now()) {
            debug!("stopwatch already running");
        }

        let shared = Arc::clone(&self.shared);
        let started = self.slot.replace(
            "stopwatch",
            self.refresh_interval,
            Arc::clone(&self.clock),
            move |now| {
                shared.lock().refresh(now);
                ControlFlow::Continue(())
            },
        );
        if let Err(err) = started {
            self.shared.lock().pause(self.clock.now());
            return Err(err);
        }
        Ok(())
    }

    pub fn resume(&mut self) -> ClockResult<()> {
        self.start()
    }

    pub fn pause(&mut self) {
        self.slot.cancel();
        self.shared.lock().pause(self.clock.now());
    }

    pub fn reset(&mut self) -> bool {
        self.shared.lock().reset()
    }

    pub fn lap(&mut self) -> Option<LapRecord> {
        self.shared.lock().lap(self.clock.now())
    }

    pub fn displayed_ms(&self) -> u64 {
        self.shared.lock().displayed_ms()
    }

    pub fn display(&self) -> String {
        format_stopwatch(self.displayed_ms())
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().is_running()
    }

    pub fn control_label(&self) -> &'static str {
        self.shared.lock().control_label()
    }

    /// Laps with their best/worst marks, most recent first.
    pub fn laps(&self) -> Vec<(LapRecord, LapHighlight)> {
        let stopwatch = self.shared.lock();
        stopwatch
            .laps()
            .iter()
            .map(|lap| (*lap, stopwatch.highlight(lap)))
            .collect()
    }

    pub fn state(&self) -> StopwatchState {
        self.shared.lock().state()
    }
}
