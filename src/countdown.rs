use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::ClockResult;
use crate::format::format_countdown_seconds;
use crate::notify::{NotificationKind, Notifier, Playback};
use crate::tick::{CLOCK_TICK, TickSlot};
use crate::time_provider::TimeProvider;

pub const DEFAULT_STUDY_MINUTES: u32 = 25;
pub const MAX_STUDY_MINUTES: u32 = 480;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CountdownPhase {
    Idle,
    Running,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CountdownState {
    pub configured_duration_seconds: u32,
    pub remaining_seconds: u32,
    pub running: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CountdownTick {
    /// The countdown was not running; the tick changed nothing.
    Ignored,
    Continue { remaining_seconds: u32 },
    Completed,
}

#[derive(Debug, Clone)]
pub struct Countdown {
    configured_seconds: u32,
    remaining_seconds: u32,
    phase: CountdownPhase,
}

impl Countdown {
    pub fn new(minutes: u32) -> Self {
        let configured_seconds = clamp_minutes(minutes) * 60;
        Self {
            configured_seconds,
            remaining_seconds: configured_seconds,
            phase: CountdownPhase::Idle,
        }
    }

    /// Parses user input as whole minutes. Anything that is not a positive
    /// integer falls back to the 25 minute default.
    pub fn parse_minutes(input: &str) -> u32 {
        match input.trim().parse::<u32>() {
            Ok(minutes) if minutes > 0 => minutes.min(MAX_STUDY_MINUTES),
            _ => DEFAULT_STUDY_MINUTES,
        }
    }

    pub fn configure(&mut self, input: &str) -> u32 {
        let minutes = Self::parse_minutes(input);
        self.set_minutes(minutes);
        minutes
    }

    pub fn set_minutes(&mut self, minutes: u32) {
        self.configured_seconds = clamp_minutes(minutes) * 60;
        self.remaining_seconds = self.configured_seconds;
        self.phase = CountdownPhase::Idle;
        debug!(configured_seconds = self.configured_seconds, "countdown configured");
    }

    pub fn start(&mut self) {
        if self.phase == CountdownPhase::Running {
            return;
        }
        if self.remaining_seconds == 0 {
            self.remaining_seconds = self.configured_seconds;
        }
        self.phase = CountdownPhase::Running;
        debug!(remaining = self.remaining_seconds, "countdown running");
    }

    pub fn pause(&mut self) {
        if self.phase == CountdownPhase::Running {
            self.phase = CountdownPhase::Paused;
            debug!(remaining = self.remaining_seconds, "countdown paused");
        }
    }

    pub fn reset(&mut self) {
        self.remaining_seconds = self.configured_seconds;
        self.phase = CountdownPhase::Idle;
    }

    pub fn tick(&mut self) -> CountdownTick {
        if self.phase != CountdownPhase::Running {
            return CountdownTick::Ignored;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.phase = CountdownPhase::Completed;
            return CountdownTick::Completed;
        }
        CountdownTick::Continue {
            remaining_seconds: self.remaining_seconds,
        }
    }

    pub fn progress(&self) -> f64 {
        let configured = f64::from(self.configured_seconds.max(1));
        let done = f64::from(self.configured_seconds - self.remaining_seconds);
        (done / configured * 100.0).clamp(0.0, 100.0)
    }

    pub fn phase(&self) -> CountdownPhase {
        self.phase
    }

    pub fn configured_minutes(&self) -> u32 {
        self.configured_seconds / 60
    }

    pub fn state(&self) -> CountdownState {
        CountdownState {
            configured_duration_seconds: self.configured_seconds,
            remaining_seconds: self.remaining_seconds,
            running: self.phase == CountdownPhase::Running,
            completed: self.phase == CountdownPhase::Completed,
        }
    }

    pub fn display(&self) -> String {
        format_countdown_seconds(self.remaining_seconds)
    }

    pub fn control_label(&self) -> &'static str {
        match self.phase {
            CountdownPhase::Running => "PAUSE",
            CountdownPhase::Completed => "RESTART",
            _ if self.remaining_seconds == 0 => "RESTART",
            _ => "START",
        }
    }
}

fn clamp_minutes(minutes: u32) -> u32 {
    if minutes == 0 {
        DEFAULT_STUDY_MINUTES
    } else {
        minutes.min(MAX_STUDY_MINUTES)
    }
}

struct StudyShared {
    countdown: Countdown,
    chime: Playback,
}

/// Countdown engine wired to a ticker and a notifier.
pub struct StudyTimer {
    shared: Arc<Mutex<StudyShared>>,
    slot: TickSlot,
    notifier: Arc<Notifier>,
    clock: Arc<dyn TimeProvider>,
    tick_interval: Duration,
}

impl StudyTimer {
    pub fn new(minutes: u32, notifier: Arc<Notifier>, clock: Arc<dyn TimeProvider>) -> Self {
        notifier.ensure_permission();
        Self {
            shared: Arc::new(Mutex::new(StudyShared {
                countdown: Countdown::new(minutes),
                chime: Playback::silent(),
            })),
            slot: TickSlot::new(),
            notifier,
            clock,
            tick_interval: CLOCK_TICK,
        }
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn configure(&mut self, input: &str) -> u32 {
        self.slot.cancel();
        let mut shared = self.shared.lock();
        shared.chime.cancel();
        shared.countdown.configure(input)
    }

    pub fn apply_preset(&mut self, minutes: u32) {
        self.slot.cancel();
        let mut shared = self.shared.lock();
        shared.chime.cancel();
        shared.countdown.set_minutes(minutes);
    }

    pub fn start(&mut self) -> ClockResult<()> {
        self.slot.cancel();
        {
            let mut shared = self.shared.lock();
            shared.chime.cancel();
            shared.countdown.start();
        }

        let shared = Arc::clone(&self.shared);
        let notifier = Arc::clone(&self.notifier);
        let started = self.slot.replace(
            "study",
            self.tick_interval,
            Arc::clone(&self.clock),
            move |_now| {
                let mut shared = shared.lock();
                match shared.countdown.tick() {
                    CountdownTick::Continue { .. } => ControlFlow::Continue(()),
                    CountdownTick::Completed => {
                        info!("study countdown completed");
                        shared.chime = notifier.notify_completion(&NotificationKind::StudyComplete);
                        ControlFlow::Break(())
                    }
                    CountdownTick::Ignored => ControlFlow::Break(()),
                }
            },
        );
        if let Err(err) = started {
            self.shared.lock().countdown.pause();
            return Err(err);
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        self.slot.cancel();
        self.shared.lock().countdown.pause();
    }

    pub fn reset(&mut self) {
        self.slot.cancel();
        let mut shared = self.shared.lock();
        shared.chime.cancel();
        shared.countdown.reset();
    }

    pub fn state(&self) -> CountdownState {
        self.shared.lock().countdown.state()
    }

    pub fn progress(&self) -> f64 {
        self.shared.lock().countdown.progress()
    }

    pub fn display(&self) -> String {
        self.shared.lock().countdown.display()
    }

    pub fn control_label(&self) -> &'static str {
        self.shared.lock().countdown.control_label()
    }

    pub fn is_ticking(&self) -> bool {
        self.slot.is_active()
    }

    pub fn is_chiming(&self) -> bool {
        self.shared.lock().chime.is_playing()
    }
}
